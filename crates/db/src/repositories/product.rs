use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Row, Sqlite};

use prodcat_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, description, price, available, created_at, updated_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn price_to_text(price: Decimal) -> String {
    price.normalize().to_string()
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid {column} `{raw}`: {e}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let available: bool =
        row.try_get("available").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = Decimal::from_str(&price_str)
        .map_err(|e| RepositoryError::Decode(format!("invalid price `{price_str}`: {e}")))?;

    Ok(Product {
        id: ProductId(id),
        name,
        description,
        price,
        available,
        created_at: parse_timestamp("created_at", &created_at_str)?,
        updated_at: parse_timestamp("updated_at", &updated_at_str)?,
    })
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let now = timestamp_now();
        let sql = format!(
            "INSERT INTO product (name, description, price, available, created_at, updated_at)
             VALUES (?, ?, ?, 1, ?, ?)
             RETURNING {PRODUCT_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(price_to_text(product.price))
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool)
            .await?;

        row_to_product(&row)
    }

    async fn count_available(&self) -> Result<u64, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product WHERE available = 1")
            .fetch_one(&self.pool)
            .await?;

        u64::try_from(total).map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn find_available(&self, skip: u64, take: u64) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM product
             WHERE available = 1
             ORDER BY id ASC
             LIMIT ? OFFSET ?"
        );

        let rows = sqlx::query(&sql)
            .bind(clamp_i64(take))
            .bind(clamp_i64(skip))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn find_available_by_id(
        &self,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ? AND available = 1");

        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&self.pool).await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn find_available_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE available = 1 AND id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.0);
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn update_available(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        if patch.is_empty() {
            return self.find_available_by_id(id).await;
        }

        let sql = format!(
            "UPDATE product SET
                 name = COALESCE(?, name),
                 description = COALESCE(?, description),
                 price = COALESCE(?, price),
                 updated_at = ?
             WHERE id = ? AND available = 1
             RETURNING {PRODUCT_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(&patch.name)
            .bind(&patch.description)
            .bind(patch.price.map(price_to_text))
            .bind(timestamp_now())
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn mark_unavailable(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "UPDATE product SET available = 0, updated_at = ?
             WHERE id = ? AND available = 1
             RETURNING {PRODUCT_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(timestamp_now())
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use prodcat_core::domain::product::{NewProduct, ProductId, ProductPatch};

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults_available() {
        let pool = migrated_pool().await;
        let repo = SqlProductRepository::new(pool.clone());

        let created = repo
            .create(NewProduct::new("Keyboard", Decimal::new(4999, 2)).with_description("TKL"))
            .await
            .expect("create");

        assert_eq!(created.id, ProductId(1));
        assert!(created.available);
        assert_eq!(created.price, Decimal::new(4999, 2));
        assert_eq!(created.description.as_deref(), Some("TKL"));

        let found = repo.find_available_by_id(created.id).await.expect("find");
        assert_eq!(found, Some(created));

        pool.close().await;
    }

    #[tokio::test]
    async fn find_available_pages_by_id_ascending() {
        let pool = migrated_pool().await;
        let repo = SqlProductRepository::new(pool.clone());
        for index in 1..=5 {
            repo.create(NewProduct::new(format!("Item {index}"), Decimal::from(index)))
                .await
                .expect("create");
        }
        repo.mark_unavailable(ProductId(2)).await.expect("remove");

        let page = repo.find_available(1, 2).await.expect("page");
        let ids: Vec<i64> = page.iter().map(|product| product.id.0).collect();

        assert_eq!(ids, vec![3, 4]);
        assert_eq!(repo.count_available().await.expect("count"), 4);

        pool.close().await;
    }

    #[tokio::test]
    async fn update_merges_only_present_fields() {
        let pool = migrated_pool().await;
        let repo = SqlProductRepository::new(pool.clone());
        let created = repo
            .create(NewProduct::new("Mouse", Decimal::new(1999, 2)).with_description("wireless"))
            .await
            .expect("create");

        let patch = ProductPatch { price: Some(Decimal::from(50)), ..ProductPatch::default() };
        let updated = repo
            .update_available(created.id, &patch)
            .await
            .expect("update")
            .expect("row should be available");

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Mouse");
        assert_eq!(updated.description.as_deref(), Some("wireless"));
        assert_eq!(updated.price, Decimal::from(50));
        assert!(updated.updated_at >= created.updated_at);

        pool.close().await;
    }

    #[tokio::test]
    async fn writes_skip_unavailable_rows() {
        let pool = migrated_pool().await;
        let repo = SqlProductRepository::new(pool.clone());
        let created =
            repo.create(NewProduct::new("Cable", Decimal::from(5))).await.expect("create");

        let removed = repo.mark_unavailable(created.id).await.expect("remove");
        assert_eq!(removed.map(|product| product.available), Some(false));

        assert_eq!(repo.mark_unavailable(created.id).await.expect("second remove"), None);
        let patch = ProductPatch { name: Some("Renamed".to_string()), ..ProductPatch::default() };
        assert_eq!(repo.update_available(created.id, &patch).await.expect("update"), None);
        assert_eq!(repo.find_available_by_id(created.id).await.expect("find"), None);

        let (name,): (String,) = sqlx::query_as("SELECT name FROM product WHERE id = ?")
            .bind(created.id.0)
            .fetch_one(&pool)
            .await
            .expect("row is kept after soft delete");
        assert_eq!(name, "Cable");

        pool.close().await;
    }

    #[tokio::test]
    async fn find_by_ids_returns_only_available_matches() {
        let pool = migrated_pool().await;
        let repo = SqlProductRepository::new(pool.clone());
        for name in ["A", "B", "C"] {
            repo.create(NewProduct::new(name, Decimal::ONE)).await.expect("create");
        }
        repo.mark_unavailable(ProductId(3)).await.expect("remove");

        let found = repo
            .find_available_by_ids(&[ProductId(3), ProductId(1), ProductId(42)])
            .await
            .expect("find");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ProductId(1));
        assert!(repo.find_available_by_ids(&[]).await.expect("empty").is_empty());

        pool.close().await;
    }
}
