use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use prodcat_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};

use super::{ProductRepository, RepositoryError};

#[derive(Default)]
struct CatalogTable {
    last_id: i64,
    rows: BTreeMap<ProductId, Product>,
}

/// Process-local product store with the same visibility rules as the SQL store.
#[derive(Default)]
pub struct InMemoryProductRepository {
    table: RwLock<CatalogTable>,
}

impl InMemoryProductRepository {
    /// Every stored row, including soft-deleted ones.
    pub async fn all_rows(&self) -> Vec<Product> {
        self.table.read().await.rows.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let now = Utc::now();
        let created = Product {
            id: ProductId(table.last_id),
            name: product.name,
            description: product.description,
            price: product.price,
            available: true,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn count_available(&self) -> Result<u64, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|product| product.available).count() as u64)
    }

    async fn find_available(&self, skip: u64, take: u64) -> Result<Vec<Product>, RepositoryError> {
        let table = self.table.read().await;
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let take = usize::try_from(take).unwrap_or(usize::MAX);
        Ok(table
            .rows
            .values()
            .filter(|product| product.available)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn find_available_by_id(
        &self,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).filter(|product| product.available).cloned())
    }

    async fn find_available_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|product| product.available && ids.contains(&product.id))
            .cloned()
            .collect())
    }

    async fn update_available(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut table = self.table.write().await;
        let Some(product) = table.rows.get_mut(&id).filter(|product| product.available) else {
            return Ok(None);
        };

        if patch.apply_to(product) {
            product.updated_at = Utc::now();
        }
        Ok(Some(product.clone()))
    }

    async fn mark_unavailable(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut table = self.table.write().await;
        let Some(product) = table.rows.get_mut(&id).filter(|product| product.available) else {
            return Ok(None);
        };

        product.available = false;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use prodcat_core::domain::product::{NewProduct, ProductId, ProductPatch};

    use crate::repositories::{InMemoryProductRepository, ProductRepository};

    #[tokio::test]
    async fn in_memory_ids_are_sequential() {
        let repo = InMemoryProductRepository::default();

        let first = repo.create(NewProduct::new("A", Decimal::ONE)).await.expect("create");
        let second = repo.create(NewProduct::new("B", Decimal::ONE)).await.expect("create");

        assert_eq!((first.id, second.id), (ProductId(1), ProductId(2)));
    }

    #[tokio::test]
    async fn in_memory_soft_delete_keeps_the_row() {
        let repo = InMemoryProductRepository::default();
        let created = repo.create(NewProduct::new("A", Decimal::ONE)).await.expect("create");

        repo.mark_unavailable(created.id).await.expect("remove").expect("was available");

        assert_eq!(repo.count_available().await.expect("count"), 0);
        assert_eq!(repo.find_available_by_id(created.id).await.expect("find"), None);
        let rows = repo.all_rows().await;
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].available);
    }

    #[tokio::test]
    async fn in_memory_update_ignores_unavailable_rows() {
        let repo = InMemoryProductRepository::default();
        let created = repo.create(NewProduct::new("A", Decimal::ONE)).await.expect("create");
        repo.mark_unavailable(created.id).await.expect("remove");

        let patch = ProductPatch { price: Some(Decimal::TEN), ..ProductPatch::default() };
        assert_eq!(repo.update_available(created.id, &patch).await.expect("update"), None);
        assert_eq!(repo.all_rows().await[0].price, Decimal::ONE);
    }
}
