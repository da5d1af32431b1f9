use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use prodcat_core::domain::pagination::{Page, PageMeta, Pagination};
use prodcat_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};
use prodcat_core::errors::{ApplicationError, DomainError};
use prodcat_db::ProductRepository;

pub type CatalogResult<T> = Result<T, ApplicationError>;

#[derive(Clone)]
pub struct CatalogService {
    repository: Arc<dyn ProductRepository>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn ProductRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(&self, payload: NewProduct) -> CatalogResult<Product> {
        let product = self.repository.create(payload).await?;
        info!(
            event_name = "catalog.product.created",
            product_id = product.id.0,
            "product created"
        );
        Ok(product)
    }

    pub async fn find_all(&self, pagination: Pagination) -> CatalogResult<Page<Product>> {
        let total = self.repository.count_available().await?;
        let last_page = pagination.last_page(total);
        let data = self
            .repository
            .find_available(pagination.offset(), u64::from(pagination.limit()))
            .await?;

        debug!(
            event_name = "catalog.product.listed",
            page = pagination.page(),
            limit = pagination.limit(),
            total,
            returned = data.len(),
            "product page listed"
        );

        Ok(Page { data, meta: PageMeta { page: pagination.page(), total, last_page } })
    }

    pub async fn find_one(&self, id: ProductId) -> CatalogResult<Product> {
        self.repository
            .find_available_by_id(id)
            .await?
            .ok_or_else(|| DomainError::product_not_found(id).into())
    }

    /// The write only matches an available row, so a product removed after the
    /// existence check surfaces as not found rather than a stale success.
    pub async fn update(&self, id: ProductId, patch: ProductPatch) -> CatalogResult<Product> {
        self.find_one(id).await?;

        let product = self
            .repository
            .update_available(id, &patch)
            .await?
            .ok_or_else(|| ApplicationError::from(DomainError::product_not_found(id)))?;

        info!(event_name = "catalog.product.updated", product_id = id.0, "product updated");
        Ok(product)
    }

    pub async fn remove(&self, id: ProductId) -> CatalogResult<Product> {
        self.find_one(id).await?;

        let product = self
            .repository
            .mark_unavailable(id)
            .await?
            .ok_or_else(|| ApplicationError::from(DomainError::product_not_found(id)))?;

        info!(
            event_name = "catalog.product.removed",
            product_id = id.0,
            "product marked unavailable"
        );
        Ok(product)
    }

    /// Confirms that every id refers to an available product, in one round trip.
    pub async fn validate_products(&self, ids: &[ProductId]) -> CatalogResult<Vec<Product>> {
        let requested: BTreeSet<ProductId> = ids.iter().copied().collect();
        let lookup: Vec<ProductId> = requested.iter().copied().collect();

        let products = self.repository.find_available_by_ids(&lookup).await?;
        if products.len() == requested.len() {
            return Ok(products);
        }

        let found: BTreeSet<ProductId> = products.iter().map(|product| product.id).collect();
        let missing: Vec<ProductId> = requested.difference(&found).copied().collect();

        info!(
            event_name = "catalog.product.validation_failed",
            requested = requested.len(),
            missing = missing.len(),
            "batch product validation failed"
        );
        Err(DomainError::products_not_found(missing).into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use prodcat_core::domain::pagination::Pagination;
    use prodcat_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};
    use prodcat_core::errors::{ApplicationError, DomainErrorKind};
    use prodcat_db::{InMemoryProductRepository, ProductRepository, RepositoryError};

    use super::CatalogService;

    fn service() -> (CatalogService, Arc<InMemoryProductRepository>) {
        let repository = Arc::new(InMemoryProductRepository::default());
        (CatalogService::new(repository.clone()), repository)
    }

    async fn seed(service: &CatalogService, count: i64) {
        for index in 1..=count {
            service
                .create(NewProduct::new(format!("Product {index}"), Decimal::new(index * 100, 2)))
                .await
                .expect("seed product");
        }
    }

    fn domain_kind(error: &ApplicationError) -> Option<DomainErrorKind> {
        error.domain_kind()
    }

    #[tokio::test]
    async fn create_then_find_one_returns_payload_with_id() {
        let (service, _) = service();
        let payload =
            NewProduct::new("Monitor", Decimal::new(27900, 2)).with_description("27 inch");

        let created = service.create(payload.clone()).await.expect("create");
        let found = service.find_one(created.id).await.expect("find");

        assert_eq!(found.name, payload.name);
        assert_eq!(found.description, payload.description);
        assert_eq!(found.price, payload.price);
        assert!(found.available);
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn find_one_unknown_id_is_not_found() {
        let (service, _) = service();

        let error = service.find_one(ProductId(404)).await.expect_err("missing");

        assert_eq!(domain_kind(&error), Some(DomainErrorKind::NotFound));
        assert_eq!(error.to_string(), "Product with ID #404 not found");
    }

    #[tokio::test]
    async fn find_all_first_page_of_twenty_five() {
        let (service, _) = service();
        seed(&service, 25).await;

        let page = service.find_all(Pagination::new(1, 10).expect("valid")).await.expect("page");

        assert_eq!(page.data.len(), 10);
        assert_eq!((page.meta.page, page.meta.total, page.meta.last_page), (1, 25, 3));
        assert_eq!(page.data[0].id, ProductId(1));
    }

    #[tokio::test]
    async fn find_all_last_page_is_partial() {
        let (service, _) = service();
        seed(&service, 25).await;

        let page = service.find_all(Pagination::new(3, 10).expect("valid")).await.expect("page");

        let ids: Vec<i64> = page.data.iter().map(|product| product.id.0).collect();
        assert_eq!(ids, vec![21, 22, 23, 24, 25]);
    }

    #[tokio::test]
    async fn find_all_beyond_last_page_is_empty_with_same_meta() {
        let (service, _) = service();
        seed(&service, 25).await;

        let page = service.find_all(Pagination::new(4, 10).expect("valid")).await.expect("page");

        assert!(page.data.is_empty());
        assert_eq!((page.meta.page, page.meta.total, page.meta.last_page), (4, 25, 3));
    }

    #[tokio::test]
    async fn find_all_excludes_removed_products() {
        let (service, _) = service();
        seed(&service, 3).await;
        service.remove(ProductId(2)).await.expect("remove");

        let page = service.find_all(Pagination::default()).await.expect("page");

        let ids: Vec<i64> = page.data.iter().map(|product| product.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!((page.meta.total, page.meta.last_page), (2, 1));
    }

    #[tokio::test]
    async fn update_with_foreign_id_only_changes_price() {
        let (service, _) = service();
        seed(&service, 1).await;
        let patch: ProductPatch =
            serde_json::from_value(serde_json::json!({ "id": 999, "price": 50 }))
                .expect("patch body");

        let updated = service.update(ProductId(1), patch).await.expect("update");

        assert_eq!(updated.id, ProductId(1));
        assert_eq!(updated.price, Decimal::from(50));
        assert_eq!(updated.name, "Product 1");
        assert_eq!(
            service.find_one(ProductId(999)).await.expect_err("no new id").domain_kind(),
            Some(DomainErrorKind::NotFound)
        );
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let (service, _) = service();

        let error = service
            .update(ProductId(8), ProductPatch { name: Some("x".into()), ..Default::default() })
            .await
            .expect_err("missing");

        assert_eq!(error.to_string(), "Product with ID #8 not found");
    }

    #[tokio::test]
    async fn remove_hides_product_but_keeps_row() {
        let (service, repository) = service();
        seed(&service, 1).await;

        let removed = service.remove(ProductId(1)).await.expect("remove");
        assert!(!removed.available);

        let error = service.find_one(ProductId(1)).await.expect_err("hidden");
        assert_eq!(error.domain_kind(), Some(DomainErrorKind::NotFound));
        assert_eq!(repository.all_rows().await.len(), 1);

        let again = service.remove(ProductId(1)).await.expect_err("already removed");
        assert_eq!(again.domain_kind(), Some(DomainErrorKind::NotFound));
    }

    #[tokio::test]
    async fn removed_product_fails_batch_validation() {
        let (service, _) = service();
        seed(&service, 2).await;
        service.remove(ProductId(2)).await.expect("remove");

        let error = service.validate_products(&[ProductId(2)]).await.expect_err("invalid");

        assert_eq!(error.domain_kind(), Some(DomainErrorKind::ValidationFailed));
        assert_eq!(error.to_string(), "Products with IDs #2 not found");
    }

    #[tokio::test]
    async fn validate_collapses_duplicates() {
        let (service, _) = service();
        seed(&service, 2).await;

        let products = service
            .validate_products(&[ProductId(1), ProductId(1), ProductId(2)])
            .await
            .expect("valid");

        let ids: Vec<ProductId> = products.iter().map(|product| product.id).collect();
        assert_eq!(ids, vec![ProductId(1), ProductId(2)]);
    }

    #[tokio::test]
    async fn validate_lists_only_missing_ids() {
        let (service, _) = service();
        seed(&service, 1).await;

        let error =
            service.validate_products(&[ProductId(1), ProductId(99)]).await.expect_err("invalid");

        let message = error.to_string();
        assert!(message.contains("99"));
        assert!(!message.contains("#1,"));
        assert_eq!(message, "Products with IDs #99 not found");
    }

    #[tokio::test]
    async fn validate_empty_input_is_trivially_valid() {
        let (service, _) = service();

        assert!(service.validate_products(&[]).await.expect("empty").is_empty());
    }

    /// Reports every row as present but loses every write, like a concurrent
    /// remove landing between the existence check and the update.
    struct RacingRepository {
        inner: InMemoryProductRepository,
    }

    #[async_trait::async_trait]
    impl ProductRepository for RacingRepository {
        async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
            self.inner.create(product).await
        }

        async fn count_available(&self) -> Result<u64, RepositoryError> {
            self.inner.count_available().await
        }

        async fn find_available(
            &self,
            skip: u64,
            take: u64,
        ) -> Result<Vec<Product>, RepositoryError> {
            self.inner.find_available(skip, take).await
        }

        async fn find_available_by_id(
            &self,
            id: ProductId,
        ) -> Result<Option<Product>, RepositoryError> {
            self.inner.find_available_by_id(id).await
        }

        async fn find_available_by_ids(
            &self,
            ids: &[ProductId],
        ) -> Result<Vec<Product>, RepositoryError> {
            self.inner.find_available_by_ids(ids).await
        }

        async fn update_available(
            &self,
            _id: ProductId,
            _patch: &ProductPatch,
        ) -> Result<Option<Product>, RepositoryError> {
            Ok(None)
        }

        async fn mark_unavailable(
            &self,
            _id: ProductId,
        ) -> Result<Option<Product>, RepositoryError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn lost_write_race_surfaces_as_not_found() {
        let repository = Arc::new(RacingRepository { inner: InMemoryProductRepository::default() });
        let service = CatalogService::new(repository);
        seed(&service, 1).await;

        let update = service
            .update(ProductId(1), ProductPatch { price: Some(Decimal::ONE), ..Default::default() })
            .await
            .expect_err("row vanished");
        let remove = service.remove(ProductId(1)).await.expect_err("row vanished");

        assert_eq!(update.domain_kind(), Some(DomainErrorKind::NotFound));
        assert_eq!(remove.domain_kind(), Some(DomainErrorKind::NotFound));
    }

    struct BrokenRepository;

    #[async_trait::async_trait]
    impl ProductRepository for BrokenRepository {
        async fn create(&self, _product: NewProduct) -> Result<Product, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn count_available(&self) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn find_available(
            &self,
            _skip: u64,
            _take: u64,
        ) -> Result<Vec<Product>, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn find_available_by_id(
            &self,
            _id: ProductId,
        ) -> Result<Option<Product>, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn find_available_by_ids(
            &self,
            _ids: &[ProductId],
        ) -> Result<Vec<Product>, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn update_available(
            &self,
            _id: ProductId,
            _patch: &ProductPatch,
        ) -> Result<Option<Product>, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn mark_unavailable(
            &self,
            _id: ProductId,
        ) -> Result<Option<Product>, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn store_failures_propagate_as_persistence_errors() {
        let service = CatalogService::new(Arc::new(BrokenRepository));

        let create = service.create(NewProduct::new("x", Decimal::ONE)).await.expect_err("fail");
        let find = service.find_one(ProductId(1)).await.expect_err("fail");

        assert!(matches!(create, ApplicationError::Persistence(ref message) if message.contains("disk full")));
        assert!(matches!(find, ApplicationError::Persistence(_)));
        assert_eq!(find.domain_kind(), None);
    }
}
