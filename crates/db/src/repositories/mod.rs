use async_trait::async_trait;
use thiserror::Error;

use prodcat_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};
use prodcat_core::errors::ApplicationError;

pub mod memory;
pub mod product;

pub use memory::InMemoryProductRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        Self::Persistence(error.to_string())
    }
}

/// Storage for the product catalog.
///
/// Every read only sees rows with `available = true`; rows are never deleted.
/// Reads that return several rows order them by id ascending.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    async fn count_available(&self) -> Result<u64, RepositoryError>;

    async fn find_available(&self, skip: u64, take: u64) -> Result<Vec<Product>, RepositoryError>;

    async fn find_available_by_id(&self, id: ProductId)
        -> Result<Option<Product>, RepositoryError>;

    async fn find_available_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Merges `patch` into an available row. `None` when no available row matched
    /// at write time.
    async fn update_available(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Sets `available = false` on an available row. `None` when no available row
    /// matched at write time.
    async fn mark_unavailable(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}
