use rust_decimal::Decimal;

use prodcat_core::domain::product::{NewProduct, ProductId};

use crate::repositories::{ProductRepository, RepositoryError};

/// (name, description, price in cents)
const DEMO_PRODUCTS: &[(&str, &str, i64)] = &[
    ("Mechanical Keyboard", "Tenkeyless, hot-swappable switches", 8999),
    ("Wireless Mouse", "Ergonomic, 2.4 GHz receiver", 2999),
    ("USB-C Hub", "7-in-1, 100 W passthrough", 4550),
    ("27\" Monitor", "QHD IPS panel", 27900),
    ("Laptop Stand", "Aluminium, adjustable height", 3999),
    ("Webcam", "1080p with privacy shutter", 5999),
    ("Desk Mat", "900 x 400 mm", 1999),
    ("Noise-cancelling Headphones", "Over-ear, 30 h battery", 19900),
];

/// Deterministic demo catalog for local development and smoke checks.
pub struct DemoCatalog;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub created: Vec<ProductId>,
}

impl DemoCatalog {
    pub fn products() -> Vec<NewProduct> {
        DEMO_PRODUCTS
            .iter()
            .map(|(name, description, cents)| {
                NewProduct::new(*name, Decimal::new(*cents, 2)).with_description(*description)
            })
            .collect()
    }

    pub async fn load(repository: &dyn ProductRepository) -> Result<SeedResult, RepositoryError> {
        let mut created = Vec::with_capacity(DEMO_PRODUCTS.len());
        for product in Self::products() {
            created.push(repository.create(product).await?.id);
        }
        tracing::info!(
            event_name = "catalog.seed.loaded",
            products = created.len(),
            "demo catalog loaded"
        );
        Ok(SeedResult { created })
    }
}

#[cfg(test)]
mod tests {
    use super::DemoCatalog;
    use crate::repositories::{InMemoryProductRepository, ProductRepository};

    #[test]
    fn demo_products_pass_payload_validation() {
        for product in DemoCatalog::products() {
            product.validate().expect("demo product should be valid");
        }
    }

    #[tokio::test]
    async fn load_creates_every_demo_product() {
        let repo = InMemoryProductRepository::default();

        let result = DemoCatalog::load(&repo).await.expect("seed");

        assert_eq!(result.created.len(), DemoCatalog::products().len());
        assert_eq!(repo.count_available().await.expect("count"), result.created.len() as u64);
    }
}
