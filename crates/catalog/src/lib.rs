//! Product catalog business rules.
//!
//! [`CatalogService`] owns the lifecycle of products on top of any
//! [`ProductRepository`](prodcat_db::ProductRepository): creation, paginated
//! listing, lookup, partial update, soft delete and batch validation.

pub mod service;

pub use service::{CatalogResult, CatalogService};
