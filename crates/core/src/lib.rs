pub mod config;
pub mod domain;
pub mod errors;

pub use domain::pagination::{Page, PageMeta, Pagination, PaginationQuery};
pub use domain::product::{NewProduct, Product, ProductId, ProductPatch};
pub use errors::{
    new_correlation_id, ApplicationError, DomainError, DomainErrorKind, InterfaceError,
    PayloadError,
};
