use thiserror::Error;
use uuid::Uuid;

use crate::domain::product::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainErrorKind {
    /// No available product matches a single id.
    NotFound,
    /// One or more ids of a batch have no available product.
    ValidationFailed,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DomainError {
    kind: DomainErrorKind,
    message: String,
    missing: Vec<ProductId>,
}

impl DomainError {
    pub fn product_not_found(id: ProductId) -> Self {
        Self {
            kind: DomainErrorKind::NotFound,
            message: format!("Product with ID #{id} not found"),
            missing: vec![id],
        }
    }

    pub fn products_not_found(missing: Vec<ProductId>) -> Self {
        let listed = missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        Self {
            kind: DomainErrorKind::ValidationFailed,
            message: format!("Products with IDs #{listed} not found"),
            missing,
        }
    }

    pub fn kind(&self) -> DomainErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn missing(&self) -> &[ProductId] {
        &self.missing
    }
}

/// A request payload rejected before it reached the catalog.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PayloadError {
    field: &'static str,
    message: String,
}

impl PayloadError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    pub fn domain_kind(&self) -> Option<DomainErrorKind> {
        match self {
            Self::Domain(error) => Some(error.kind()),
            Self::Persistence(_) => None,
        }
    }
}

/// Error shape handed to a transport binding. Each binding decides how the
/// application error maps onto these variants.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String, missing: Vec<ProductId> },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn not_found(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::NotFound { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn bad_request(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.into(),
            missing: Vec::new(),
        }
    }

    /// Bad request naming the ids a batch validation could not find.
    pub fn products_missing(error: &DomainError, correlation_id: impl Into<String>) -> Self {
        Self::BadRequest {
            message: error.message().to_owned(),
            correlation_id: correlation_id.into(),
            missing: error.missing().to_vec(),
        }
    }

    /// Internal failures never echo the underlying cause back to the caller.
    pub fn internal(correlation_id: impl Into<String>) -> Self {
        Self::Internal {
            message: "Internal server error".to_owned(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::BadRequest { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message, .. }
            | Self::BadRequest { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    /// Ids reported missing by a failed batch validation; empty otherwise.
    pub fn missing(&self) -> &[ProductId] {
        match self {
            Self::BadRequest { missing, .. } => missing,
            Self::NotFound { .. } | Self::Internal { .. } => &[],
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl PayloadError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::bad_request(self.message, correlation_id)
    }
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use crate::domain::product::ProductId;
    use crate::errors::{
        ApplicationError, DomainError, DomainErrorKind, InterfaceError, PayloadError,
    };

    #[test]
    fn not_found_message_names_the_id() {
        let error = DomainError::product_not_found(ProductId(42));

        assert_eq!(error.kind(), DomainErrorKind::NotFound);
        assert_eq!(error.to_string(), "Product with ID #42 not found");
    }

    #[test]
    fn validation_failed_lists_every_missing_id() {
        let error = DomainError::products_not_found(vec![ProductId(3), ProductId(99)]);

        assert_eq!(error.kind(), DomainErrorKind::ValidationFailed);
        assert_eq!(error.message(), "Products with IDs #3, 99 not found");
        assert_eq!(error.missing(), &[ProductId(3), ProductId(99)]);
    }

    #[test]
    fn application_error_exposes_domain_kind() {
        let error = ApplicationError::from(DomainError::product_not_found(ProductId(1)));
        assert_eq!(error.domain_kind(), Some(DomainErrorKind::NotFound));
        assert_eq!(ApplicationError::Persistence("locked".to_owned()).domain_kind(), None);
    }

    #[test]
    fn internal_interface_error_hides_cause() {
        let interface = InterfaceError::internal("req-1");

        assert_eq!(interface.status_code(), 500);
        assert_eq!(interface.message(), "Internal server error");
        assert_eq!(interface.correlation_id(), "req-1");
    }

    #[test]
    fn products_missing_carries_the_missing_ids() {
        let domain = DomainError::products_not_found(vec![ProductId(4), ProductId(8)]);

        let interface = InterfaceError::products_missing(&domain, "req-3");

        assert_eq!(interface.status_code(), 400);
        assert_eq!(interface.message(), "Products with IDs #4, 8 not found");
        assert_eq!(interface.missing(), &[ProductId(4), ProductId(8)]);
        assert!(InterfaceError::bad_request("bad", "req-4").missing().is_empty());
    }

    #[test]
    fn payload_error_maps_to_bad_request() {
        let interface = PayloadError::new("price", "price must not be less than 0")
            .into_interface("req-2");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref message, .. } if message.contains("price")
        ));
        assert_eq!(interface.status_code(), 400);
    }
}
