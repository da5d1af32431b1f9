use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use prodcat_catalog::CatalogService;
use prodcat_core::domain::pagination::{Page, Pagination, PaginationQuery};
use prodcat_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};
use prodcat_core::errors::{
    new_correlation_id, ApplicationError, DomainErrorKind, InterfaceError, PayloadError,
};

#[derive(Clone)]
pub struct HttpState {
    catalog: CatalogService,
}

#[derive(Debug, Deserialize)]
pub struct ValidateProductsBody {
    pub ids: Vec<i64>,
}

pub fn router(catalog: CatalogService) -> Router {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/products/validate", post(validate_products))
        .route(
            "/products/{id}",
            get(find_product).patch(update_product).delete(remove_product),
        )
        .with_state(HttpState { catalog })
}

/// HTTP rendering of an [`InterfaceError`].
#[derive(Debug)]
pub struct HttpError(pub InterfaceError);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.0.message(),
            "correlationId": self.0.correlation_id(),
        });
        if !self.0.missing().is_empty() {
            body["missing"] = json!(self.0.missing());
        }
        (status, Json(body)).into_response()
    }
}

impl From<PayloadError> for HttpError {
    fn from(error: PayloadError) -> Self {
        Self(error.into_interface(new_correlation_id()))
    }
}

impl From<ApplicationError> for HttpError {
    fn from(error: ApplicationError) -> Self {
        Self(map_application_error(error, new_correlation_id()))
    }
}

/// Not found stays a 404 here; a failed batch validation is a 400.
pub fn map_application_error(error: ApplicationError, correlation_id: String) -> InterfaceError {
    match error {
        ApplicationError::Domain(domain) => match domain.kind() {
            DomainErrorKind::NotFound => InterfaceError::not_found(domain.message(), correlation_id),
            DomainErrorKind::ValidationFailed => {
                InterfaceError::products_missing(&domain, correlation_id)
            }
        },
        other => {
            error!(
                event_name = "system.http.request_failed",
                correlation_id = %correlation_id,
                error = %other,
                "catalog request failed"
            );
            InterfaceError::internal(correlation_id)
        }
    }
}

type HttpResult<T> = Result<T, HttpError>;

fn parse_id(raw: &str) -> Result<ProductId, PayloadError> {
    raw.trim()
        .parse::<i64>()
        .map(ProductId)
        .map_err(|_| PayloadError::new("id", "Validation failed (numeric string is expected)"))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, PayloadError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| PayloadError::new("body", rejection.body_text()))
}

async fn create_product(
    State(state): State<HttpState>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> HttpResult<(StatusCode, Json<Product>)> {
    let payload = json_body(body)?;
    payload.validate()?;
    let product = state.catalog.create(payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn list_products(
    State(state): State<HttpState>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> HttpResult<Json<Page<Product>>> {
    let Query(query) =
        query.map_err(|rejection| PayloadError::new("query", rejection.body_text()))?;
    let pagination = Pagination::try_from(query)?;
    Ok(Json(state.catalog.find_all(pagination).await?))
}

async fn find_product(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> HttpResult<Json<Product>> {
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.find_one(id).await?))
}

async fn update_product(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    body: Result<Json<ProductPatch>, JsonRejection>,
) -> HttpResult<Json<Product>> {
    let id = parse_id(&id)?;
    let patch = json_body(body)?;
    patch.validate()?;
    Ok(Json(state.catalog.update(id, patch).await?))
}

async fn remove_product(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> HttpResult<Json<Product>> {
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.remove(id).await?))
}

async fn validate_products(
    State(state): State<HttpState>,
    body: Result<Json<ValidateProductsBody>, JsonRejection>,
) -> HttpResult<Json<Vec<Product>>> {
    let body = json_body(body)?;
    if body.ids.is_empty() {
        return Err(PayloadError::new("ids", "ids must contain at least 1 element").into());
    }
    let ids: Vec<ProductId> = body.ids.into_iter().map(ProductId).collect();
    Ok(Json(state.catalog.validate_products(&ids).await?))
}
