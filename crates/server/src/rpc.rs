//! Message-pattern binding of the catalog.
//!
//! Each TCP connection carries newline-delimited JSON requests of the form
//! `{"id": <any>, "pattern": "find_one_product", "data": {...}}`. The pattern may
//! also be given as `{"cmd": "find_one_product"}`. Every request gets exactly one
//! reply line, `{"id", "response"}` on success or `{"id", "err": {status, message}}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use prodcat_catalog::CatalogService;
use prodcat_core::domain::pagination::{Pagination, PaginationQuery};
use prodcat_core::domain::product::{NewProduct, ProductId, ProductPatch};
use prodcat_core::errors::{
    new_correlation_id, ApplicationError, DomainErrorKind, InterfaceError, PayloadError,
};

pub const CREATE_PRODUCT: &str = "create_product";
pub const FIND_ALL_PRODUCTS: &str = "find_all_products";
pub const FIND_ONE_PRODUCT: &str = "find_one_product";
pub const UPDATE_PRODUCT: &str = "update_product";
pub const DELETE_PRODUCT: &str = "delete_product";
pub const VALIDATE_PRODUCTS: &str = "validate_products";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pattern {
    Name(String),
    Cmd { cmd: String },
}

impl Pattern {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Name(name) | Self::Cmd { cmd: name } => name,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub pattern: Pattern,
    #[serde(default)]
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorEnvelope {
    pub status: u16,
    pub message: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<ProductId>,
}

impl From<InterfaceError> for RpcErrorEnvelope {
    fn from(error: InterfaceError) -> Self {
        Self {
            status: error.status_code(),
            message: error.message().to_owned(),
            correlation_id: error.correlation_id().to_owned(),
            missing: error.missing().to_vec(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RpcReply {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<RpcErrorEnvelope>,
}

#[derive(Debug, Deserialize)]
struct IdPayload {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdatePayload {
    id: i64,
    #[serde(flatten)]
    patch: ProductPatch,
}

/// Both domain error kinds travel as a 400 on this binding; a failed batch
/// validation also lists the missing ids.
pub fn map_application_error(error: ApplicationError, correlation_id: String) -> InterfaceError {
    match error {
        ApplicationError::Domain(domain) => match domain.kind() {
            DomainErrorKind::NotFound => {
                InterfaceError::bad_request(domain.message(), correlation_id)
            }
            DomainErrorKind::ValidationFailed => {
                InterfaceError::products_missing(&domain, correlation_id)
            }
        },
        other => {
            error!(
                event_name = "system.rpc.request_failed",
                correlation_id = %correlation_id,
                error = %other,
                "catalog message failed"
            );
            InterfaceError::internal(correlation_id)
        }
    }
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T, PayloadError> {
    serde_json::from_value(data).map_err(|e| PayloadError::new("data", e.to_string()))
}

#[derive(Clone)]
pub struct RpcDispatcher {
    catalog: CatalogService,
}

enum DispatchError {
    Payload(PayloadError),
    Application(ApplicationError),
    UnknownPattern(String),
    Serialize(serde_json::Error),
}

impl DispatchError {
    fn into_interface(self, correlation_id: String) -> InterfaceError {
        match self {
            Self::Payload(error) => error.into_interface(correlation_id),
            Self::Application(error) => map_application_error(error, correlation_id),
            Self::UnknownPattern(pattern) => {
                warn!(event_name = "system.rpc.unknown_pattern", pattern = %pattern, "no handler");
                InterfaceError::not_found(
                    format!("There is no matching message handler defined for `{pattern}`"),
                    correlation_id,
                )
            }
            Self::Serialize(error) => {
                error!(
                    event_name = "system.rpc.response_encoding_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "catalog reply could not be encoded"
                );
                InterfaceError::internal(correlation_id)
            }
        }
    }
}

impl From<PayloadError> for DispatchError {
    fn from(error: PayloadError) -> Self {
        Self::Payload(error)
    }
}

impl From<ApplicationError> for DispatchError {
    fn from(error: ApplicationError) -> Self {
        Self::Application(error)
    }
}

impl RpcDispatcher {
    pub fn new(catalog: CatalogService) -> Self {
        Self { catalog }
    }

    pub async fn dispatch(&self, pattern: &str, data: Value) -> Result<Value, RpcErrorEnvelope> {
        self.route(pattern, data)
            .await
            .map_err(|error| error.into_interface(new_correlation_id()).into())
    }

    async fn route(&self, pattern: &str, data: Value) -> Result<Value, DispatchError> {
        match pattern {
            CREATE_PRODUCT => {
                let new_product: NewProduct = payload(data)?;
                new_product.validate()?;
                to_value(self.catalog.create(new_product).await?)
            }
            FIND_ALL_PRODUCTS => {
                let query: PaginationQuery =
                    if data.is_null() { PaginationQuery::default() } else { payload(data)? };
                to_value(self.catalog.find_all(Pagination::try_from(query)?).await?)
            }
            FIND_ONE_PRODUCT => {
                let IdPayload { id } = payload(data)?;
                to_value(self.catalog.find_one(ProductId(id)).await?)
            }
            UPDATE_PRODUCT => {
                let UpdatePayload { id, patch } = payload(data)?;
                patch.validate()?;
                to_value(self.catalog.update(ProductId(id), patch).await?)
            }
            DELETE_PRODUCT => {
                let IdPayload { id } = payload(data)?;
                to_value(self.catalog.remove(ProductId(id)).await?)
            }
            VALIDATE_PRODUCTS => {
                let ids: Vec<i64> = payload(data)?;
                if ids.is_empty() {
                    return Err(
                        PayloadError::new("ids", "ids must contain at least 1 element").into()
                    );
                }
                let ids: Vec<ProductId> = ids.into_iter().map(ProductId).collect();
                to_value(self.catalog.validate_products(&ids).await?)
            }
            other => Err(DispatchError::UnknownPattern(other.to_owned())),
        }
    }

    /// Turns one request line into one reply line (without the trailing newline).
    pub async fn handle_line(&self, line: &str) -> String {
        let reply = match serde_json::from_str::<RpcRequest>(line) {
            Ok(request) => {
                debug!(
                    event_name = "system.rpc.message_received",
                    pattern = request.pattern.as_str(),
                    "rpc message received"
                );
                match self.dispatch(request.pattern.as_str(), request.data).await {
                    Ok(response) => RpcReply { id: request.id, response: Some(response), err: None },
                    Err(envelope) => RpcReply { id: request.id, response: None, err: Some(envelope) },
                }
            }
            Err(error) => RpcReply {
                id: Value::Null,
                response: None,
                err: Some(
                    InterfaceError::bad_request(
                        format!("malformed message: {error}"),
                        new_correlation_id(),
                    )
                    .into(),
                ),
            },
        };

        serde_json::to_string(&reply).unwrap_or_else(|error| {
            format!(
                "{{\"id\":null,\"err\":{{\"status\":500,\"message\":\"{}\"}}}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(DispatchError::Serialize)
}

/// Accepts connections on `address` until `shutdown` flips to true.
pub async fn serve(
    address: String,
    dispatcher: RpcDispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&address).await?;
    info!(
        event_name = "system.rpc.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "rpc endpoint listening"
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let dispatcher = dispatcher.clone();
                let connection_shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(error) = handle_connection(stream, dispatcher, connection_shutdown).await {
                        warn!(
                            event_name = "system.rpc.connection_error",
                            peer = %peer,
                            error = %error,
                            "rpc connection closed with error"
                        );
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }

    info!(event_name = "system.rpc.stopped", bind_address = %address, "rpc endpoint stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: RpcDispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.changed() => None,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let mut reply = dispatcher.handle_line(&line).await;
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
    }

    writer.shutdown().await
}
