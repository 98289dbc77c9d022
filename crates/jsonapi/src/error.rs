//! Error types for the JSON:API layer.
//!
//! Every error that terminates a request is a [`JsonApiError`]. It renders as
//! a JSON:API error document with one error object per problem.
//!
//! # Error Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | BadRequest | 400 |
//! | AccessDenied | 403 |
//! | NotFound | 404 |
//! | NotAcceptable | 406 |
//! | Conflict | 409 |
//! | UnsupportedMediaType | 415 |
//! | UnprocessableEntity | 422 |
//! | Internal | 500 |
//!
//! Storage errors convert automatically: missing entities become 404,
//! duplicate creates become 409, query errors become 400 and everything else
//! is a 500.

use std::fmt;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use helios_entity::access::AccessResult;
use helios_entity::error::{BackendError, EntityError, QueryError, SchemaError, StorageError};
use helios_entity::Entity;
use serde_json::{Map, Value, json};

use crate::middleware::content_type::JSONAPI_MEDIA_TYPE;
use crate::resource_type::ResourceTypeError;
use crate::responses::document::jsonapi_object;

/// One constraint violation of an unprocessable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorViolation {
    /// Human-readable detail.
    pub detail: String,
    /// JSON pointer to the offending member, if known.
    pub pointer: Option<String>,
}

impl ErrorViolation {
    /// Creates a violation.
    pub fn new(detail: impl Into<String>, pointer: Option<String>) -> Self {
        Self {
            detail: detail.into(),
            pointer,
        }
    }
}

/// The primary error type for JSON:API operations.
#[derive(Debug, Clone)]
pub enum JsonApiError {
    /// Malformed request (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
        /// JSON pointer to the offending member.
        pointer: Option<String>,
    },

    /// Entity- or field-level access failure (HTTP 403).
    AccessDenied {
        /// Error message.
        message: String,
        /// JSON pointer locating the denied part of the document.
        pointer: Option<String>,
        /// Reason given by the access policy.
        reason: Option<String>,
        /// `/type--bundle/uuid` of the denied entity.
        resource: Option<String>,
    },

    /// Unknown resource, relationship or route target (HTTP 404).
    NotFound {
        /// Error message.
        message: String,
    },

    /// No acceptable representation (HTTP 406).
    NotAcceptable {
        /// Error message.
        message: String,
    },

    /// Conflicting request (HTTP 409).
    Conflict {
        /// Error message.
        message: String,
    },

    /// Unsupported request body media type (HTTP 415).
    UnsupportedMediaType {
        /// Error message.
        message: String,
    },

    /// Well-formed but semantically invalid request (HTTP 422).
    UnprocessableEntity {
        /// One entry per violation.
        violations: Vec<ErrorViolation>,
    },

    /// Broken invariant (HTTP 500).
    Internal {
        /// Error message.
        message: String,
    },
}

/// Result type for JSON:API operations.
pub type JsonApiResult<T> = Result<T, JsonApiError>;

impl JsonApiError {
    /// Creates a 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        JsonApiError::BadRequest {
            message: message.into(),
            pointer: None,
        }
    }

    /// Creates a 403 error without a pointer.
    pub fn access_denied(message: impl Into<String>) -> Self {
        JsonApiError::AccessDenied {
            message: message.into(),
            pointer: None,
            reason: None,
            resource: None,
        }
    }

    /// Creates a 403 error for a denied operation on an entity.
    ///
    /// The access result's reason, if any, is appended to the detail.
    pub fn entity_access_denied(
        entity: &Entity,
        type_name: &str,
        access: &AccessResult,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        JsonApiError::AccessDenied {
            message: message.into(),
            pointer: Some(pointer.into()),
            reason: access.reason().map(String::from),
            resource: Some(format!("/{}/{}", type_name, entity.uuid())),
        }
    }

    /// Creates a 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        JsonApiError::NotFound {
            message: message.into(),
        }
    }

    /// Creates a 409 error.
    pub fn conflict(message: impl Into<String>) -> Self {
        JsonApiError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a 422 error with a single violation.
    pub fn unprocessable(message: impl Into<String>, pointer: Option<String>) -> Self {
        JsonApiError::UnprocessableEntity {
            violations: vec![ErrorViolation::new(message, pointer)],
        }
    }

    /// Creates a 500 error.
    pub fn internal(message: impl Into<String>) -> Self {
        JsonApiError::Internal {
            message: message.into(),
        }
    }

    /// Sets the JSON pointer of a 400 or 403 error.
    pub fn with_pointer(mut self, new_pointer: impl Into<String>) -> Self {
        match &mut self {
            JsonApiError::BadRequest { pointer, .. } | JsonApiError::AccessDenied { pointer, .. } => {
                *pointer = Some(new_pointer.into());
            }
            _ => {}
        }
        self
    }

    /// Returns the HTTP status code.
    pub fn status(&self) -> StatusCode {
        match self {
            JsonApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            JsonApiError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            JsonApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            JsonApiError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            JsonApiError::Conflict { .. } => StatusCode::CONFLICT,
            JsonApiError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            JsonApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            JsonApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the primary detail message.
    pub fn detail(&self) -> String {
        match self {
            JsonApiError::AccessDenied {
                message, reason, ..
            } => match reason {
                Some(reason) => format!("{} {}", message, reason),
                None => message.clone(),
            },
            JsonApiError::UnprocessableEntity { violations } => violations
                .iter()
                .map(|v| v.detail.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            JsonApiError::BadRequest { message, .. }
            | JsonApiError::NotFound { message }
            | JsonApiError::NotAcceptable { message }
            | JsonApiError::Conflict { message }
            | JsonApiError::UnsupportedMediaType { message }
            | JsonApiError::Internal { message } => message.clone(),
        }
    }

    /// Renders the JSON:API error objects, one per problem.
    ///
    /// `via` is the URL of the request that caused the error.
    pub fn error_objects(&self, via: Option<&str>) -> Vec<Value> {
        let status = self.status();
        match self {
            JsonApiError::UnprocessableEntity { violations } => violations
                .iter()
                .map(|v| error_object(status, &v.detail, v.pointer.as_deref(), None, via))
                .collect(),
            JsonApiError::BadRequest { pointer, .. } => {
                vec![error_object(status, &self.detail(), pointer.as_deref(), None, via)]
            }
            JsonApiError::AccessDenied {
                pointer, resource, ..
            } => vec![error_object(
                status,
                &self.detail(),
                pointer.as_deref(),
                resource.as_deref(),
                via,
            )],
            _ => vec![error_object(status, &self.detail(), None, None, via)],
        }
    }
}

impl fmt::Display for JsonApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonApiError::BadRequest { .. } => write!(f, "Bad request: {}", self.detail()),
            JsonApiError::AccessDenied { .. } => write!(f, "Access denied: {}", self.detail()),
            JsonApiError::NotFound { message } => write!(f, "Not found: {}", message),
            JsonApiError::NotAcceptable { message } => write!(f, "Not acceptable: {}", message),
            JsonApiError::Conflict { message } => write!(f, "Conflict: {}", message),
            JsonApiError::UnsupportedMediaType { message } => {
                write!(f, "Unsupported media type: {}", message)
            }
            JsonApiError::UnprocessableEntity { violations } => {
                write!(f, "Unprocessable entity: {} violation(s)", violations.len())
            }
            JsonApiError::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for JsonApiError {}

/// Rendered errors attached to error responses.
///
/// The error decoration middleware reads this extension to add the request
/// URL and, for privileged accounts, debug metadata.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// The error that produced the response.
    pub error: JsonApiError,
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = error_document(self.error_objects(None));
        let mut response = (status, body.to_string()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSONAPI_MEDIA_TYPE),
        );
        response.extensions_mut().insert(ErrorReport { error: self });
        response
    }
}

/// Wraps error objects in a top-level error document.
pub fn error_document(errors: Vec<Value>) -> Value {
    json!({
        "jsonapi": jsonapi_object(),
        "errors": errors,
    })
}

/// Returns the HTTP reference describing a status code.
pub fn info_link(status: StatusCode) -> Option<String> {
    const RFC2616: &str = "http://www.w3.org/Protocols/rfc2616/rfc2616-sec10.html";
    let section = match status.as_u16() {
        400 => "sec10.4.1",
        403 => "sec10.4.4",
        404 => "sec10.4.5",
        405 => "sec10.4.6",
        406 => "sec10.4.7",
        409 => "sec10.4.10",
        415 => "sec10.4.16",
        422 => return Some("https://tools.ietf.org/html/rfc4918#section-11.2".to_string()),
        500 => "sec10.5.1",
        _ => return None,
    };
    Some(format!("{}#{}", RFC2616, section))
}

/// Builds a single JSON:API error object.
pub fn error_object(
    status: StatusCode,
    detail: &str,
    pointer: Option<&str>,
    id: Option<&str>,
    via: Option<&str>,
) -> Value {
    let mut error = Map::new();
    if let Some(id) = id {
        error.insert("id".to_string(), json!(id));
    }
    error.insert(
        "title".to_string(),
        json!(status.canonical_reason().unwrap_or("Error")),
    );
    error.insert("status".to_string(), json!(status.as_u16().to_string()));
    error.insert("detail".to_string(), json!(detail));

    let mut links = Map::new();
    if let Some(via) = via {
        links.insert("via".to_string(), json!({ "href": via }));
    }
    if let Some(info) = info_link(status) {
        links.insert("info".to_string(), json!({ "href": info }));
    }
    if !links.is_empty() {
        error.insert("links".to_string(), Value::Object(links));
    }
    if let Some(pointer) = pointer {
        error.insert("source".to_string(), json!({ "pointer": pointer }));
    }
    Value::Object(error)
}

impl From<ResourceTypeError> for JsonApiError {
    fn from(err: ResourceTypeError) -> Self {
        JsonApiError::internal(err.to_string())
    }
}

impl From<StorageError> for JsonApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Entity(e) => e.into(),
            StorageError::Query(e) => e.into(),
            StorageError::Schema(e) => e.into(),
            StorageError::Backend(e) => e.into(),
        }
    }
}

impl From<EntityError> for JsonApiError {
    fn from(err: EntityError) -> Self {
        match err {
            EntityError::NotFound { .. } => {
                JsonApiError::not_found("The requested resource could not be found.")
            }
            EntityError::AlreadyExists { .. } => {
                JsonApiError::conflict("Conflict: Entity already exists.")
            }
            EntityError::InvalidBundle { .. } => JsonApiError::bad_request(err.to_string()),
        }
    }
}

impl From<QueryError> for JsonApiError {
    fn from(err: QueryError) -> Self {
        JsonApiError::bad_request(err.to_string())
    }
}

impl From<SchemaError> for JsonApiError {
    fn from(err: SchemaError) -> Self {
        JsonApiError::internal(err.to_string())
    }
}

impl From<BackendError> for JsonApiError {
    fn from(err: BackendError) -> Self {
        JsonApiError::internal(err.to_string())
    }
}
