//! Content negotiation middleware.
//!
//! JSON:API has a single media type, `application/vnd.api+json`, and forbids
//! media type parameters on it. Requests are checked before routing:
//!
//! - A body sent with another media type, or with parameters, is rejected
//!   with 415.
//! - An `Accept` header whose JSON:API entries all carry parameters is
//!   rejected with 406.
//! - Query parameter names must be reserved JSON:API names or valid
//!   implementation-specific names, otherwise 400.

use std::sync::LazyLock;

use axum::{
    extract::Request,
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::Regex;
use tracing::warn;

use crate::error::{JsonApiError, JsonApiResult};
use crate::query::QueryParameters;

/// The JSON:API media type.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Query parameter names defined by JSON:API.
pub const RESERVED_QUERY_PARAMETERS: [&str; 5] = ["filter", "sort", "page", "fields", "include"];

static MEMBER_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9\x{0080}-\x{FFFF}](?:[a-zA-Z0-9\x{0080}-\x{FFFF}_ -]*[a-zA-Z0-9\x{0080}-\x{FFFF}])?$",
    )
    .ok()
});

/// A parsed media range: the media type and whether it has parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    /// Lowercased `type/subtype`.
    pub media_type: String,
    /// Parameters other than the `q` weight.
    pub has_parameters: bool,
}

impl MediaRange {
    /// Parses one media range such as `application/vnd.api+json; q=0.5`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(';').map(str::trim);
        let media_type = parts.next().filter(|t| !t.is_empty())?.to_lowercase();
        let has_parameters = parts.any(|param| {
            let name = param.split('=').next().unwrap_or_default().trim();
            !name.is_empty() && !name.eq_ignore_ascii_case("q")
        });
        Some(Self {
            media_type,
            has_parameters,
        })
    }

    /// Returns true for the JSON:API media type.
    pub fn is_jsonapi(&self) -> bool {
        self.media_type == JSONAPI_MEDIA_TYPE
    }
}

/// Checks the request `Content-Type`.
///
/// `POST` and `PATCH` require the JSON:API media type. Other methods are
/// only checked when they declare a content type.
///
/// # Errors
///
/// Returns 415 for other media types and for media type parameters.
pub fn validate_request_content_type(method: &Method, headers: &HeaderMap) -> JsonApiResult<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let requires_body = method == Method::POST || method == Method::PATCH;

    let Some(content_type) = content_type else {
        if requires_body {
            return Err(unsupported_media_type());
        }
        return Ok(());
    };

    match MediaRange::parse(content_type) {
        Some(range) if range.is_jsonapi() && !range.has_parameters => Ok(()),
        Some(range) if range.is_jsonapi() => Err(JsonApiError::UnsupportedMediaType {
            message: format!(
                "The {} media type must not be sent with media type parameters.",
                JSONAPI_MEDIA_TYPE
            ),
        }),
        _ => Err(unsupported_media_type()),
    }
}

/// Checks the `Accept` header.
///
/// # Errors
///
/// Returns 406 when JSON:API is accepted only with media type parameters.
pub fn validate_accept(headers: &HeaderMap) -> JsonApiResult<()> {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    let jsonapi: Vec<MediaRange> = accept
        .split(',')
        .filter_map(MediaRange::parse)
        .filter(MediaRange::is_jsonapi)
        .collect();
    if !jsonapi.is_empty() && jsonapi.iter().all(|range| range.has_parameters) {
        return Err(JsonApiError::NotAcceptable {
            message: format!(
                "The {} media type was only accepted with media type parameters.",
                JSONAPI_MEDIA_TYPE
            ),
        });
    }
    Ok(())
}

/// Checks top-level query parameter names.
///
/// Custom names must be valid member names containing at least one
/// character outside `a-z`, so they never collide with names JSON:API may
/// reserve in the future.
///
/// # Errors
///
/// Returns 400 listing every offending name.
pub fn validate_query_parameters(params: &QueryParameters) -> JsonApiResult<()> {
    let invalid: Vec<&str> = params
        .names()
        .filter(|name| !is_valid_query_parameter(name))
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    warn!(parameters = ?invalid, "Rejected query parameters");
    Err(JsonApiError::bad_request(format!(
        "The following query parameters are not allowed by JSON:API: '{}'.",
        invalid.join("', '")
    )))
}

fn is_valid_query_parameter(name: &str) -> bool {
    if RESERVED_QUERY_PARAMETERS.contains(&name) {
        return true;
    }
    MEMBER_NAME.as_ref().is_some_and(|re| re.is_match(name))
        && name.chars().any(|c| !c.is_ascii_lowercase())
}

fn unsupported_media_type() -> JsonApiError {
    JsonApiError::UnsupportedMediaType {
        message: format!(
            "Requests with a body must use the \"{}\" media type.",
            JSONAPI_MEDIA_TYPE
        ),
    }
}

/// Middleware applying all negotiation checks.
///
/// This can be used with `axum::middleware::from_fn`.
pub async fn content_negotiation(request: Request, next: Next) -> Response {
    let params = QueryParameters::parse(request.uri().query());
    let checked = validate_request_content_type(request.method(), request.headers())
        .and_then(|()| validate_accept(request.headers()))
        .and_then(|()| validate_query_parameters(&params));
    if let Err(error) = checked {
        return error.into_response();
    }
    next.run(request).await
}
