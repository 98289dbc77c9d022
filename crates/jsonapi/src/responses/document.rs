//! Top-level document helpers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use helios_entity::cache::{Cacheable, CacheableMetadata};
use serde_json::{Value, json};

use super::headers::{CacheHeaderSettings, ResourceHeaders};
use crate::normalizer::{JsonApiDocumentTopLevelNormalizerValue, NormalizerValue};

/// The supported JSON:API version.
pub const JSONAPI_VERSION: &str = "1.0";

const JSONAPI_SPEC_URL: &str = "http://jsonapi.org/format/1.0/";

/// Returns the top-level `jsonapi` member.
pub fn jsonapi_object() -> Value {
    json!({
        "version": JSONAPI_VERSION,
        "meta": {
            "links": {
                "self": { "href": JSONAPI_SPEC_URL }
            }
        }
    })
}

/// The outcome of a resource operation.
#[derive(Debug, Clone)]
pub struct ResourceResponse {
    status: StatusCode,
    document: Option<JsonApiDocumentTopLevelNormalizerValue>,
    location: Option<String>,
    cache: Option<CacheHeaderSettings>,
}

impl ResourceResponse {
    /// Creates a response carrying a document.
    pub fn new(status: StatusCode, document: JsonApiDocumentTopLevelNormalizerValue) -> Self {
        Self {
            status,
            document: Some(document),
            location: None,
            cache: None,
        }
    }

    /// Creates a `204 No Content` response.
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            document: None,
            location: None,
            cache: None,
        }
    }

    /// Sets the Location header.
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Emits cache headers derived from the document cacheability.
    pub fn with_cache_headers(mut self, settings: CacheHeaderSettings) -> Self {
        self.cache = Some(settings);
        self
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the document, if any.
    pub fn document(&self) -> Option<&JsonApiDocumentTopLevelNormalizerValue> {
        self.document.as_ref()
    }

    /// Returns the Location URL, if any.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns the cacheability of the document.
    pub fn cacheability(&self) -> CacheableMetadata {
        self.document
            .as_ref()
            .map(|document| document.cacheability().clone())
            .unwrap_or_default()
    }
}

impl IntoResponse for ResourceResponse {
    fn into_response(self) -> Response {
        let mut headers = ResourceHeaders::new();
        if let Some(location) = &self.location {
            headers = headers.with_location(location.clone());
        }
        if let (Some(settings), Some(document)) = (self.cache, &self.document) {
            headers = headers.with_cacheability(document.cacheability(), settings);
        }

        match self.document {
            Some(document) => (
                self.status,
                headers.to_header_map(),
                document.rasterize().to_string(),
            )
                .into_response(),
            None => (self.status, headers.to_header_map()).into_response(),
        }
    }
}
