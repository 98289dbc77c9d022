//! Error values inside otherwise successful documents.

use helios_entity::cache::{Cacheable, CacheableMetadata};
use serde_json::Value;

use super::NormalizerValue;
use crate::error::JsonApiError;

/// An error standing in for a resource, e.g. an included entity the account
/// may not view.
#[derive(Debug, Clone)]
pub struct HttpExceptionNormalizerValue {
    error: JsonApiError,
    cacheability: CacheableMetadata,
}

impl HttpExceptionNormalizerValue {
    /// Wraps an error with the cacheability of the decision that raised it.
    pub fn new(error: JsonApiError, cacheability: CacheableMetadata) -> Self {
        Self {
            error,
            cacheability,
        }
    }

    /// Returns the wrapped error.
    pub fn error(&self) -> &JsonApiError {
        &self.error
    }
}

impl Cacheable for HttpExceptionNormalizerValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for HttpExceptionNormalizerValue {
    /// Renders the list of error objects.
    fn rasterize(&self) -> Value {
        Value::Array(self.error.error_objects(None))
    }
}
