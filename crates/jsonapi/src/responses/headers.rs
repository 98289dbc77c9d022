//! Response header generation.
//!
//! Builds the JSON:API response headers: Content-Type, Location for created
//! resources and, for cacheable responses, `Cache-Control` plus the cache
//! tags and contexts of the rendered document.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use helios_entity::cache::CacheableMetadata;

use crate::config::ServerConfig;
use crate::middleware::content_type::JSONAPI_MEDIA_TYPE;

/// Header listing the cache tags of a response.
pub const X_CACHE_TAGS: HeaderName = HeaderName::from_static("x-cache-tags");

/// Header listing the cache contexts of a response.
pub const X_CACHE_CONTEXTS: HeaderName = HeaderName::from_static("x-cache-contexts");

/// How cache metadata is exposed on responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHeaderSettings {
    /// Upper bound of the `max-age` directive.
    pub max_age: u32,
    /// Emit `X-Cache-Tags` and `X-Cache-Contexts`.
    pub expose_metadata: bool,
}

impl CacheHeaderSettings {
    /// Reads the settings from the server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_age: config.cache_max_age,
            expose_metadata: config.expose_cache_headers,
        }
    }
}

impl Default for CacheHeaderSettings {
    fn default() -> Self {
        Self {
            max_age: 3600,
            expose_metadata: false,
        }
    }
}

/// Builder for JSON:API response headers.
#[derive(Debug, Default)]
pub struct ResourceHeaders {
    location: Option<String>,
    cache_control: Option<String>,
    cache_tags: Option<String>,
    cache_contexts: Option<String>,
}

impl ResourceHeaders {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Location URL.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the cache headers from the cacheability of a document.
    ///
    /// Documents varying by account permissions are only cacheable
    /// privately.
    pub fn with_cacheability(
        mut self,
        cacheability: &CacheableMetadata,
        settings: CacheHeaderSettings,
    ) -> Self {
        let max_age = cacheability.max_age().as_seconds(settings.max_age);
        let cache_control = if max_age == 0 {
            "no-cache, private".to_string()
        } else if cacheability.contexts().iter().any(|c| c.starts_with("user")) {
            format!("max-age={}, private", max_age)
        } else {
            format!("max-age={}, public", max_age)
        };
        self.cache_control = Some(cache_control);

        if settings.expose_metadata {
            self.cache_tags = Some(join(cacheability.tags().iter()));
            self.cache_contexts = Some(join(cacheability.contexts().iter()));
        }
        self
    }

    /// Returns the Location value.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns the Cache-Control value.
    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    /// Converts to an Axum HeaderMap.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSONAPI_MEDIA_TYPE),
        );

        let optional = [
            (header::LOCATION, &self.location),
            (header::CACHE_CONTROL, &self.cache_control),
            (X_CACHE_TAGS, &self.cache_tags),
            (X_CACHE_CONTEXTS, &self.cache_contexts),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

fn join<'a>(values: impl Iterator<Item = &'a String>) -> String {
    values.map(String::as_str).collect::<Vec<_>>().join(" ")
}
