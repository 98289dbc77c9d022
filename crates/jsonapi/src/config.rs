//! Server configuration for the JSON:API server.
//!
//! This module provides configuration types for the server, supporting both
//! programmatic configuration and environment variable overrides.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `JSONAPI_SERVER_PORT` | 8080 | Server port |
//! | `JSONAPI_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `JSONAPI_LOG_LEVEL` | info | Log level |
//! | `JSONAPI_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `JSONAPI_ENABLE_CORS` | true | Enable CORS |
//! | `JSONAPI_CORS_ORIGINS` | * | Allowed origins |
//! | `JSONAPI_CORS_METHODS` | GET,POST,PATCH,DELETE,OPTIONS | Allowed methods |
//! | `JSONAPI_CORS_HEADERS` | Content-Type,Accept,Authorization,X-Account-Id | Allowed headers |
//! | `JSONAPI_BASE_URL` | http://localhost:8080 | Server base URL |
//! | `JSONAPI_BASE_PATH` | /jsonapi | Path prefix of all resource routes |
//! | `JSONAPI_SCHEMA_PATH` | - | Schema document to load at startup |
//! | `JSONAPI_DEFAULT_PAGE_SIZE` | 50 | Page size when `page[limit]` is absent |
//! | `JSONAPI_MAX_PAGE_SIZE` | 50 | Largest accepted `page[limit]` |
//! | `JSONAPI_CACHE_MAX_AGE` | 3600 | `Cache-Control` max-age ceiling (seconds) |
//! | `JSONAPI_EXPOSE_CACHE_HEADERS` | false | Emit `X-Cache-Tags` / `X-Cache-Contexts` |
//! | `JSONAPI_ANONYMOUS_PERMISSIONS` | - | Comma-separated anonymous permissions |
//!
//! # Example
//!
//! ```rust
//! use helios_jsonapi::ServerConfig;
//!
//! // Create from environment
//! let config = ServerConfig::from_env();
//!
//! // Or create programmatically
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     base_path: "/api".to_string(),
//!     ..Default::default()
//! };
//! ```

use clap::Parser;

/// Server configuration for the JSON:API server.
///
/// This struct can be constructed from environment variables using
/// [`ServerConfig::from_env`], from command line arguments using
/// [`ServerConfig::parse`], or programmatically.
#[derive(Debug, Clone, Parser)]
#[command(name = "jsonapi-server")]
#[command(about = "JSON:API server for schema-described entities")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "JSONAPI_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "JSONAPI_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "JSONAPI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[arg(long, env = "JSONAPI_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "JSONAPI_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "JSONAPI_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "JSONAPI_CORS_METHODS",
        default_value = "GET,POST,PATCH,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "JSONAPI_CORS_HEADERS",
        default_value = "Content-Type,Accept,Authorization,X-Account-Id"
    )]
    pub cors_headers: String,

    /// Base URL for the server (used in links and Location headers).
    #[arg(long, env = "JSONAPI_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Path prefix of all JSON:API routes.
    #[arg(long, env = "JSONAPI_BASE_PATH", default_value = "/jsonapi")]
    pub base_path: String,

    /// Schema document describing entity types, resource type overrides,
    /// accounts and fixtures.
    #[arg(long, env = "JSONAPI_SCHEMA_PATH")]
    pub schema_path: Option<String>,

    /// Default page size for collections.
    #[arg(long, env = "JSONAPI_DEFAULT_PAGE_SIZE", default_value = "50")]
    pub default_page_size: usize,

    /// Maximum page size for collections.
    #[arg(long, env = "JSONAPI_MAX_PAGE_SIZE", default_value = "50")]
    pub max_page_size: usize,

    /// Upper bound of the `Cache-Control` max-age of GET responses.
    #[arg(long, env = "JSONAPI_CACHE_MAX_AGE", default_value = "3600")]
    pub cache_max_age: u32,

    /// Emit cache tags and contexts as response headers.
    #[arg(long, env = "JSONAPI_EXPOSE_CACHE_HEADERS", default_value = "false")]
    pub expose_cache_headers: bool,

    /// Permissions granted to requests without a known account
    /// (comma-separated).
    #[arg(long, env = "JSONAPI_ANONYMOUS_PERMISSIONS", default_value = "")]
    pub anonymous_permissions: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PATCH,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Accept,Authorization,X-Account-Id".to_string(),
            base_url: "http://localhost:8080".to_string(),
            base_path: "/jsonapi".to_string(),
            schema_path: None,
            default_page_size: 50,
            max_page_size: 50,
            cache_max_age: 3600,
            expose_cache_headers: false,
            anonymous_permissions: String::new(),
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// This is a convenience method that parses environment variables without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the base path without a trailing slash (empty for `/`).
    pub fn normalized_base_path(&self) -> String {
        let trimmed = self.base_path.trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Returns the parsed anonymous permissions.
    pub fn anonymous_permission_list(&self) -> Vec<String> {
        self.anonymous_permissions
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if url::Url::parse(&self.base_url).is_err() {
            errors.push(format!("Base URL '{}' is not a valid URL", self.base_url));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// This uses ephemeral port 0 and disables features that might interfere
    /// with tests.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            request_timeout: 5,
            enable_cors: false,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            base_url: "http://localhost".to_string(),
            base_path: "/jsonapi".to_string(),
            schema_path: None,
            default_page_size: 50,
            max_page_size: 50,
            cache_max_age: 3600,
            expose_cache_headers: true,
            anonymous_permissions: String::new(),
        }
    }
}
