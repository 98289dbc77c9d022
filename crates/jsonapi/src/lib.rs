//! # helios-jsonapi - JSON:API over schema-described entities
//!
//! This crate exposes the entities of an [`EntityStorage`] backend as a
//! [JSON:API 1.0](https://jsonapi.org/format/1.0/) server. Every
//! (entity type, bundle) pair of the schema becomes a resource type named
//! `entity_type--bundle`, with its fields split into attributes and
//! relationships.
//!
//! ## Features
//!
//! - **CRUD**: fetch, create, update and delete individual resources
//! - **Relationships**: related resource routes and relationship linkage
//!   routes with to-one / to-many semantics
//! - **Query parameters**: `filter` (shorthand, conditions, nested groups),
//!   `sort`, `page[offset]`/`page[limit]`, `include` and sparse `fields`
//! - **Access control**: entity and field access per account; rows the
//!   account may not view are reported in `meta.errors`
//! - **Cacheability**: documents carry cache tags and contexts, exposed as
//!   `Cache-Control` and optional `X-Cache-*` headers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use helios_jsonapi::{create_app, ServerConfig};
//! use helios_entity::backends::memory::MemoryBackend;
//! use helios_entity::schema::Schema;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let schema = Schema::from_json(&std::fs::read_to_string("schema.json")?)?;
//!     let backend = MemoryBackend::new(schema);
//!
//!     let app = create_app(backend);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Interaction | HTTP Method | URL Pattern |
//! |------------|-------------|-------------|
//! | entry point | GET | `[base]` |
//! | collection | GET | `[base]/{type}/{bundle}` |
//! | create | POST | `[base]/{type}/{bundle}` |
//! | individual | GET | `[base]/{type}/{bundle}/{id}` |
//! | update | PATCH | `[base]/{type}/{bundle}/{id}` |
//! | delete | DELETE | `[base]/{type}/{bundle}/{id}` |
//! | related | GET | `[base]/{type}/{bundle}/{id}/{field}` |
//! | relationship | GET/POST/PATCH/DELETE | `[base]/{type}/{bundle}/{id}/relationships/{field}` |
//! | health | GET | `/health` |
//!
//! ## HTTP Headers
//!
//! - `Content-Type` / `Accept` - `application/vnd.api+json`, without media
//!   type parameters
//! - `X-Account-Id` - The account the request runs as
//! - `Location` - Set on `201 Created`
//! - `Cache-Control`, `X-Cache-Tags`, `X-Cache-Contexts` - On `GET`
//!   responses
//!
//! ## Architecture
//!
//! - [`resource_type`] - Resource types and the memoized catalog
//! - [`field_resolver`] - Public field paths to entity query paths
//! - [`query`] - `filter`, `sort` and `page` value objects
//! - [`include_resolver`] - Include trees and entity prefetching
//! - [`normalizer`] - The normalization value tree
//! - [`deserializer`] - Request documents to field items
//! - [`controller`] - Request orchestration
//! - [`link_manager`] - URL generation
//! - [`error`] - Error taxonomy and error documents
//! - [`config`] - Server configuration
//! - [`state`] - Application state
//! - [`handlers`], [`extractors`], [`middleware`], [`routing`],
//!   [`responses`] - The axum surface

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod controller;
pub mod deserializer;
pub mod error;
pub mod extractors;
pub mod field_resolver;
pub mod handlers;
pub mod include_resolver;
pub mod link_manager;
pub mod middleware;
pub mod normalizer;
pub mod query;
pub mod resource_type;
pub mod responses;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{JsonApiError, JsonApiResult};
pub use resource_type::{ResourceType, ResourceTypeOverrides, ResourceTypeRepository};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use helios_entity::core::EntityStorage;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application with default configuration.
///
/// For more control, use [`create_app_with_config`] or
/// [`create_app_with_state`].
pub fn create_app<S>(storage: S) -> Router
where
    S: EntityStorage + 'static,
{
    create_app_with_config(storage, ServerConfig::default())
}

/// Creates the Axum application with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use helios_jsonapi::{create_app_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     base_path: "/api".to_string(),
///     enable_cors: false,
///     ..Default::default()
/// };
/// let app = create_app_with_config(backend, config);
/// ```
pub fn create_app_with_config<S>(storage: S, config: ServerConfig) -> Router
where
    S: EntityStorage + 'static,
{
    create_app_with_state(AppState::new(Arc::new(storage), config))
}

/// Creates the Axum application from a prepared state, e.g. one with
/// registered accounts or resource type overrides.
pub fn create_app_with_state<S>(state: AppState<S>) -> Router
where
    S: EntityStorage + 'static,
{
    let config = state.config().clone();
    info!(
        backend = state.storage().backend_name(),
        base_path = %config.normalized_base_path(),
        "Creating JSON:API server"
    );

    let router = routing::jsonapi_routes::create_routes(state);

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "helios_jsonapi={level},helios_entity={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
