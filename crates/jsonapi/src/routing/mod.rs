//! Route configuration for the JSON:API server.
//!
//! This module contains the routing configuration that maps HTTP paths
//! to handlers.

pub mod jsonapi_routes;

pub use jsonapi_routes::create_routes;
