//! Response building for the JSON:API layer.
//!
//! - [`document`] - The `jsonapi` object and [`ResourceResponse`]
//! - [`headers`] - Content-Type, Location and cache headers

pub mod document;
pub mod headers;

pub use document::{JSONAPI_VERSION, ResourceResponse, jsonapi_object};
pub use headers::{CacheHeaderSettings, ResourceHeaders};
