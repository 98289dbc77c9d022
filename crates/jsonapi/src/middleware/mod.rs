//! HTTP middleware for the JSON:API surface.
//!
//! - [`content_type`] - Media type negotiation and query parameter validation
//! - [`errors`] - Error document decoration (`links.via`, debug metadata)

pub mod content_type;
pub mod errors;

pub use content_type::{JSONAPI_MEDIA_TYPE, content_negotiation, validate_query_parameters};
pub use errors::decorate_errors;
