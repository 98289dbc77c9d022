//! Axum extractors for JSON:API requests.
//!
//! - [`AccountExtractor`] - The account the request runs as
//! - [`JsonApiRequest`] - The absolute request URL and decoded query

mod account;
mod request;

pub use account::{AccountExtractor, X_ACCOUNT_ID, account_id_from_headers};
pub use request::JsonApiRequest;
