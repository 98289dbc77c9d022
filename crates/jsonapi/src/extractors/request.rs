//! Request URL extractor.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use helios_entity::core::EntityStorage;
use url::Url;

use crate::controller::RequestContext;
use crate::error::JsonApiError;
use crate::link_manager::LinkManager;
use crate::state::AppState;

/// The absolute request URL, as seen by clients, and its decoded query.
#[derive(Debug, Clone)]
pub struct JsonApiRequest(pub RequestContext);

impl JsonApiRequest {
    /// Builds the absolute URL of a server-relative path and query.
    ///
    /// # Errors
    ///
    /// Returns a bad request when the result is not a valid URL.
    pub fn from_path(links: &LinkManager, path_and_query: &str) -> Result<Self, JsonApiError> {
        let url = Url::parse(&links.absolute(path_and_query)).map_err(|e| {
            JsonApiError::bad_request(format!("Invalid request URL: {}", e))
        })?;
        Ok(Self(RequestContext::new(url)))
    }

    /// Returns the request context.
    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}

impl<S> FromRequestParts<AppState<S>> for JsonApiRequest
where
    S: EntityStorage + 'static,
{
    type Rejection = JsonApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Self::from_path(state.links(), path_and_query)
    }
}
