//! Health check endpoint handler.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_entity::core::EntityStorage;
use tracing::debug;

use crate::error::JsonApiResult;
use crate::state::AppState;

/// Handler for the health check endpoint.
///
/// Building the resource type catalog is part of the check, so a broken
/// schema reports an error instead of `healthy`.
///
/// # HTTP Request
///
/// `GET /health`
pub async fn health_handler<S>(State(state): State<AppState<S>>) -> JsonApiResult<Response>
where
    S: EntityStorage + 'static,
{
    debug!("Processing health check request");
    let catalog = state.catalog()?;

    let health_response = serde_json::json!({
        "status": "healthy",
        "backend": state.storage().backend_name(),
        "resource_types": catalog.all().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((StatusCode::OK, Json(health_response)).into_response())
}
