//! Entry point handler.
//!
//! `GET [base]` returns an empty document whose links point at the
//! collection of every routable resource type.

use axum::{extract::State, http::StatusCode};
use helios_entity::CacheableMetadata;
use helios_entity::core::EntityStorage;
use serde_json::{Map, json};
use tracing::debug;

use crate::controller::QUERY_ARGS_CACHE_CONTEXT;
use crate::error::JsonApiResult;
use crate::normalizer::{DocumentData, JsonApiDocumentTopLevelNormalizerValue};
use crate::responses::ResourceResponse;
use crate::state::AppState;

/// Cache tag invalidated whenever the resource type catalog changes.
pub const RESOURCE_TYPES_CACHE_TAG: &str = "jsonapi_resource_types";

/// Handler for the entry point.
///
/// # HTTP Request
///
/// `GET [base]`
///
/// # Response
///
/// - `200 OK` - `links` maps each type name to its collection URL
pub async fn entry_point_handler<S>(
    State(state): State<AppState<S>>,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    let catalog = state.catalog()?;
    let links_manager = state.links();

    let mut links = Map::new();
    links.insert(
        "self".to_string(),
        json!({ "href": links_manager.entry_point_url() }),
    );
    for resource_type in catalog.all().iter().filter(|t| !t.is_internal()) {
        links.insert(
            resource_type.type_name().to_string(),
            json!({ "href": links_manager.collection_url(resource_type) }),
        );
    }
    debug!(resource_types = links.len() - 1, "Listing entry point");

    let cacheability = CacheableMetadata::new()
        .with_tags([RESOURCE_TYPES_CACHE_TAG])
        .with_contexts([QUERY_ARGS_CACHE_CONTEXT]);
    let document =
        JsonApiDocumentTopLevelNormalizerValue::new(DocumentData::Collection(Vec::new()), links)
            .with_cacheability(&cacheability);
    Ok(ResourceResponse::new(StatusCode::OK, document).with_cache_headers(state.cache_settings()))
}
