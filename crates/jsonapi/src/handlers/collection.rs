//! Collection handlers: `GET` and `POST [base]/{entity_type}/{bundle}`.

use axum::{
    body::Bytes,
    extract::{Path, State},
};
use helios_entity::core::EntityStorage;
use tracing::debug;

use crate::error::JsonApiResult;
use crate::extractors::{AccountExtractor, JsonApiRequest};
use crate::responses::ResourceResponse;
use crate::state::AppState;

/// Handler for fetching a collection.
///
/// # HTTP Request
///
/// `GET [base]/{entity_type}/{bundle}?filter[..]&sort=..&page[..]&include=..`
///
/// # Response
///
/// - `200 OK` - The page of resources; rows the account may not view are
///   reported in `meta.errors`
/// - `400 Bad Request` - Invalid query parameters
pub async fn get_collection_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle)): Path<(String, String)>,
    account: AccountExtractor,
    JsonApiRequest(request): JsonApiRequest,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(
        entity_type = %entity_type,
        bundle = %bundle,
        account = account.account().id(),
        "Processing collection request"
    );
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    resource.get_collection(&resource_type, &request).await
}

/// Handler for creating a resource.
///
/// # HTTP Request
///
/// `POST [base]/{entity_type}/{bundle}`
///
/// # Response
///
/// - `201 Created` - The created resource, with a `Location` header
/// - `403 Forbidden` - The account may not create it or set a field
/// - `409 Conflict` - Type mismatch or duplicate id
/// - `422 Unprocessable Entity` - Unknown fields or validation failures
pub async fn create_individual_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle)): Path<(String, String)>,
    account: AccountExtractor,
    JsonApiRequest(request): JsonApiRequest,
    body: Bytes,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, bundle = %bundle, "Processing create request");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    resource
        .create_individual(&resource_type, &body, &request)
        .await
}
