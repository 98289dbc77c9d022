//! Relationship handlers:
//! `[base]/{entity_type}/{bundle}/{id}/relationships/{related}`.

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

/// Path of a relationship route: entity type, bundle, id, public field.
type RelationshipPath = Path<(String, String, String, String)>;

/// Handler for fetching relationship linkage.
///
/// # Response
///
/// - `200 OK` - Resource identifiers
/// - `404 Not Found` - Not a viewable relationship of this resource
pub async fn get_relationship_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id, related)): RelationshipPath,
    account: AccountExtractor,
    JsonApiRequest(request): JsonApiRequest,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, id = %id, related = %related, "Processing relationship request");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource
        .get_relationship(&resource_type, &entity, &related, &request)
        .await
}

/// Handler for adding targets to a to-many relationship.
///
/// # Response
///
/// - `200 OK` - The relationship, when the arity of an existing target
///   changed
/// - `204 No Content` - Otherwise
/// - `409 Conflict` - The relationship is to-one
pub async fn create_relationship_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id, related)): RelationshipPath,
    account: AccountExtractor,
    JsonApiRequest(request): JsonApiRequest,
    body: Bytes,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, id = %id, related = %related, "Processing relationship create");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource
        .create_relationship(&resource_type, entity, &related, &body, &request)
        .await
}

/// Handler for replacing relationship targets.
///
/// # Response
///
/// - `204 No Content` - Replaced
/// - `400 Bad Request` - Several targets for a to-one relationship
pub async fn patch_relationship_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id, related)): RelationshipPath,
    account: AccountExtractor,
    body: Bytes,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, id = %id, related = %related, "Processing relationship patch");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource
        .patch_relationship(&resource_type, entity, &related, &body)
        .await
}

/// Handler for removing targets from a to-many relationship.
///
/// # Response
///
/// - `204 No Content` - Removed
/// - `409 Conflict` - The relationship is to-one
pub async fn delete_relationship_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id, related)): RelationshipPath,
    account: AccountExtractor,
    body: Bytes,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, id = %id, related = %related, "Processing relationship delete");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource
        .delete_relationship(&resource_type, entity, &related, &body)
        .await
}
