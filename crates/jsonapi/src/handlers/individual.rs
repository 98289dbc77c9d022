//! Individual resource handlers: `GET`, `PATCH` and `DELETE
//! [base]/{entity_type}/{bundle}/{id}`.

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

/// Handler for fetching one resource.
///
/// # Response
///
/// - `200 OK` - The resource and its includes
/// - `403 Forbidden` - The account may not view it
/// - `404 Not Found` - No such resource
pub async fn get_individual_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id)): Path<(String, String, String)>,
    account: AccountExtractor,
    JsonApiRequest(request): JsonApiRequest,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, bundle = %bundle, id = %id, "Processing read request");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource
        .get_individual(&resource_type, &entity, &request)
        .await
}

/// Handler for updating one resource.
///
/// # Response
///
/// - `200 OK` - The updated resource
/// - `400 Bad Request` - The payload id does not match
/// - `403 Forbidden` - The account may not update it or a submitted field
/// - `422 Unprocessable Entity` - Unknown fields or validation failures
pub async fn patch_individual_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id)): Path<(String, String, String)>,
    account: AccountExtractor,
    JsonApiRequest(request): JsonApiRequest,
    body: Bytes,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, bundle = %bundle, id = %id, "Processing patch request");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource
        .patch_individual(&resource_type, entity, &body, &request)
        .await
}

/// Handler for deleting one resource.
///
/// # Response
///
/// - `204 No Content` - Deleted
/// - `403 Forbidden` - The account may not delete it
pub async fn delete_individual_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id)): Path<(String, String, String)>,
    account: AccountExtractor,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(entity_type = %entity_type, bundle = %bundle, id = %id, "Processing delete request");
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource.delete_individual(&resource_type, &entity).await
}
