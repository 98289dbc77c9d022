//! Related resource handler.

use axum::extract::{Path, State};
use helios_entity::core::EntityStorage;
use tracing::debug;

use crate::error::JsonApiResult;
use crate::extractors::{AccountExtractor, JsonApiRequest};
use crate::responses::ResourceResponse;
use crate::state::AppState;

/// Handler for fetching the targets of a relationship.
///
/// # HTTP Request
///
/// `GET [base]/{entity_type}/{bundle}/{id}/{related}`
///
/// # Response
///
/// - `200 OK` - A resource (to-one, possibly `null`) or a collection
/// - `404 Not Found` - Not a viewable relationship of this resource
pub async fn get_related_handler<S>(
    State(state): State<AppState<S>>,
    Path((entity_type, bundle, id, related)): Path<(String, String, String, String)>,
    account: AccountExtractor,
    JsonApiRequest(request): JsonApiRequest,
) -> JsonApiResult<ResourceResponse>
where
    S: EntityStorage + 'static,
{
    debug!(
        entity_type = %entity_type,
        bundle = %bundle,
        id = %id,
        related = %related,
        "Processing related request"
    );
    let resource = state.entity_resource(account.account())?;
    let resource_type = resource.routable_type(&entity_type, &bundle)?;
    let entity = resource.load_entity(&resource_type, &id).await?;
    resource
        .get_related(&resource_type, &entity, &related, &request)
        .await
}
