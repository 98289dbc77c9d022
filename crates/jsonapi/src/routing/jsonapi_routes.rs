//! JSON:API route configuration.

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use helios_entity::core::EntityStorage;

use crate::handlers;
use crate::middleware::{content_negotiation, decorate_errors};
use crate::state::AppState;

/// Creates all routes.
///
/// Resource routes live below the configured base path (`/jsonapi` by
/// default) and are addressed by entity type and bundle:
///
/// - `GET [base]` - Entry point
/// - `GET|POST [base]/{entity_type}/{bundle}` - Collection, create
/// - `GET|PATCH|DELETE [base]/{entity_type}/{bundle}/{id}` - Individual
/// - `GET [base]/{entity_type}/{bundle}/{id}/{related}` - Related resources
/// - `GET|POST|PATCH|DELETE [base]/{entity_type}/{bundle}/{id}/relationships/{related}`
///
/// `GET /health` sits outside the base path and skips content negotiation.
pub fn create_routes<S>(state: AppState<S>) -> Router
where
    S: EntityStorage + 'static,
{
    let base = state.config().normalized_base_path();
    let entry_point = if base.is_empty() { "/".to_string() } else { base.clone() };
    let collection = format!("{}/{{entity_type}}/{{bundle}}", base);
    let individual = format!("{}/{{id}}", collection);
    let related = format!("{}/{{related}}", individual);
    let relationship = format!("{}/relationships/{{related}}", individual);

    let api = Router::new()
        .route(&entry_point, get(handlers::entry_point_handler::<S>))
        .route(
            &collection,
            get(handlers::get_collection_handler::<S>)
                .post(handlers::create_individual_handler::<S>),
        )
        .route(
            &individual,
            get(handlers::get_individual_handler::<S>)
                .patch(handlers::patch_individual_handler::<S>)
                .delete(handlers::delete_individual_handler::<S>),
        )
        .route(&related, get(handlers::get_related_handler::<S>))
        .route(
            &relationship,
            get(handlers::get_relationship_handler::<S>)
                .post(handlers::create_relationship_handler::<S>)
                .patch(handlers::patch_relationship_handler::<S>)
                .delete(handlers::delete_relationship_handler::<S>),
        )
        .route_layer(from_fn(content_negotiation));

    Router::new()
        .route("/health", get(handlers::health_handler::<S>))
        .merge(api)
        .layer(from_fn_with_state(state.clone(), decorate_errors::<S>))
        .with_state(state)
}
