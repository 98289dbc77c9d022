//! Error document decoration.
//!
//! [`JsonApiError`](crate::error::JsonApiError) responses are rendered
//! without request context. This middleware re-renders them with
//! `links.via` pointing at the request URL and, for accounts holding the
//! `view system reports` permission, the error's debug representation in
//! `meta`.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use helios_entity::access::VIEW_SYSTEM_REPORTS;
use helios_entity::core::EntityStorage;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ErrorReport, JsonApiError, error_document};
use crate::extractors::account_id_from_headers;
use crate::state::AppState;

/// Renders the error objects of a report for one request.
pub fn render_report(error: &JsonApiError, via: &str, with_debug: bool) -> Value {
    let mut errors = error.error_objects(Some(via));
    if with_debug {
        for object in &mut errors {
            if let Value::Object(object) = object {
                object.insert(
                    "meta".to_string(),
                    json!({
                        "exception": error.to_string(),
                        "trace": format!("{:?}", error),
                    }),
                );
            }
        }
    }
    error_document(errors)
}

/// Middleware decorating error responses.
///
/// This can be used with `axum::middleware::from_fn_with_state`.
pub async fn decorate_errors<S>(
    State(state): State<AppState<S>>,
    request: Request,
    next: Next,
) -> Response
where
    S: EntityStorage + 'static,
{
    let via = state.links().absolute(
        request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/"),
    );
    let account = state
        .accounts()
        .resolve(account_id_from_headers(request.headers()));

    let response = next.run(request).await;
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let with_debug = account.has_permission(VIEW_SYSTEM_REPORTS);
    debug!(status = %report.error.status(), with_debug, "Decorating error response");
    let body = render_report(&report.error, &via, with_debug);
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_report_adds_via() {
        let error = JsonApiError::not_found("Missing.");
        let document = render_report(&error, "http://localhost/jsonapi/x", false);
        let object = &document["errors"][0];
        assert_eq!(object["links"]["via"]["href"], "http://localhost/jsonapi/x");
        assert!(object.get("meta").is_none());
    }

    #[test]
    fn test_render_report_debug_meta() {
        let error = JsonApiError::conflict("Duplicate.");
        let document = render_report(&error, "http://localhost/", true);
        let meta = &document["errors"][0]["meta"];
        assert_eq!(meta["exception"], "Conflict: Duplicate.");
        assert!(meta["trace"].as_str().unwrap().contains("Conflict"));
    }
}
