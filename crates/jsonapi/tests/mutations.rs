//! Create, update and delete tests for individual resources.

mod common;

use common::assertions::{assert_jsonapi_content_type, assert_status};
use common::fixtures::{BOB, DRAFT, HELLO, WORLD};
use common::harness::JsonApiTestHarness;
use serde_json::{Value, json};

const ARTICLES: &str = "/jsonapi/node/article";

fn article_path(id: &str) -> String {
    format!("{}/{}", ARTICLES, id)
}

fn new_article(title: Option<&str>) -> Value {
    let mut attributes = serde_json::Map::new();
    if let Some(title) = title {
        attributes.insert("title".to_string(), json!(title));
    }
    json!({
        "data": {
            "type": "node--article",
            "attributes": attributes,
            "relationships": {
                "author": {"data": {"type": "user--user", "id": BOB}}
            }
        }
    })
}

// ============================================================================
// POST
// ============================================================================

mod create {
    use super::*;

    #[tokio::test]
    async fn test_create_returns_created_resource() {
        let harness = JsonApiTestHarness::new();
        let before = harness.backend.len();

        let response = harness
            .post(ARTICLES, Some("editor"), &new_article(Some("Fresh")))
            .await;
        assert_status(&response, 201);
        assert_jsonapi_content_type(&response);

        let body: Value = response.json();
        let id = body["data"]["id"].as_str().expect("generated id").to_string();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(body["data"]["attributes"]["title"], "Fresh");
        assert_eq!(body["data"]["relationships"]["author"]["data"]["id"], BOB);

        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .expect("Location header");
        assert_eq!(location, format!("http://localhost/jsonapi/node/article/{}", id));
        assert_eq!(harness.backend.len(), before + 1);

        let fetched = harness.get(&article_path(&id), None).await;
        assert_status(&fetched, 200);
    }

    #[tokio::test]
    async fn test_create_requires_create_access() {
        let harness = JsonApiTestHarness::new();

        let response = harness.post(ARTICLES, None, &new_article(Some("Nope"))).await;
        assert_status(&response, 403);

        let body: Value = response.json();
        assert_eq!(body["errors"][0]["source"]["pointer"], "/data");
    }

    #[tokio::test]
    async fn test_create_with_client_id() {
        let harness = JsonApiTestHarness::new();
        let id = "6f1b1a4e-5d3c-4f6a-9b9e-2f0c3d4e5a6b";

        let mut document = new_article(Some("Client id"));
        document["data"]["id"] = json!(id);

        let response = harness.post(ARTICLES, Some("editor"), &document).await;
        assert_status(&response, 201);
        let body: Value = response.json();
        assert_eq!(body["data"]["id"], id);

        let response = harness.post(ARTICLES, Some("editor"), &document).await;
        assert_status(&response, 409);
    }

    #[tokio::test]
    async fn test_create_with_malformed_client_id() {
        let harness = JsonApiTestHarness::new();

        let mut document = new_article(Some("Bad id"));
        document["data"]["id"] = json!("not-a-uuid");

        let response = harness.post(ARTICLES, Some("editor"), &document).await;
        assert_status(&response, 422);
        let body: Value = response.json();
        assert_eq!(body["errors"][0]["source"]["pointer"], "/data/id");
    }

    #[tokio::test]
    async fn test_create_validates_required_fields() {
        let harness = JsonApiTestHarness::new();

        let response = harness.post(ARTICLES, Some("editor"), &new_article(None)).await;
        assert_status(&response, 422);

        let body: Value = response.json();
        assert_eq!(body["errors"][0]["status"], "422");
        assert_eq!(
            body["errors"][0]["source"]["pointer"],
            "/data/attributes/title"
        );
    }

    #[tokio::test]
    async fn test_create_with_wrong_type_is_conflict() {
        let harness = JsonApiTestHarness::new();

        let document = json!({"data": {"type": "node--page", "attributes": {"title": "x"}}});
        let response = harness.post(ARTICLES, Some("editor"), &document).await;
        assert_status(&response, 409);
    }

    #[tokio::test]
    async fn test_create_with_unknown_field_is_unprocessable() {
        let harness = JsonApiTestHarness::new();

        let mut document = new_article(Some("Unknown"));
        document["data"]["attributes"]["nope"] = json!(1);

        let response = harness.post(ARTICLES, Some("editor"), &document).await;
        assert_status(&response, 422);
    }

    #[tokio::test]
    async fn test_create_with_non_editable_field_is_forbidden() {
        let harness = JsonApiTestHarness::new();

        let mut document = new_article(Some("Secretive"));
        document["data"]["attributes"]["secret"] = json!("psst");

        let response = harness.post(ARTICLES, Some("editor"), &document).await;
        assert_status(&response, 403);
        let body: Value = response.json();
        assert_eq!(
            body["errors"][0]["source"]["pointer"],
            "/data/attributes/secret"
        );
    }

    #[tokio::test]
    async fn test_create_with_missing_relationship_target() {
        let harness = JsonApiTestHarness::new();

        let mut document = new_article(Some("Orphan"));
        document["data"]["relationships"]["author"]["data"]["id"] = json!("u-nobody");

        let response = harness.post(ARTICLES, Some("editor"), &document).await;
        assert_status(&response, 404);
    }

    #[tokio::test]
    async fn test_create_with_malformed_body() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .post(ARTICLES, Some("editor"), &json!({"meta": {}}))
            .await;
        assert_status(&response, 400);
    }
}

// ============================================================================
// PATCH
// ============================================================================

mod update {
    use super::*;

    fn patch_document(id: &str, attributes: Value) -> Value {
        json!({"data": {"type": "node--article", "id": id, "attributes": attributes}})
    }

    #[tokio::test]
    async fn test_patch_updates_submitted_fields() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(HELLO),
                Some("editor"),
                &patch_document(HELLO, json!({"title": "Hello again"})),
            )
            .await;
        assert_status(&response, 200);

        let body: Value = response.json();
        assert_eq!(body["data"]["attributes"]["title"], "Hello again");
        assert_eq!(body["data"]["attributes"]["promoted"], true);

        let body: Value = harness.get(&article_path(HELLO), None).await.json();
        assert_eq!(body["data"]["attributes"]["title"], "Hello again");
    }

    #[tokio::test]
    async fn test_patch_with_mismatched_id_is_bad_request() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(HELLO),
                Some("editor"),
                &patch_document(WORLD, json!({"title": "Wrong"})),
            )
            .await;
        assert_status(&response, 400);
    }

    #[tokio::test]
    async fn test_patch_requires_update_access() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(HELLO),
                None,
                &patch_document(HELLO, json!({"title": "Anonymous"})),
            )
            .await;
        assert_status(&response, 403);
    }

    #[tokio::test]
    async fn test_patch_unchanged_non_editable_field_is_skipped() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(DRAFT),
                Some("editor"),
                &patch_document(DRAFT, json!({"title": "Draft 2", "secret": "classified"})),
            )
            .await;
        assert_status(&response, 200);

        let body: Value = response.json();
        assert_eq!(body["data"]["attributes"]["title"], "Draft 2");
        assert_eq!(body["data"]["attributes"]["secret"], "classified");
    }

    #[tokio::test]
    async fn test_patch_changed_non_editable_field_is_forbidden() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(DRAFT),
                Some("editor"),
                &patch_document(DRAFT, json!({"secret": "leaked"})),
            )
            .await;
        assert_status(&response, 403);
        let body: Value = response.json();
        assert_eq!(
            body["errors"][0]["source"]["pointer"],
            "/data/attributes/secret"
        );
    }

    #[tokio::test]
    async fn test_patch_unviewable_non_editable_field_is_forbidden() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(DRAFT),
                Some("writer"),
                &patch_document(DRAFT, json!({"secret": "classified"})),
            )
            .await;
        assert_status(&response, 403);
        let body: Value = response.json();
        assert_eq!(
            body["errors"][0]["source"]["pointer"],
            "/data/attributes/secret"
        );
    }

    #[tokio::test]
    async fn test_patch_non_editable_field_as_administrator() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(DRAFT),
                Some("admin"),
                &patch_document(DRAFT, json!({"secret": "declassified"})),
            )
            .await;
        assert_status(&response, 200);
        let body: Value = response.json();
        assert_eq!(body["data"]["attributes"]["secret"], "declassified");
    }

    #[tokio::test]
    async fn test_patch_clearing_required_field_is_unprocessable() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path(HELLO),
                Some("editor"),
                &patch_document(HELLO, json!({"title": null})),
            )
            .await;
        assert_status(&response, 422);
    }

    #[tokio::test]
    async fn test_patch_missing_resource_is_not_found() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .patch(
                &article_path("missing"),
                Some("editor"),
                &patch_document("missing", json!({"title": "x"})),
            )
            .await;
        assert_status(&response, 404);
    }
}

// ============================================================================
// DELETE
// ============================================================================

mod delete {
    use super::*;

    #[tokio::test]
    async fn test_delete_removes_resource() {
        let harness = JsonApiTestHarness::new();

        let response = harness.delete(&article_path(WORLD), Some("editor"), None).await;
        assert_status(&response, 204);

        let response = harness.get(&article_path(WORLD), None).await;
        assert_status(&response, 404);
    }

    #[tokio::test]
    async fn test_delete_requires_delete_access() {
        let harness = JsonApiTestHarness::new();

        let response = harness.delete(&article_path(WORLD), None, None).await;
        assert_status(&response, 403);

        let response = harness.get(&article_path(WORLD), None).await;
        assert_status(&response, 200);
    }
}
