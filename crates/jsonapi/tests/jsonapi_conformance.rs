//! JSON:API read and negotiation conformance tests.
//!
//! Tests standard JSON:API behaviors:
//! - Entry point, individual, collection and related routes
//! - Query parameters (filter, sort, page, include, fields)
//! - Entity and field access
//! - Content negotiation (415, 406, invalid query parameters)
//! - Error documents and cache headers

mod common;

use axum::body::Bytes;
use axum::http::{HeaderValue, header};
use common::assertions::{
    assert_error, assert_jsonapi_content_type, assert_status, data_ids, included_keys,
};
use common::fixtures::{ADA, DRAFT, HELLO, RUST, WEB, WORLD};
use common::harness::JsonApiTestHarness;
use helios_jsonapi::responses::headers::{X_CACHE_CONTEXTS, X_CACHE_TAGS};
use serde_json::{Value, json};

const ARTICLES: &str = "/jsonapi/node/article";

fn article_path(id: &str) -> String {
    format!("{}/{}", ARTICLES, id)
}

// ============================================================================
// Entry point and health
// ============================================================================

mod entry_point {
    use super::*;

    #[tokio::test]
    async fn test_entry_point_lists_routable_types() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get("/jsonapi", None).await;
        assert_status(&response, 200);
        assert_jsonapi_content_type(&response);

        let body: Value = response.json();
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["jsonapi"]["version"], "1.0");
        assert_eq!(body["links"]["self"]["href"], "http://localhost/jsonapi");
        assert_eq!(
            body["links"]["node--article"]["href"],
            "http://localhost/jsonapi/node/article"
        );
        assert_eq!(
            body["links"]["taxonomy_term--tags"]["href"],
            "http://localhost/jsonapi/taxonomy_term/tags"
        );
        assert!(body["links"].get("node--page").is_none());
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get("/health", None).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn test_schema_change_rebuilds_resource_types() {
        let harness = JsonApiTestHarness::new();
        assert_status(&harness.get(ARTICLES, None).await, 200);

        let schema = helios_entity::schema::Schema::from_json(
            r#"{"entity_types": [
                {"id": "taxonomy_term", "keys": {"bundle": "vid", "label": "name"}, "bundles": {
                    "topics": {"fields": [{"name": "name", "type": "string"}]}
                }}
            ]}"#,
        )
        .expect("schema");
        harness.backend.set_schema(schema);

        let response = harness.get("/jsonapi/taxonomy_term/topics", None).await;
        assert_status(&response, 200);
        let body: Value = response.json();
        assert!(data_ids(&body).is_empty());

        let response = harness.get(ARTICLES, None).await;
        assert_status(&response, 404);

        let body: Value = harness.get("/jsonapi", None).await.json();
        assert!(body["links"].get("taxonomy_term--topics").is_some());
        assert!(body["links"].get("node--article").is_none());
    }
}

// ============================================================================
// Individual resources
// ============================================================================

mod individual {
    use super::*;

    #[tokio::test]
    async fn test_get_individual_document() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&article_path(HELLO), None).await;
        assert_status(&response, 200);

        let body: Value = response.json();
        let data = &body["data"];
        assert_eq!(data["type"], "node--article");
        assert_eq!(data["id"], HELLO);
        assert_eq!(data["attributes"]["title"], "Hello");
        assert_eq!(data["attributes"]["promoted"], true);
        assert_eq!(
            data["links"]["self"]["href"],
            "http://localhost/jsonapi/node/article/a1"
        );
        assert_eq!(
            body["links"]["self"]["href"],
            "http://localhost/jsonapi/node/article/a1"
        );
    }

    #[tokio::test]
    async fn test_public_field_names_are_used() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness.get(&article_path(HELLO), None).await.json();
        let relationships = &body["data"]["relationships"];
        assert!(relationships.get("uid").is_none());
        assert_eq!(
            relationships["author"]["data"],
            json!({"type": "user--user", "id": ADA})
        );
        assert_eq!(
            relationships["author"]["links"]["related"]["href"],
            "http://localhost/jsonapi/node/article/a1/author"
        );
        assert_eq!(
            relationships["author"]["links"]["self"]["href"],
            "http://localhost/jsonapi/node/article/a1/relationships/author"
        );
    }

    #[tokio::test]
    async fn test_relationship_meta_carries_extra_properties() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness.get(&article_path(HELLO), None).await.json();
        let tags = body["data"]["relationships"]["tags"]["data"]
            .as_array()
            .expect("tags is to-many")
            .clone();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0]["id"], RUST);
        assert_eq!(tags[0]["meta"]["weight"], 1);
        assert_eq!(tags[1]["id"], WEB);
        assert_eq!(tags[1]["meta"]["weight"], 2);
    }

    #[tokio::test]
    async fn test_field_access_hides_restricted_attributes() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness.get(&article_path(DRAFT), None).await.json();
        assert!(body["data"]["attributes"].get("secret").is_none());

        let body: Value = harness.get(&article_path(DRAFT), Some("admin")).await.json();
        assert_eq!(body["data"]["attributes"]["secret"], "classified");

        let body: Value = harness
            .get(&format!("/jsonapi/user/user/{}", ADA), None)
            .await
            .json();
        assert_eq!(body["data"]["attributes"]["name"], "Ada");
        assert!(body["data"]["attributes"].get("mail").is_none());
    }

    #[tokio::test]
    async fn test_view_denied_is_forbidden() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&article_path(HELLO), Some("reader")).await;
        assert_status(&response, 403);
        assert_error(&response.json(), "403");
    }

    #[tokio::test]
    async fn test_unknown_resources_are_not_found() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&article_path("missing"), None).await;
        assert_status(&response, 404);

        // Internal resource types have no routes.
        let response = harness.get("/jsonapi/node/page/p1", Some("admin")).await;
        assert_status(&response, 404);

        let response = harness.get("/jsonapi/comment/comment", None).await;
        assert_status(&response, 404);

        // Ids are scoped to the bundle of the route.
        let response = harness.get(&format!("/jsonapi/taxonomy_term/sections/{}", RUST), None).await;
        assert_status(&response, 404);
    }

    #[tokio::test]
    async fn test_sparse_fieldset() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?fields[node--article]=title", article_path(HELLO)), None)
            .await
            .json();
        let data = &body["data"];
        assert_eq!(data["attributes"], json!({"title": "Hello"}));
        assert!(data.get("relationships").is_none());
    }

    #[tokio::test]
    async fn test_include_related_resources() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .get(&format!("{}?include=author,tags", article_path(HELLO)), None)
            .await;
        assert_status(&response, 200);

        let body: Value = response.json();
        let included = included_keys(&body);
        assert_eq!(included.len(), 3);
        assert!(included.contains(&format!("user--user/{}", ADA)));
        assert!(included.contains(&format!("taxonomy_term--tags/{}", RUST)));
        assert!(included.contains(&format!("taxonomy_term--tags/{}", WEB)));
    }

    #[tokio::test]
    async fn test_include_outside_fieldset_still_includes() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(
                &format!(
                    "{}?include=author&fields[node--article]=title&fields[user--user]=name",
                    article_path(HELLO)
                ),
                None,
            )
            .await
            .json();
        assert!(body["data"].get("relationships").is_none());
        assert_eq!(body["included"][0]["attributes"], json!({"name": "Ada"}));
    }

    #[tokio::test]
    async fn test_invalid_include_is_bad_request() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .get(&format!("{}?include=title", article_path(HELLO)), None)
            .await;
        assert_status(&response, 400);

        let response = harness
            .get(&format!("{}?include=nope", article_path(HELLO)), None)
            .await;
        assert_status(&response, 400);
    }
}

// ============================================================================
// Collections
// ============================================================================

mod collections {
    use super::*;

    #[tokio::test]
    async fn test_collection_lists_bundle_members() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(ARTICLES, None).await;
        assert_status(&response, 200);

        let body: Value = response.json();
        assert_eq!(data_ids(&body), vec![HELLO, WORLD, DRAFT]);
        assert_eq!(body["meta"]["count"], 3);
        assert_eq!(body["links"]["self"]["href"], "http://localhost/jsonapi/node/article");
    }

    #[tokio::test]
    async fn test_collection_without_count() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness.get("/jsonapi/user/user", None).await.json();
        assert_eq!(data_ids(&body).len(), 2);
        assert!(body.get("meta").is_none_or(|meta| meta.get("count").is_none()));
    }

    #[tokio::test]
    async fn test_pagination_links() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?page[limit]=2", ARTICLES), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![HELLO, WORLD]);
        let next = body["links"]["next"]["href"].as_str().expect("next link");
        assert!(next.contains("page%5Boffset%5D=2") || next.contains("page[offset]=2"));
        assert!(body["links"].get("last").is_some());
        assert!(body["links"].get("prev").is_none());

        let body: Value = harness
            .get(&format!("{}?page[offset]=2&page[limit]=2", ARTICLES), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![DRAFT]);
        assert!(body["links"].get("next").is_none());
        assert!(body["links"].get("prev").is_some());
        assert!(body["links"].get("first").is_some());
    }

    #[tokio::test]
    async fn test_page_exactly_filled_has_no_next_link() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?page[limit]=3", ARTICLES), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![HELLO, WORLD, DRAFT]);
        assert_eq!(body["meta"]["count"], 3);
        assert!(body["links"].get("next").is_none());
        assert!(body["links"].get("last").is_none());
    }

    #[tokio::test]
    async fn test_page_with_two_more_rows() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?page[limit]=1", ARTICLES), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![HELLO]);
        let next = body["links"]["next"]["href"].as_str().expect("next link");
        assert!(next.contains("page%5Boffset%5D=1") || next.contains("page[offset]=1"));
        let last = body["links"]["last"]["href"].as_str().expect("last link");
        assert!(last.contains("page%5Boffset%5D=2") || last.contains("page[offset]=2"));
    }

    #[tokio::test]
    async fn test_invalid_page_is_bad_request() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&format!("{}?page[limit]=-1", ARTICLES), None).await;
        assert_status(&response, 400);
    }

    #[tokio::test]
    async fn test_sort_descending() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?sort=-title", ARTICLES), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![WORLD, HELLO, DRAFT]);

        let body: Value = harness.get(&format!("{}?sort=title", ARTICLES), None).await.json();
        assert_eq!(data_ids(&body), vec![DRAFT, HELLO, WORLD]);
    }

    #[tokio::test]
    async fn test_sort_on_unknown_field_is_bad_request() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&format!("{}?sort=nope", ARTICLES), None).await;
        assert_status(&response, 400);
    }

    #[tokio::test]
    async fn test_filter_shorthand() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?filter[title]=Hello", ARTICLES), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![HELLO]);
        assert_eq!(body["meta"]["count"], 1);
    }

    #[tokio::test]
    async fn test_filter_through_relationship() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?filter[author.name]=Ada", ARTICLES), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![HELLO, DRAFT]);
    }

    #[tokio::test]
    async fn test_filter_with_operator() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(
                &format!(
                    "{}?filter[t][condition][path]=title&filter[t][condition][operator]=%3C%3E&filter[t][condition][value]=Hello",
                    ARTICLES
                ),
                None,
            )
            .await
            .json();
        assert_eq!(data_ids(&body), vec![WORLD, DRAFT]);
    }

    #[tokio::test]
    async fn test_filter_on_restricted_field_is_forbidden() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .get(&format!("{}?filter[secret]=classified", ARTICLES), None)
            .await;
        assert_status(&response, 403);
    }

    #[tokio::test]
    async fn test_collection_include_is_deduplicated() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}?include=tags", ARTICLES), None)
            .await
            .json();
        let included = included_keys(&body);
        assert_eq!(
            included,
            vec![
                format!("taxonomy_term--tags/{}", RUST),
                format!("taxonomy_term--tags/{}", WEB),
            ]
        );
    }

    #[tokio::test]
    async fn test_denied_rows_are_reported_in_meta() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(ARTICLES, Some("reader")).await;
        assert_status(&response, 200);

        let body: Value = response.json();
        assert_eq!(body["data"], json!([]));
        let errors = body["meta"]["errors"].as_array().expect("errors in meta");
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e["status"] == "403"));
    }
}

// ============================================================================
// Related resources
// ============================================================================

mod related {
    use super::*;

    #[tokio::test]
    async fn test_to_one_related_resource() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&format!("{}/author", article_path(HELLO)), None).await;
        assert_status(&response, 200);

        let body: Value = response.json();
        assert_eq!(body["data"]["type"], "user--user");
        assert_eq!(body["data"]["id"], ADA);
        assert_eq!(body["data"]["attributes"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_to_many_related_resources() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&format!("{}/tags", article_path(HELLO)), None)
            .await
            .json();
        assert_eq!(data_ids(&body), vec![RUST, WEB]);

        let body: Value = harness
            .get(&format!("{}/tags", article_path(DRAFT)), None)
            .await
            .json();
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_related_on_attribute_is_not_found() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&format!("{}/title", article_path(HELLO)), None).await;
        assert_status(&response, 404);
    }
}

// ============================================================================
// Content negotiation
// ============================================================================

mod negotiation {
    use super::*;

    #[tokio::test]
    async fn test_body_with_wrong_media_type_is_unsupported() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .server
            .post(ARTICLES)
            .json(&json!({"data": {"type": "node--article"}}))
            .await;
        assert_status(&response, 415);
        assert_jsonapi_content_type(&response);
    }

    #[tokio::test]
    async fn test_media_type_parameters_are_unsupported() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .server
            .post(ARTICLES)
            .bytes(Bytes::from(json!({"data": {"type": "node--article"}}).to_string()))
            .content_type("application/vnd.api+json; charset=utf-8")
            .await;
        assert_status(&response, 415);
    }

    #[tokio::test]
    async fn test_accept_with_only_parameters_is_not_acceptable() {
        let harness = JsonApiTestHarness::new();

        let response = harness
            .get(ARTICLES, None)
            .add_header(
                header::ACCEPT,
                HeaderValue::from_static("application/vnd.api+json; ext=bulk"),
            )
            .await;
        assert_status(&response, 406);

        let response = harness
            .get(ARTICLES, None)
            .add_header(
                header::ACCEPT,
                HeaderValue::from_static("application/vnd.api+json; ext=bulk, application/vnd.api+json"),
            )
            .await;
        assert_status(&response, 200);
    }

    #[tokio::test]
    async fn test_invalid_query_parameter_names() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&format!("{}?foo=1", ARTICLES), None).await;
        assert_status(&response, 400);
        let body: Value = response.json();
        assert_eq!(
            body["errors"][0]["detail"],
            "The following query parameters are not allowed by JSON:API: 'foo'."
        );

        let response = harness.get(&format!("{}?fooBar=1", ARTICLES), None).await;
        assert_status(&response, 200);
    }
}

// ============================================================================
// Error documents and cache headers
// ============================================================================

mod documents {
    use super::*;

    #[tokio::test]
    async fn test_error_document_links_to_request() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&article_path("missing"), None).await;
        assert_status(&response, 404);
        assert_jsonapi_content_type(&response);

        let body: Value = response.json();
        let error = &body["errors"][0];
        assert_eq!(error["status"], "404");
        assert_eq!(error["title"], "Not Found");
        assert_eq!(
            error["links"]["via"]["href"],
            "http://localhost/jsonapi/node/article/missing"
        );
        assert!(error.get("meta").is_none());
    }

    #[tokio::test]
    async fn test_error_debug_meta_for_privileged_accounts() {
        let harness = JsonApiTestHarness::new();

        let body: Value = harness
            .get(&article_path("missing"), Some("admin"))
            .await
            .json();
        let meta = &body["errors"][0]["meta"];
        assert!(
            meta["exception"]
                .as_str()
                .is_some_and(|e| e.starts_with("Not found:"))
        );
        assert!(meta["trace"].is_string());
    }

    #[tokio::test]
    async fn test_cache_headers() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(&article_path(HELLO), None).await;
        assert_status(&response, 200);

        let headers = response.headers();
        let cache_control = headers
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .expect("Cache-Control header");
        assert!(cache_control.starts_with("max-age="));

        let tags = headers
            .get(X_CACHE_TAGS)
            .and_then(|v| v.to_str().ok())
            .expect("X-Cache-Tags header");
        assert!(tags.split(' ').any(|t| t == "node:a1"));

        let contexts = headers
            .get(X_CACHE_CONTEXTS)
            .and_then(|v| v.to_str().ok())
            .expect("X-Cache-Contexts header");
        assert!(contexts.split(' ').any(|c| c == "url.query_args"));
    }

    #[tokio::test]
    async fn test_collection_cache_tags_include_list_tag() {
        let harness = JsonApiTestHarness::new();

        let response = harness.get(ARTICLES, None).await;
        let tags = response
            .headers()
            .get(X_CACHE_TAGS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(tags.split(' ').any(|t| t == "node_list"));
    }
}
