//! JSON:API response assertions.

use axum::http::header;
use axum_test::TestResponse;
use helios_jsonapi::middleware::JSONAPI_MEDIA_TYPE;
use serde_json::Value;

/// Asserts that the response has the expected status code.
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status_code().as_u16();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {}: {}",
        expected,
        actual,
        response.text()
    );
}

/// Asserts that the response is a JSON:API document.
pub fn assert_jsonapi_content_type(response: &TestResponse) {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert_eq!(content_type, JSONAPI_MEDIA_TYPE);
}

/// Asserts that the body is an error document whose first error has the
/// given status.
pub fn assert_error(body: &Value, status: &str) {
    let errors = body["errors"].as_array().expect("Expected an errors array");
    assert!(!errors.is_empty(), "Expected at least one error");
    assert_eq!(errors[0]["status"], status);
}

/// Returns the ids of the primary data of a collection document.
pub fn data_ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .expect("Expected collection data")
        .iter()
        .filter_map(|r| r["id"].as_str().map(String::from))
        .collect()
}

/// Returns the `type/id` pairs of the included resources.
pub fn included_keys(body: &Value) -> Vec<String> {
    body["included"]
        .as_array()
        .map(|included| {
            included
                .iter()
                .map(|r| format!("{}/{}", r["type"].as_str().unwrap_or(""), r["id"].as_str().unwrap_or("")))
                .collect()
        })
        .unwrap_or_default()
}
