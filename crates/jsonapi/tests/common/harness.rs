//! JSON:API test harness.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::HeaderValue;
use axum_test::{TestRequest, TestServer};
use helios_entity::backends::memory::MemoryBackend;
use helios_jsonapi::extractors::X_ACCOUNT_ID;
use helios_jsonapi::middleware::JSONAPI_MEDIA_TYPE;
use helios_jsonapi::{AppState, ServerConfig, create_app_with_state};
use serde_json::Value;

use super::fixtures;

/// A test server over a seeded in-memory backend.
pub struct JsonApiTestHarness {
    /// The test server instance.
    pub server: TestServer,
    /// The storage backend.
    pub backend: Arc<MemoryBackend>,
}

impl JsonApiTestHarness {
    /// Creates a server over the fixture schema and entities.
    pub fn new() -> Self {
        Self::with_config(ServerConfig {
            anonymous_permissions: fixtures::ANONYMOUS_PERMISSIONS.to_string(),
            ..ServerConfig::for_testing()
        })
    }

    /// Creates a server with a custom configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        let backend = MemoryBackend::new(fixtures::schema());
        backend
            .seed(fixtures::entities())
            .expect("Failed to seed fixtures");
        let backend = Arc::new(backend);

        let state = AppState::new(Arc::clone(&backend), config)
            .with_overrides(fixtures::overrides())
            .with_accounts(fixtures::accounts());
        let server = TestServer::new(create_app_with_state(state))
            .expect("Failed to create test server");

        Self { server, backend }
    }

    /// `GET` as the given account (anonymous for `None`).
    pub fn get(&self, path: &str, account: Option<&str>) -> TestRequest {
        with_account(self.server.get(path), account)
    }

    /// `POST` a JSON:API document.
    pub fn post(&self, path: &str, account: Option<&str>, body: &Value) -> TestRequest {
        with_document(with_account(self.server.post(path), account), body)
    }

    /// `PATCH` a JSON:API document.
    pub fn patch(&self, path: &str, account: Option<&str>, body: &Value) -> TestRequest {
        with_document(with_account(self.server.patch(path), account), body)
    }

    /// `DELETE`, optionally with a JSON:API document.
    pub fn delete(&self, path: &str, account: Option<&str>, body: Option<&Value>) -> TestRequest {
        let request = with_account(self.server.delete(path), account);
        match body {
            Some(body) => with_document(request, body),
            None => request,
        }
    }
}

fn with_account(request: TestRequest, account: Option<&str>) -> TestRequest {
    match account {
        Some(id) => request.add_header(
            X_ACCOUNT_ID.clone(),
            HeaderValue::from_str(id).expect("valid account id"),
        ),
        None => request,
    }
}

fn with_document(request: TestRequest, body: &Value) -> TestRequest {
    request
        .bytes(Bytes::from(body.to_string()))
        .content_type(JSONAPI_MEDIA_TYPE)
}
