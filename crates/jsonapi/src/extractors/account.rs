//! Account extractor.
//!
//! Requests identify their account with the `X-Account-Id` header. Unknown
//! or missing ids run as the anonymous account of the registry.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::HeaderName, request::Parts},
};
use helios_entity::access::Account;
use helios_entity::core::EntityStorage;
use tracing::debug;

use crate::state::AppState;

/// Header name for account identification.
pub static X_ACCOUNT_ID: HeaderName = HeaderName::from_static("x-account-id");

/// Axum extractor for the requesting account.
///
/// # Example
///
/// ```rust,ignore
/// use helios_jsonapi::extractors::AccountExtractor;
///
/// async fn handler(account: AccountExtractor) {
///     println!("Account: {}", account.account().id());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AccountExtractor {
    account: Account,
}

impl AccountExtractor {
    /// Wraps an account.
    pub fn new(account: Account) -> Self {
        Self { account }
    }

    /// Returns the account.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Consumes the extractor and returns the account.
    pub fn into_account(self) -> Account {
        self.account
    }
}

/// Reads the account id header.
pub fn account_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(&X_ACCOUNT_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

impl<S> FromRequestParts<AppState<S>> for AccountExtractor
where
    S: EntityStorage + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let requested = account_id_from_headers(&parts.headers);
        let account = state.accounts().resolve(requested);
        debug!(
            requested = requested.unwrap_or_default(),
            account = account.id(),
            "Resolved account"
        );
        Ok(Self::new(account))
    }
}
