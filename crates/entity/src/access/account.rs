//! Accounts and the account registry.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Identifier of the anonymous account.
pub const ANONYMOUS_ACCOUNT_ID: &str = "anonymous";

/// Permission granting every entity and field operation.
pub const ADMINISTER_ENTITIES: &str = "administer entities";

/// Permission exposing debug traces in error documents.
pub const VIEW_SYSTEM_REPORTS: &str = "view system reports";

/// The account a request is performed as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: String,
    #[serde(default)]
    permissions: BTreeSet<String>,
}

impl Account {
    /// Creates an account with the given permissions.
    pub fn new<I, T>(id: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates the anonymous account.
    pub fn anonymous<I, T>(permissions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(ANONYMOUS_ACCOUNT_ID, permissions)
    }

    /// Creates an account holding [`ADMINISTER_ENTITIES`].
    pub fn administrator(id: impl Into<String>) -> Self {
        Self::new(id, [ADMINISTER_ENTITIES, VIEW_SYSTEM_REPORTS])
    }

    /// Returns the account id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true for the anonymous account.
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_ACCOUNT_ID
    }

    /// Returns true if the account holds the permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Returns the permissions.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }
}

/// Known accounts, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: BTreeMap<String, Account>,
    anonymous: Option<Account>,
}

impl AccountRegistry {
    /// Creates a registry from a list of accounts.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.id.clone(), account))
                .collect(),
            anonymous: None,
        }
    }

    /// Sets the account used for unidentified requests.
    pub fn with_anonymous(mut self, anonymous: Account) -> Self {
        self.anonymous = Some(anonymous);
        self
    }

    /// Registers an account.
    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Returns the account with the given id.
    pub fn get(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Returns the anonymous account.
    pub fn anonymous(&self) -> Account {
        self.anonymous
            .clone()
            .unwrap_or_else(|| Account::anonymous(Vec::<String>::new()))
    }

    /// Resolves an optional account id, falling back to anonymous.
    pub fn resolve(&self, id: Option<&str>) -> Account {
        id.and_then(|id| self.get(id).cloned())
            .unwrap_or_else(|| self.anonymous())
    }

    /// Returns the number of registered accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns true if no accounts are registered.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
