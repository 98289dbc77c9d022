//! Application state for the JSON:API server.
//!
//! The state is shared by every handler: the storage backend, the server
//! configuration, the memoized resource type catalog, the access policy and
//! the known accounts.

use std::sync::Arc;

use helios_entity::access::{AccessPolicy, Account, AccountRegistry, PermissionAccessPolicy};
use helios_entity::core::EntityStorage;

use crate::config::ServerConfig;
use crate::controller::{EntityResource, PageLimits};
use crate::error::JsonApiResult;
use crate::link_manager::LinkManager;
use crate::resource_type::{ResourceTypeCatalog, ResourceTypeOverrides, ResourceTypeRepository};
use crate::responses::CacheHeaderSettings;

/// Shared application state.
///
/// # Type Parameters
///
/// * `S` - The storage backend type (must implement [`EntityStorage`])
///
/// # Example
///
/// ```rust,ignore
/// use helios_jsonapi::{AppState, ServerConfig};
/// use helios_entity::backends::memory::MemoryBackend;
/// use std::sync::Arc;
///
/// let backend = MemoryBackend::new(schema);
/// let state = AppState::new(Arc::new(backend), ServerConfig::default());
/// ```
pub struct AppState<S> {
    storage: Arc<S>,
    config: Arc<ServerConfig>,
    resource_types: Arc<ResourceTypeRepository>,
    policy: Arc<dyn AccessPolicy>,
    accounts: Arc<AccountRegistry>,
    links: Arc<LinkManager>,
}

// Manually implement Clone since S is wrapped in Arc and doesn't need to be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: Arc::clone(&self.config),
            resource_types: Arc::clone(&self.resource_types),
            policy: Arc::clone(&self.policy),
            accounts: Arc::clone(&self.accounts),
            links: Arc::clone(&self.links),
        }
    }
}

impl<S: EntityStorage> AppState<S> {
    /// Creates a state with the permission-based access policy, no
    /// resource type overrides and no registered accounts.
    ///
    /// Unidentified requests run as an anonymous account holding the
    /// configured anonymous permissions.
    pub fn new(storage: Arc<S>, config: ServerConfig) -> Self {
        let anonymous = Account::anonymous(config.anonymous_permission_list());
        let links = LinkManager::new(config.base_url.clone(), config.normalized_base_path());
        Self {
            storage,
            config: Arc::new(config),
            resource_types: Arc::new(ResourceTypeRepository::default()),
            policy: Arc::new(PermissionAccessPolicy::new()),
            accounts: Arc::new(AccountRegistry::default().with_anonymous(anonymous)),
            links: Arc::new(links),
        }
    }

    /// Replaces the resource type overrides.
    pub fn with_overrides(mut self, overrides: ResourceTypeOverrides) -> Self {
        self.resource_types = Arc::new(ResourceTypeRepository::new(overrides));
        self
    }

    /// Registers known accounts. The anonymous account is kept.
    pub fn with_accounts(mut self, accounts: impl IntoIterator<Item = Account>) -> Self {
        let anonymous = self.accounts.anonymous();
        self.accounts = Arc::new(AccountRegistry::new(accounts).with_anonymous(anonymous));
        self
    }

    /// Replaces the access policy.
    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Returns a reference to the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the access policy.
    pub fn policy(&self) -> &dyn AccessPolicy {
        self.policy.as_ref()
    }

    /// Returns the account registry.
    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    /// Returns the link manager.
    pub fn links(&self) -> &LinkManager {
        &self.links
    }

    /// Returns the resource type repository.
    pub fn resource_types(&self) -> &ResourceTypeRepository {
        &self.resource_types
    }

    /// Returns the resource type catalog of the current schema.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the catalog cannot be built.
    pub fn catalog(&self) -> JsonApiResult<Arc<ResourceTypeCatalog>> {
        Ok(self.resource_types.catalog(&self.storage.schema())?)
    }

    /// Returns the page size limits for collections.
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_size: self.config.default_page_size,
            max_size: self.config.max_page_size,
        }
    }

    /// Returns the cache header settings.
    pub fn cache_settings(&self) -> CacheHeaderSettings {
        CacheHeaderSettings::from_config(&self.config)
    }

    /// Creates the request orchestrator for one account.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the catalog cannot be built.
    pub fn entity_resource<'a>(&'a self, account: &'a Account) -> JsonApiResult<EntityResource<'a, S>> {
        let schema = self.storage.schema();
        let catalog = self.resource_types.catalog(&schema)?;
        Ok(EntityResource::new(
            self.storage.as_ref(),
            schema,
            catalog,
            self.policy.as_ref(),
            account,
            &self.links,
            self.page_limits(),
            self.cache_settings(),
        ))
    }
}
