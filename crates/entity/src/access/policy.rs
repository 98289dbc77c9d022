//! Access policies.
//!
//! [`AccessPolicy`] is the seam the API layer asks every access question
//! through. [`PermissionAccessPolicy`] answers them from permission strings:
//!
//! | Question | Permission |
//! |----------|------------|
//! | entity operation | `<op> <entity_type>` or `<op> <entity_type>--<bundle>` |
//! | field view | the field's `view_permission`, if set |
//! | field edit | the field's `edit_permission`, if set; never for read-only fields |
//!
//! [`ADMINISTER_ENTITIES`] bypasses everything except read-only fields.

use std::fmt;

use super::account::{ADMINISTER_ENTITIES, Account};
use super::result::AccessResult;
use crate::entity::Entity;
use crate::schema::FieldDefinition;

/// Cache context every permission-based decision varies by.
pub const PERMISSIONS_CACHE_CONTEXT: &str = "user.permissions";

/// Entity-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOperation {
    /// Read the entity.
    View,
    /// Create a new entity.
    Create,
    /// Modify the entity.
    Update,
    /// Delete the entity.
    Delete,
}

impl EntityOperation {
    /// Returns the operation name used in permission strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityOperation::View => "view",
            EntityOperation::Create => "create",
            EntityOperation::Update => "update",
            EntityOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for EntityOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOperation {
    /// Read the field value.
    View,
    /// Write the field value.
    Edit,
}

/// Answers access questions for an account.
pub trait AccessPolicy: Send + Sync {
    /// Checks an operation on an existing entity.
    fn entity_access(
        &self,
        entity: &Entity,
        operation: EntityOperation,
        account: &Account,
    ) -> AccessResult;

    /// Checks whether an entity of the given type and bundle may be created.
    fn create_access(&self, entity_type: &str, bundle: &str, account: &Account) -> AccessResult;

    /// Checks an operation on a field, optionally of a specific entity.
    fn field_access(
        &self,
        operation: FieldOperation,
        field: &FieldDefinition,
        account: &Account,
        entity: Option<&Entity>,
    ) -> AccessResult;
}

/// Permission-string based access policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionAccessPolicy;

impl PermissionAccessPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self
    }

    fn bundle_permission_access(
        operation: EntityOperation,
        entity_type: &str,
        bundle: &str,
        account: &Account,
    ) -> AccessResult {
        let type_permission = format!("{} {}", operation, entity_type);
        let bundle_permission = format!("{} {}--{}", operation, entity_type, bundle);
        let allowed = account.has_permission(ADMINISTER_ENTITIES)
            || account.has_permission(&type_permission)
            || account.has_permission(&bundle_permission);

        let result = AccessResult::allowed_if(allowed).with_cache_context(PERMISSIONS_CACHE_CONTEXT);
        if allowed {
            result
        } else {
            result.with_reason(format!(
                "The '{}' permission is required.",
                bundle_permission
            ))
        }
    }
}

impl AccessPolicy for PermissionAccessPolicy {
    fn entity_access(
        &self,
        entity: &Entity,
        operation: EntityOperation,
        account: &Account,
    ) -> AccessResult {
        Self::bundle_permission_access(operation, entity.entity_type(), entity.bundle(), account)
            .with_cacheability(&entity.cacheability())
    }

    fn create_access(&self, entity_type: &str, bundle: &str, account: &Account) -> AccessResult {
        Self::bundle_permission_access(EntityOperation::Create, entity_type, bundle, account)
    }

    fn field_access(
        &self,
        operation: FieldOperation,
        field: &FieldDefinition,
        account: &Account,
        _entity: Option<&Entity>,
    ) -> AccessResult {
        if operation == FieldOperation::Edit && field.read_only {
            return AccessResult::forbidden().with_reason(format!(
                "The '{}' field is read-only.",
                field.name
            ));
        }

        let permission = match operation {
            FieldOperation::View => field.view_permission.as_deref(),
            FieldOperation::Edit => field.edit_permission.as_deref(),
        };

        match permission {
            None => AccessResult::allowed(),
            Some(permission) => {
                let allowed =
                    account.has_permission(ADMINISTER_ENTITIES) || account.has_permission(permission);
                let result =
                    AccessResult::allowed_if(allowed).with_cache_context(PERMISSIONS_CACHE_CONTEXT);
                if allowed {
                    result
                } else {
                    result.with_reason(format!("The '{}' permission is required.", permission))
                }
            }
        }
    }
}
