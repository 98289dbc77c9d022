//! Entity and field access control.
//!
//! Access questions are always asked with an explicit [`Account`]; there is
//! no ambient current user.

mod account;
mod policy;
mod result;

pub use account::{
    ADMINISTER_ENTITIES, ANONYMOUS_ACCOUNT_ID, Account, AccountRegistry, VIEW_SYSTEM_REPORTS,
};
pub use policy::{
    AccessPolicy, EntityOperation, FieldOperation, PERMISSIONS_CACHE_CONTEXT,
    PermissionAccessPolicy,
};
pub use result::{AccessOutcome, AccessResult};
