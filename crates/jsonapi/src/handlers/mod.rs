//! HTTP request handlers for JSON:API routes.
//!
//! - [`entry_point`] - List the collection URLs of all resource types
//! - [`collection`] - Fetch or create resources of one type
//! - [`individual`] - Fetch, update or delete one resource
//! - [`related`] - Fetch the resources a relationship points at
//! - [`relationship`] - Fetch or mutate relationship linkage
//! - [`health`] - Health check endpoint

pub mod collection;
pub mod entry_point;
pub mod health;
pub mod individual;
pub mod related;
pub mod relationship;

pub use collection::{create_individual_handler, get_collection_handler};
pub use entry_point::entry_point_handler;
pub use health::health_handler;
pub use individual::{delete_individual_handler, get_individual_handler, patch_individual_handler};
pub use related::get_related_handler;
pub use relationship::{
    create_relationship_handler, delete_relationship_handler, get_relationship_handler,
    patch_relationship_handler,
};
