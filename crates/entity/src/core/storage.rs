//! Core entity storage trait.
//!
//! This module defines the [`EntityStorage`] trait, the only contract the
//! API layer uses to read, query, validate and persist entities.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::entity::Entity;
use crate::error::StorageResult;
use crate::query::EntityQuery;
use crate::schema::Schema;
use crate::validation::Violation;

/// Storage for schema-described entities.
///
/// Save and delete are atomic per entity; there is no multi-entity
/// transaction support.
///
/// # Example
///
/// ```ignore
/// use helios_entity::core::EntityStorage;
/// use helios_entity::query::{EntityQuery, Operator};
///
/// async fn titles<S: EntityStorage>(storage: &S) -> StorageResult<Vec<String>> {
///     let mut query = EntityQuery::new("node");
///     query.condition("type", "article".into(), Operator::Eq);
///     let ids = storage.execute(&query).await?;
///     let nodes = storage.load_multiple("node", &ids).await?;
///     Ok(nodes.iter().map(|n| n.get("title")[0]["value"].to_string()).collect())
/// }
/// ```
#[async_trait]
pub trait EntityStorage: Send + Sync {
    /// Returns a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Returns the current schema snapshot.
    fn schema(&self) -> Arc<Schema>;

    /// Loads one entity by UUID.
    async fn load(&self, entity_type: &str, uuid: &str) -> StorageResult<Option<Entity>>;

    /// Loads several entities, preserving the order of `uuids` and skipping
    /// missing ones.
    async fn load_multiple(&self, entity_type: &str, uuids: &[String]) -> StorageResult<Vec<Entity>>;

    /// Loads every entity whose field paths equal the given values.
    async fn load_by_properties(
        &self,
        entity_type: &str,
        properties: &BTreeMap<String, Value>,
    ) -> StorageResult<Vec<Entity>>;

    /// Persists an entity.
    ///
    /// # Errors
    ///
    /// * `EntityError::AlreadyExists` - a new entity reuses an existing UUID
    /// * `EntityError::InvalidBundle` - the bundle is not defined
    async fn save(&self, entity: Entity) -> StorageResult<Entity>;

    /// Deletes an entity.
    ///
    /// # Errors
    ///
    /// * `EntityError::NotFound` - the entity does not exist
    async fn delete(&self, entity: &Entity) -> StorageResult<()>;

    /// Executes a query, returning matching UUIDs in result order.
    async fn execute(&self, query: &EntityQuery) -> StorageResult<Vec<String>>;

    /// Counts the rows a query matches, ignoring its range.
    async fn count(&self, query: &EntityQuery) -> StorageResult<usize>;

    /// Validates an entity against the schema and stored references.
    async fn validate(&self, entity: &Entity) -> StorageResult<Vec<Violation>>;
}
