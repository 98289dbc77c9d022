//! In-memory backend implementation.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::EntityStorage;
use crate::entity::Entity;
use crate::error::{EntityError, SchemaError, StorageResult};
use crate::query::{EntityQuery, Operator};
use crate::schema::Schema;
use crate::validation::{Violation, validate_entity};

use super::evaluator::{Evaluator, Store};

/// An entity together with its insertion sequence, which is the default
/// result order.
#[derive(Debug, Clone)]
pub(crate) struct StoredEntity {
    pub(crate) sequence: u64,
    pub(crate) entity: Entity,
}

/// In-memory entity storage.
///
/// Entities live in a `parking_lot::RwLock`-guarded map. The schema can be
/// swapped at runtime with [`MemoryBackend::set_schema`].
pub struct MemoryBackend {
    schema: RwLock<Arc<Schema>>,
    entities: RwLock<Store>,
    sequence: AtomicU64,
}

impl Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entity_types", &self.schema.read().entity_type_ids().count())
            .field("entities", &self.len())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Creates an empty backend for the schema.
    pub fn new(schema: Schema) -> Self {
        info!(
            entity_types = schema.entity_type_ids().count(),
            "Initializing in-memory entity backend"
        );
        Self {
            schema: RwLock::new(Arc::new(schema)),
            entities: RwLock::new(BTreeMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Replaces the schema snapshot. Stored entities are kept.
    pub fn set_schema(&self, schema: Schema) {
        *self.schema.write() = Arc::new(schema);
    }

    /// Stores entities without validation, e.g. fixtures.
    pub fn seed(&self, entities: impl IntoIterator<Item = Entity>) -> StorageResult<usize> {
        let schema = self.schema();
        let mut store = self.entities.write();
        let mut seeded = 0;
        for mut entity in entities {
            let definition = Self::check_bundle(&schema, &entity)?;
            entity.sync_keys(definition);
            entity.mark_saved();
            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
            store
                .entry(entity.entity_type().to_string())
                .or_default()
                .insert(
                    entity.uuid().to_string(),
                    StoredEntity { sequence, entity },
                );
            seeded += 1;
        }
        debug!(count = seeded, "Seeded entities");
        Ok(seeded)
    }

    /// Returns the number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.read().values().map(BTreeMap::len).sum()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_bundle<'s>(
        schema: &'s Schema,
        entity: &Entity,
    ) -> StorageResult<&'s crate::schema::EntityTypeDefinition> {
        let definition =
            schema
                .entity_type(entity.entity_type())
                .ok_or_else(|| SchemaError::UnknownEntityType {
                    entity_type: entity.entity_type().to_string(),
                })?;
        if !schema.has_bundle(entity.entity_type(), entity.bundle()) {
            return Err(EntityError::InvalidBundle {
                entity_type: entity.entity_type().to_string(),
                bundle: entity.bundle().to_string(),
            }
            .into());
        }
        Ok(definition)
    }

    fn matching<'a>(schema: &Schema, store: &'a Store, query: &EntityQuery) -> Vec<&'a StoredEntity> {
        let evaluator = Evaluator::new(schema, store);
        let mut rows: Vec<&StoredEntity> = store
            .get(query.entity_type())
            .map(|entities| entities.values().collect())
            .unwrap_or_default();
        rows.sort_by_key(|stored| stored.sequence);
        rows.retain(|stored| evaluator.matches_group(&stored.entity, query.root()));
        evaluator.sort(&mut rows, query.sorts());
        rows
    }
}

#[async_trait]
impl EntityStorage for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema.read())
    }

    async fn load(&self, entity_type: &str, uuid: &str) -> StorageResult<Option<Entity>> {
        Ok(self
            .entities
            .read()
            .get(entity_type)
            .and_then(|entities| entities.get(uuid))
            .map(|stored| stored.entity.clone()))
    }

    async fn load_multiple(&self, entity_type: &str, uuids: &[String]) -> StorageResult<Vec<Entity>> {
        let store = self.entities.read();
        let Some(entities) = store.get(entity_type) else {
            return Ok(Vec::new());
        };
        Ok(uuids
            .iter()
            .filter_map(|uuid| entities.get(uuid))
            .map(|stored| stored.entity.clone())
            .collect())
    }

    async fn load_by_properties(
        &self,
        entity_type: &str,
        properties: &BTreeMap<String, Value>,
    ) -> StorageResult<Vec<Entity>> {
        let mut query = EntityQuery::new(entity_type);
        for (path, value) in properties {
            query.condition(path.clone(), value.clone(), Operator::Eq);
        }
        let schema = self.schema();
        let store = self.entities.read();
        Ok(Self::matching(&schema, &store, &query)
            .into_iter()
            .map(|stored| stored.entity.clone())
            .collect())
    }

    async fn save(&self, mut entity: Entity) -> StorageResult<Entity> {
        let schema = self.schema();
        let definition = Self::check_bundle(&schema, &entity)?;
        entity.sync_keys(definition);

        let mut store = self.entities.write();
        let entities = store.entry(entity.entity_type().to_string()).or_default();
        let existing = entities.get(entity.uuid()).map(|stored| stored.sequence);
        if entity.is_new() && existing.is_some() {
            return Err(EntityError::AlreadyExists {
                entity_type: entity.entity_type().to_string(),
                id: entity.uuid().to_string(),
            }
            .into());
        }

        let sequence =
            existing.unwrap_or_else(|| self.sequence.fetch_add(1, Ordering::SeqCst));
        entity.mark_saved();
        debug!(
            entity_type = %entity.entity_type(),
            uuid = %entity.uuid(),
            "Saved entity"
        );
        entities.insert(
            entity.uuid().to_string(),
            StoredEntity {
                sequence,
                entity: entity.clone(),
            },
        );
        Ok(entity)
    }

    async fn delete(&self, entity: &Entity) -> StorageResult<()> {
        let mut store = self.entities.write();
        let removed = store
            .get_mut(entity.entity_type())
            .and_then(|entities| entities.remove(entity.uuid()));
        match removed {
            Some(_) => {
                debug!(entity_type = %entity.entity_type(), uuid = %entity.uuid(), "Deleted entity");
                Ok(())
            }
            None => Err(EntityError::NotFound {
                entity_type: entity.entity_type().to_string(),
                id: entity.uuid().to_string(),
            }
            .into()),
        }
    }

    async fn execute(&self, query: &EntityQuery) -> StorageResult<Vec<String>> {
        let schema = self.schema();
        let store = self.entities.read();
        let rows = Self::matching(&schema, &store, query);
        let (offset, length) = query.get_range().unwrap_or((0, usize::MAX));
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(length)
            .map(|stored| stored.entity.uuid().to_string())
            .collect())
    }

    async fn count(&self, query: &EntityQuery) -> StorageResult<usize> {
        let schema = self.schema();
        let store = self.entities.read();
        Ok(Self::matching(&schema, &store, query).len())
    }

    async fn validate(&self, entity: &Entity) -> StorageResult<Vec<Violation>> {
        let schema = self.schema();
        let store = self.entities.read();
        Ok(validate_entity(&schema, entity, |entity_type, uuid| {
            store
                .get(entity_type)
                .and_then(|entities| entities.get(uuid))
                .map(|stored| stored.entity.bundle().to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ConditionGroup, SortDirection};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{"entity_types": [
                {"id": "node", "keys": {"bundle": "type"}, "bundles": {
                    "article": {"fields": [
                        {"name": "title", "type": "string", "required": true},
                        {"name": "body", "type": "text"},
                        {"name": "weight", "type": "integer"},
                        {"name": "uid", "type": "entity_reference", "settings": {"target_type": "user"}},
                        {"name": "tags", "type": "entity_reference", "cardinality": -1,
                         "settings": {"target_type": "user"}}
                    ]},
                    "page": {"fields": [{"name": "title", "type": "string"}]}
                }},
                {"id": "user", "base_fields": [{"name": "name", "type": "string"}]}
            ]}"#,
        )
        .unwrap()
    }

    fn article(uuid: &str, title: &str, weight: i64, author: &str) -> Entity {
        Entity::new("node", "article", uuid)
            .with_value("title", json!(title))
            .with_value("weight", json!(weight))
            .with_references("uid", [author])
    }

    async fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new(schema());
        backend
            .seed([
                Entity::new("user", "user", "u1").with_value("name", json!("alice")),
                Entity::new("user", "user", "u2").with_value("name", json!("bob")),
                article("a1", "First", 3, "u1"),
                article("a2", "Second", 1, "u2"),
                article("a3", "Third", 2, "u1"),
                Entity::new("node", "page", "p1").with_value("title", json!("About")),
            ])
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_load_and_load_multiple() {
        let backend = backend().await;
        let a1 = backend.load("node", "a1").await.unwrap().unwrap();
        assert!(!a1.is_new());
        assert_eq!(a1.get("type")[0]["value"], json!("article"));

        let loaded = backend
            .load_multiple("node", &["a3".to_string(), "zz".to_string(), "a1".to_string()])
            .await
            .unwrap();
        let ids: Vec<_> = loaded.iter().map(Entity::uuid).collect();
        assert_eq!(ids, vec!["a3", "a1"]);
        assert!(backend.load("node", "zz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_execute_bundle_condition_and_default_order() {
        let backend = backend().await;
        let mut query = EntityQuery::new("node");
        query.condition("type", json!("article"), Operator::Eq);
        let ids = backend.execute(&query).await.unwrap();
        assert_eq!(ids, vec!["a1", "a2", "a3"]);
    }

    #[tokio::test]
    async fn test_execute_reference_path() {
        let backend = backend().await;
        let mut query = EntityQuery::new("node");
        query.condition("uid.entity.name", json!("alice"), Operator::Eq);
        let ids = backend.execute(&query).await.unwrap();
        assert_eq!(ids, vec!["a1", "a3"]);

        let mut query = EntityQuery::new("node");
        query.condition("uid.entity.uuid", json!("u2"), Operator::Eq);
        assert_eq!(backend.execute(&query).await.unwrap(), vec!["a2"]);
    }

    #[tokio::test]
    async fn test_execute_sort_and_range() {
        let backend = backend().await;
        let mut query = EntityQuery::new("node");
        query
            .condition("type", json!("article"), Operator::Eq)
            .sort("weight", SortDirection::Desc, None)
            .range(1, 2);
        assert_eq!(backend.execute(&query).await.unwrap(), vec!["a3", "a2"]);
        assert_eq!(backend.count(&query).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_execute_or_group_and_exists() {
        let backend = backend().await;
        let mut group = ConditionGroup::or();
        group
            .condition("title", json!("First"), Operator::Eq)
            .condition("weight", json!("1"), Operator::Eq);
        let mut query = EntityQuery::new("node");
        query.condition_group(group).exists("uid");
        assert_eq!(backend.execute(&query).await.unwrap(), vec!["a1", "a2"]);

        let mut query = EntityQuery::new("node");
        query.not_exists("uid");
        assert_eq!(backend.execute(&query).await.unwrap(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_delta_path() {
        let backend = backend().await;
        backend
            .save(
                Entity::new("node", "article", "a4")
                    .with_value("title", json!("Tagged"))
                    .with_references("tags", ["u2", "u1"]),
            )
            .await
            .unwrap();

        let mut query = EntityQuery::new("node");
        query.condition("tags.0.entity.name", json!("bob"), Operator::Eq);
        assert_eq!(backend.execute(&query).await.unwrap(), vec!["a4"]);

        let mut query = EntityQuery::new("node");
        query.condition("tags.0.entity.name", json!("alice"), Operator::Eq);
        assert!(backend.execute(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_new_conflict() {
        let backend = backend().await;
        let result = backend.save(article("a1", "Dup", 0, "u1")).await;
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_save_existing_keeps_order() {
        let backend = backend().await;
        let mut a1 = backend.load("node", "a1").await.unwrap().unwrap();
        a1.set_value("title", "value", json!("Renamed"));
        backend.save(a1).await.unwrap();

        let mut query = EntityQuery::new("node");
        query.condition("type", json!("article"), Operator::Eq);
        assert_eq!(backend.execute(&query).await.unwrap(), vec!["a1", "a2", "a3"]);
    }

    #[tokio::test]
    async fn test_save_invalid_bundle() {
        let backend = backend().await;
        let result = backend.save(Entity::new("node", "blog", "b1")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = backend().await;
        let a2 = backend.load("node", "a2").await.unwrap().unwrap();
        backend.delete(&a2).await.unwrap();
        assert!(backend.load("node", "a2").await.unwrap().is_none());
        assert!(backend.delete(&a2).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_validate_uses_store() {
        let backend = backend().await;
        let entity = Entity::new("node", "article", "a9")
            .with_value("title", json!("x"))
            .with_references("uid", ["nobody"]);
        let violations = backend.validate(&entity).await.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "uid");
    }

    #[tokio::test]
    async fn test_load_by_properties() {
        let backend = backend().await;
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), json!("bob"));
        let users = backend.load_by_properties("user", &properties).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].uuid(), "u2");
    }
}
