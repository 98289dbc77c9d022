//! The entity model.
//!
//! An [`Entity`] is identified by `(entity_type, uuid)` and belongs to one
//! bundle. Field values are ordered lists of items; an item is a map from
//! property name to JSON value, e.g. `{"value": "Hello"}` or
//! `{"target_id": "<uuid>"}` for references.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CacheableMetadata;
use crate::schema::EntityTypeDefinition;

/// One item of a field: property name to value.
pub type FieldItem = serde_json::Map<String, Value>;

/// A stored or about-to-be-stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    entity_type: String,
    bundle: String,
    uuid: String,
    #[serde(default)]
    fields: BTreeMap<String, Vec<FieldItem>>,
    #[serde(skip)]
    is_new: bool,
}

impl Entity {
    /// Creates an entity that has not been saved yet.
    pub fn new(
        entity_type: impl Into<String>,
        bundle: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            bundle: bundle.into(),
            uuid: uuid.into(),
            fields: BTreeMap::new(),
            is_new: true,
        }
    }

    /// Returns the entity type id.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the bundle.
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// Returns the UUID.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns true until the entity has been saved.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Marks the entity as persisted.
    pub fn mark_saved(&mut self) {
        self.is_new = false;
    }

    /// Returns the items of a field, empty when unset.
    pub fn get(&self, field_name: &str) -> &[FieldItem] {
        self.fields
            .get(field_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns true if the field holds at least one item.
    pub fn has_value(&self, field_name: &str) -> bool {
        !self.get(field_name).is_empty()
    }

    /// Replaces the items of a field.
    pub fn set(&mut self, field_name: impl Into<String>, items: Vec<FieldItem>) {
        let field_name = field_name.into();
        if items.is_empty() {
            self.fields.remove(&field_name);
        } else {
            self.fields.insert(field_name, items);
        }
    }

    /// Sets a single-item field from its main property value.
    pub fn set_value(&mut self, field_name: impl Into<String>, property: &str, value: Value) {
        let mut item = FieldItem::new();
        item.insert(property.to_string(), value);
        self.set(field_name, vec![item]);
    }

    /// Builder form of [`Entity::set_value`] for the `value` property.
    pub fn with_value(mut self, field_name: impl Into<String>, value: Value) -> Self {
        self.set_value(field_name, "value", value);
        self
    }

    /// Builder form adding references to the given target UUIDs.
    pub fn with_references<I, T>(mut self, field_name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let items = targets
            .into_iter()
            .map(|target| reference_item(target.into()))
            .collect();
        self.set(field_name, items);
        self
    }

    /// Returns the names of all fields holding items.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the target UUIDs of a reference field, in item order.
    pub fn target_ids(&self, field_name: &str) -> Vec<String> {
        self.get(field_name)
            .iter()
            .filter_map(|item| item.get("target_id").and_then(Value::as_str))
            .map(String::from)
            .collect()
    }

    /// Writes the UUID and bundle keys into their key fields.
    pub fn sync_keys(&mut self, definition: &EntityTypeDefinition) {
        let uuid = Value::String(self.uuid.clone());
        self.set_value(definition.keys.uuid.clone(), "value", uuid);
        if let Some(bundle_key) = &definition.keys.bundle {
            let bundle = Value::String(self.bundle.clone());
            self.set_value(bundle_key.clone(), "value", bundle);
        }
    }

    /// Returns the cache tag identifying this entity.
    pub fn cache_tag(&self) -> String {
        format!("{}:{}", self.entity_type, self.uuid)
    }

    /// Returns the cache tag invalidated whenever any entity of this type
    /// changes.
    pub fn list_cache_tag(entity_type: &str) -> String {
        format!("{}_list", entity_type)
    }

    /// Returns the cacheability of this entity.
    pub fn cacheability(&self) -> CacheableMetadata {
        CacheableMetadata::new().with_tags([self.cache_tag()])
    }
}

/// Builds a reference item pointing at `target_id`.
pub fn reference_item(target_id: String) -> FieldItem {
    let mut item = FieldItem::new();
    item.insert("target_id".to_string(), Value::String(target_id));
    item
}
