//! Resource object values.

use helios_entity::cache::{Cacheable, CacheableMetadata};
use serde_json::{Map, Value, json};

use super::field::{FieldNormalizerValue, NullFieldNormalizerValue};
use super::relationship::{IncludeOnlyRelationshipValue, RelationshipNormalizerValue};
use super::{NormalizerValue, ResourceObjectValue};

/// The normalized form of one field of a resource object.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Rendered under `attributes`.
    Attribute(FieldNormalizerValue),
    /// Rendered under `relationships`.
    Relationship(RelationshipNormalizerValue),
    /// Not rendered; only carries includes.
    IncludeOnly(IncludeOnlyRelationshipValue),
    /// Not rendered because the account may not view it.
    Null(NullFieldNormalizerValue),
}

impl FieldValue {
    /// Returns the values included through this field.
    pub fn includes(&self) -> &[ResourceObjectValue] {
        match self {
            FieldValue::Relationship(relationship) => relationship.includes(),
            FieldValue::IncludeOnly(include_only) => include_only.includes(),
            FieldValue::Attribute(_) | FieldValue::Null(_) => &[],
        }
    }

    fn cacheability(&self) -> &CacheableMetadata {
        match self {
            FieldValue::Attribute(value) => value.cacheability(),
            FieldValue::Relationship(value) => value.cacheability(),
            FieldValue::IncludeOnly(value) => value.cacheability(),
            FieldValue::Null(value) => value.cacheability(),
        }
    }
}

/// A normalized entity.
#[derive(Debug, Clone)]
pub struct EntityNormalizerValue {
    type_name: String,
    id: String,
    fields: Vec<(String, FieldValue)>,
    links: Map<String, Value>,
    cacheability: CacheableMetadata,
}

impl EntityNormalizerValue {
    /// Creates a resource object value.
    ///
    /// `fields` are keyed by public name in rendering order. `base` is the
    /// entity's own cacheability; every field's cacheability is merged in.
    pub fn new(
        type_name: impl Into<String>,
        id: impl Into<String>,
        fields: Vec<(String, FieldValue)>,
        links: Map<String, Value>,
        base: &CacheableMetadata,
    ) -> Self {
        let cacheability = fields
            .iter()
            .fold(base.clone(), |acc, (_, field)| acc.merge(field.cacheability()));
        Self {
            type_name: type_name.into(),
            id: id.into(),
            fields,
            links,
            cacheability,
        }
    }

    /// Returns the resource type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the resource id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the field values keyed by public name.
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Returns one field value by public name.
    pub fn field(&self, public_name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == public_name)
            .map(|(_, value)| value)
    }

    /// Flattens every value included below this entity, depth first.
    pub fn rasterize_includes(&self) -> Vec<ResourceObjectValue> {
        let mut includes = Vec::new();
        for (_, field) in &self.fields {
            for include in field.includes() {
                includes.push(include.clone());
                includes.extend(include.nested_includes());
            }
        }
        includes
    }
}

impl Cacheable for EntityNormalizerValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for EntityNormalizerValue {
    fn rasterize(&self) -> Value {
        let mut attributes = Map::new();
        let mut relationships = Map::new();
        for (name, field) in &self.fields {
            match field {
                FieldValue::Attribute(value) => {
                    attributes.insert(name.clone(), value.rasterize());
                }
                FieldValue::Relationship(value) => {
                    relationships.insert(name.clone(), value.rasterize());
                }
                FieldValue::IncludeOnly(_) | FieldValue::Null(_) => {}
            }
        }

        let mut object = Map::new();
        object.insert("type".to_string(), json!(self.type_name));
        object.insert("id".to_string(), json!(self.id));
        if !attributes.is_empty() {
            object.insert("attributes".to_string(), Value::Object(attributes));
        }
        if !relationships.is_empty() {
            object.insert("relationships".to_string(), Value::Object(relationships));
        }
        if !self.links.is_empty() {
            object.insert("links".to_string(), Value::Object(self.links.clone()));
        }
        Value::Object(object)
    }
}
