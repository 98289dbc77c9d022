//! Attribute values.

use helios_entity::cache::{Cacheable, CacheableMetadata};
use helios_entity::schema::{FieldDefinition, FieldType};
use helios_entity::FieldItem;
use serde_json::{Map, Value};

use super::NormalizerValue;

/// One rendered field item.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldItemNormalizerValue {
    properties: Map<String, Value>,
    cacheability: CacheableMetadata,
}

impl FieldItemNormalizerValue {
    /// Renders the stored properties of an item.
    ///
    /// Nested objects are only kept for map fields; elsewhere an object
    /// renders as its `value` member, or `null` if it has none.
    pub fn new(item: &FieldItem, definition: &FieldDefinition) -> Self {
        let properties = definition
            .stored_property_names()
            .into_iter()
            .filter_map(|name| {
                let value = item.get(&name)?;
                let value = match value {
                    Value::Object(nested) if definition.field_type != FieldType::Map => {
                        nested.get("value").filter(|v| !v.is_object()).cloned().unwrap_or(Value::Null)
                    }
                    other => other.clone(),
                };
                Some((name, value))
            })
            .collect();
        Self {
            properties,
            cacheability: CacheableMetadata::new(),
        }
    }

    /// Creates an item from already rendered properties.
    pub fn from_properties(properties: Map<String, Value>) -> Self {
        Self {
            properties,
            cacheability: CacheableMetadata::new(),
        }
    }
}

impl Cacheable for FieldItemNormalizerValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for FieldItemNormalizerValue {
    /// Single-property items collapse to the bare value.
    fn rasterize(&self) -> Value {
        match self.properties.len() {
            0 => Value::Null,
            1 => self.properties.values().next().cloned().unwrap_or(Value::Null),
            _ => Value::Object(self.properties.clone()),
        }
    }
}

/// A rendered attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNormalizerValue {
    items: Vec<FieldItemNormalizerValue>,
    has_one: bool,
    cacheability: CacheableMetadata,
}

impl FieldNormalizerValue {
    /// Wraps items; `access` is the field's view access cacheability.
    pub fn new(
        items: Vec<FieldItemNormalizerValue>,
        has_one: bool,
        access: &CacheableMetadata,
    ) -> Self {
        let cacheability = items
            .iter()
            .fold(access.clone(), |acc, item| acc.merge(item.cacheability()));
        Self {
            items,
            has_one,
            cacheability,
        }
    }

    /// Renders every item of an entity field.
    pub fn from_items(
        items: &[FieldItem],
        definition: &FieldDefinition,
        access: &CacheableMetadata,
    ) -> Self {
        let items = items
            .iter()
            .map(|item| FieldItemNormalizerValue::new(item, definition))
            .collect();
        Self::new(items, definition.cardinality.is_single(), access)
    }
}

impl Cacheable for FieldNormalizerValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for FieldNormalizerValue {
    fn rasterize(&self) -> Value {
        if self.has_one {
            self.items
                .first()
                .map(NormalizerValue::rasterize)
                .unwrap_or(Value::Null)
        } else {
            Value::Array(self.items.iter().map(NormalizerValue::rasterize).collect())
        }
    }
}

/// A field the account may not view. Never rendered; it only carries the
/// cacheability of the access decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullFieldNormalizerValue {
    cacheability: CacheableMetadata,
}

impl NullFieldNormalizerValue {
    /// Creates a value carrying the access cacheability.
    pub fn new(access: &CacheableMetadata) -> Self {
        Self {
            cacheability: access.clone(),
        }
    }
}

impl Cacheable for NullFieldNormalizerValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for NullFieldNormalizerValue {
    fn rasterize(&self) -> Value {
        Value::Null
    }
}
