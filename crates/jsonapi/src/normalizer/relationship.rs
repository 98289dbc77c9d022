//! Relationship values and resource identifier objects.

use std::collections::HashMap;

use helios_entity::cache::{Cacheable, CacheableMetadata};
use serde_json::{Map, Value, json};

use super::{NormalizerValue, ResourceObjectValue};

/// Id rendered for references whose target no longer exists.
pub const MISSING_ID: &str = "missing";

/// A resource identifier object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceIdentifier {
    type_name: String,
    id: String,
    meta: Map<String, Value>,
}

impl ResourceIdentifier {
    /// Creates an identifier.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            meta: Map::new(),
        }
    }

    /// Sets the identifier meta.
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    /// Returns the resource type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the resource id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the meta members.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    fn to_value(&self, arity: Option<usize>) -> Value {
        let mut object = Map::new();
        object.insert("type".to_string(), json!(self.type_name));
        object.insert("id".to_string(), json!(self.id));
        let mut meta = self.meta.clone();
        if let Some(arity) = arity {
            meta.insert("arity".to_string(), json!(arity));
        }
        if !meta.is_empty() {
            object.insert("meta".to_string(), Value::Object(meta));
        }
        Value::Object(object)
    }
}

/// Renders identifiers, numbering repeated `(type, id)` pairs.
///
/// Every occurrence of a pair that appears more than once gets a
/// `meta.arity` counting from 0 in original order. Unique pairs get none.
pub fn ensure_unique_resource_identifier_objects(identifiers: &[ResourceIdentifier]) -> Vec<Value> {
    let mut totals: HashMap<(&str, &str), usize> = HashMap::new();
    for identifier in identifiers {
        *totals
            .entry((identifier.type_name(), identifier.id()))
            .or_default() += 1;
    }

    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    identifiers
        .iter()
        .map(|identifier| {
            let key = (identifier.type_name(), identifier.id());
            if totals.get(&key).copied().unwrap_or(0) > 1 {
                let arity = seen.entry(key).or_default();
                let value = identifier.to_value(Some(*arity));
                *arity += 1;
                value
            } else {
                identifier.to_value(None)
            }
        })
        .collect()
}

/// A rendered relationship.
#[derive(Debug, Clone)]
pub struct RelationshipNormalizerValue {
    identifiers: Vec<ResourceIdentifier>,
    has_one: bool,
    links: Map<String, Value>,
    includes: Vec<ResourceObjectValue>,
    cacheability: CacheableMetadata,
}

impl RelationshipNormalizerValue {
    /// Creates a relationship value.
    ///
    /// `access` is the field's view access cacheability; the cacheability of
    /// included values is merged in.
    pub fn new(
        identifiers: Vec<ResourceIdentifier>,
        has_one: bool,
        links: Map<String, Value>,
        includes: Vec<ResourceObjectValue>,
        access: &CacheableMetadata,
    ) -> Self {
        let cacheability = includes
            .iter()
            .fold(access.clone(), |acc, include| acc.merge(include.cacheability()));
        Self {
            identifiers,
            has_one,
            links,
            includes,
            cacheability,
        }
    }

    /// Returns the identifiers in item order.
    pub fn identifiers(&self) -> &[ResourceIdentifier] {
        &self.identifiers
    }

    /// Returns true for to-one relationships.
    pub fn has_one(&self) -> bool {
        self.has_one
    }

    /// Returns the relationship links.
    pub fn links(&self) -> &Map<String, Value> {
        &self.links
    }

    /// Returns the included values hanging off this relationship.
    pub fn includes(&self) -> &[ResourceObjectValue] {
        &self.includes
    }

    /// Renders the `data` member.
    pub fn rasterize_data(&self) -> Value {
        if self.has_one {
            self.identifiers
                .first()
                .map(|identifier| identifier.to_value(None))
                .unwrap_or(Value::Null)
        } else {
            Value::Array(ensure_unique_resource_identifier_objects(&self.identifiers))
        }
    }
}

impl Cacheable for RelationshipNormalizerValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for RelationshipNormalizerValue {
    fn rasterize(&self) -> Value {
        let mut object = Map::new();
        object.insert("data".to_string(), self.rasterize_data());
        if !self.links.is_empty() {
            object.insert("links".to_string(), Value::Object(self.links.clone()));
        }
        Value::Object(object)
    }
}

/// A relationship on an include path but outside the sparse fieldset. It is
/// not rendered; it only carries its includes.
#[derive(Debug, Clone)]
pub struct IncludeOnlyRelationshipValue {
    includes: Vec<ResourceObjectValue>,
    cacheability: CacheableMetadata,
}

impl IncludeOnlyRelationshipValue {
    /// Wraps includes.
    pub fn new(includes: Vec<ResourceObjectValue>, access: &CacheableMetadata) -> Self {
        let cacheability = includes
            .iter()
            .fold(access.clone(), |acc, include| acc.merge(include.cacheability()));
        Self {
            includes,
            cacheability,
        }
    }

    /// Returns the included values.
    pub fn includes(&self) -> &[ResourceObjectValue] {
        &self.includes
    }
}

impl Cacheable for IncludeOnlyRelationshipValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for IncludeOnlyRelationshipValue {
    fn rasterize(&self) -> Value {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(pairs: &[(&str, &str)]) -> Vec<ResourceIdentifier> {
        pairs
            .iter()
            .map(|(t, id)| ResourceIdentifier::new(*t, *id))
            .collect()
    }

    #[test]
    fn test_unique_pairs_have_no_arity() {
        let values = ensure_unique_resource_identifier_objects(&ids(&[("t", "1"), ("t", "2")]));
        assert!(values.iter().all(|v| v.get("meta").is_none()));
    }

    #[test]
    fn test_repeated_pairs_are_numbered_in_order() {
        let values = ensure_unique_resource_identifier_objects(&ids(&[
            ("t", "1"),
            ("t", "2"),
            ("t", "1"),
            ("u", "1"),
            ("t", "1"),
            ("t", "2"),
        ]));
        let arity: Vec<Option<u64>> = values
            .iter()
            .map(|v| v.pointer("/meta/arity").and_then(Value::as_u64))
            .collect();
        assert_eq!(
            arity,
            vec![Some(0), Some(0), Some(1), None, Some(2), Some(1)]
        );
    }

    #[test]
    fn test_arity_merges_with_existing_meta() {
        let mut meta = Map::new();
        meta.insert("weight".to_string(), json!(3));
        let identifiers = vec![
            ResourceIdentifier::new("t", "1").with_meta(meta),
            ResourceIdentifier::new("t", "1"),
        ];
        let values = ensure_unique_resource_identifier_objects(&identifiers);
        assert_eq!(values[0]["meta"], json!({"weight": 3, "arity": 0}));
        assert_eq!(values[1]["meta"], json!({"arity": 1}));
    }

    #[test]
    fn test_to_one_and_to_many_rendering() {
        let access = CacheableMetadata::new();
        let one = RelationshipNormalizerValue::new(ids(&[]), true, Map::new(), vec![], &access);
        assert_eq!(one.rasterize(), json!({"data": null}));

        let mut links = Map::new();
        links.insert("self".to_string(), json!({"href": "http://x/rel"}));
        let many = RelationshipNormalizerValue::new(
            ids(&[("t", "1")]),
            false,
            links,
            vec![],
            &access,
        );
        assert_eq!(
            many.rasterize(),
            json!({"data": [{"type": "t", "id": "1"}], "links": {"self": {"href": "http://x/rel"}}})
        );
    }
}
