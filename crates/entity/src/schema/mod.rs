//! Schema introspection.
//!
//! A [`Schema`] is an immutable snapshot of every entity type, its bundles
//! and the field definitions of each (entity type, bundle) pair. It is the
//! only input the resource type catalog is built from.
//!
//! Entity keys are synthesized as read-only base fields: the UUID key as a
//! [`FieldType::Uuid`] field and the bundle key as a [`FieldType::String`]
//! field, so that they can be queried like any other field.

mod definition;

pub use definition::{
    BundleDefinition, Cardinality, EntityKeys, EntityTypeDefinition, FieldDefinition, FieldType,
    PropertyDefinition, PropertyKind, ReferenceSettings, StorageKind,
};

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::{SchemaError, StorageResult};

/// The serialized form of a schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaDocument {
    /// Entity type definitions.
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDefinition>,
}

/// Immutable schema snapshot.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entity_types: BTreeMap<String, EntityTypeDefinition>,
    fields: BTreeMap<(String, String), Vec<FieldDefinition>>,
}

impl Schema {
    /// Builds a schema from entity type definitions.
    ///
    /// # Errors
    ///
    /// Fails on duplicate entity types or fields, reference fields without
    /// settings, and references to undefined entity types.
    pub fn from_definitions(definitions: Vec<EntityTypeDefinition>) -> StorageResult<Self> {
        let mut entity_types = BTreeMap::new();
        for definition in definitions {
            if entity_types.contains_key(&definition.id) {
                return Err(SchemaError::DuplicateEntityType {
                    entity_type: definition.id,
                }
                .into());
            }
            entity_types.insert(definition.id.clone(), definition);
        }

        let mut fields = BTreeMap::new();
        for definition in entity_types.values() {
            for bundle in definition.bundle_names() {
                let bundle_fields = Self::collect_fields(definition, &bundle)?;
                for field in &bundle_fields {
                    if let Some(target_type) = field.target_type() {
                        if !entity_types.contains_key(target_type) {
                            return Err(SchemaError::UnknownTargetType {
                                entity_type: definition.id.clone(),
                                field: field.name.clone(),
                                target_type: target_type.to_string(),
                            }
                            .into());
                        }
                    } else if field.is_reference() {
                        return Err(SchemaError::MissingReferenceSettings {
                            entity_type: definition.id.clone(),
                            field: field.name.clone(),
                        }
                        .into());
                    }
                }
                fields.insert((definition.id.clone(), bundle), bundle_fields);
            }
        }

        Ok(Self {
            entity_types,
            fields,
        })
    }

    /// Parses a schema document.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let document: SchemaDocument = serde_json::from_str(json).map_err(SchemaError::from)?;
        Self::from_definitions(document.entity_types)
    }

    /// Parses a schema from an already decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> StorageResult<Self> {
        let document: SchemaDocument = serde_json::from_value(value).map_err(SchemaError::from)?;
        Self::from_definitions(document.entity_types)
    }

    fn collect_fields(
        definition: &EntityTypeDefinition,
        bundle: &str,
    ) -> StorageResult<Vec<FieldDefinition>> {
        let mut fields = vec![FieldDefinition::new(&definition.keys.uuid, FieldType::Uuid).read_only()];
        if let Some(bundle_key) = &definition.keys.bundle {
            fields.push(FieldDefinition::new(bundle_key, FieldType::String).read_only());
        }

        let bundle_fields = definition
            .bundles
            .get(bundle)
            .map(|b| b.fields.as_slice())
            .unwrap_or_default();

        let mut seen: BTreeSet<String> = fields.iter().map(|f| f.name.clone()).collect();
        for field in definition.base_fields.iter().chain(bundle_fields) {
            if !seen.insert(field.name.clone()) {
                return Err(SchemaError::DuplicateField {
                    entity_type: definition.id.clone(),
                    bundle: bundle.to_string(),
                    field: field.name.clone(),
                }
                .into());
            }
            fields.push(field.clone());
        }
        Ok(fields)
    }

    /// Returns the ids of all entity types.
    pub fn entity_type_ids(&self) -> impl Iterator<Item = &str> {
        self.entity_types.keys().map(String::as_str)
    }

    /// Returns all entity type definitions.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityTypeDefinition> {
        self.entity_types.values()
    }

    /// Returns the definition of an entity type.
    pub fn entity_type(&self, entity_type: &str) -> Option<&EntityTypeDefinition> {
        self.entity_types.get(entity_type)
    }

    /// Returns the bundles of an entity type.
    pub fn bundles(&self, entity_type: &str) -> Vec<String> {
        self.entity_types
            .get(entity_type)
            .map(EntityTypeDefinition::bundle_names)
            .unwrap_or_default()
    }

    /// Returns true if the bundle exists on the entity type.
    pub fn has_bundle(&self, entity_type: &str, bundle: &str) -> bool {
        self.fields
            .contains_key(&(entity_type.to_string(), bundle.to_string()))
    }

    /// Returns the field definitions of an (entity type, bundle) pair in
    /// declaration order, entity keys first.
    pub fn field_definitions(&self, entity_type: &str, bundle: &str) -> &[FieldDefinition] {
        self.fields
            .get(&(entity_type.to_string(), bundle.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns one field definition.
    pub fn field_definition(
        &self,
        entity_type: &str,
        bundle: &str,
        field_name: &str,
    ) -> Option<&FieldDefinition> {
        self.field_definitions(entity_type, bundle)
            .iter()
            .find(|f| f.name == field_name)
    }

    /// Returns the definition of a field on any bundle of the entity type.
    ///
    /// Used to follow references whose target bundle is not known up front.
    pub fn any_field_definition(&self, entity_type: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.bundles(entity_type)
            .iter()
            .find_map(|bundle| self.field_definition(entity_type, bundle, field_name))
    }
}
