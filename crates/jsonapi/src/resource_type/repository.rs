//! Resource type catalog construction and memoization.

use std::collections::BTreeMap;
use std::sync::Arc;

use helios_entity::Entity;
use helios_entity::schema::{EntityTypeDefinition, FieldDefinition, Schema};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{FieldKind, ResourceType, ResourceTypeError, ResourceTypeField};

/// Per-field overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverride {
    /// Public name replacing the default alias.
    #[serde(default)]
    pub public_name: Option<String>,

    /// Hides the field.
    #[serde(default)]
    pub disabled: bool,
}

/// Per-resource-type overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeOverride {
    /// Excludes the type from routing and inclusion.
    #[serde(default)]
    pub internal: bool,

    /// Same as `internal`; kept separate so configuration reads naturally.
    #[serde(default)]
    pub disabled: bool,

    /// Collections of this type report a total count.
    #[serde(default)]
    pub include_count: bool,

    /// Field overrides keyed by internal field name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldOverride>,
}

/// Overrides keyed by resource type name (`entity_type--bundle`).
pub type ResourceTypeOverrides = BTreeMap<String, ResourceTypeOverride>;

/// The complete, immutable set of resource types for one schema snapshot.
#[derive(Debug)]
pub struct ResourceTypeCatalog {
    types: Vec<Arc<ResourceType>>,
    by_key: BTreeMap<(String, String), usize>,
    by_name: BTreeMap<String, usize>,
}

impl ResourceTypeCatalog {
    /// Builds every resource type of the schema, then computes the
    /// relationship graph.
    pub fn build(
        schema: &Schema,
        overrides: &ResourceTypeOverrides,
    ) -> Result<Self, ResourceTypeError> {
        let no_override = ResourceTypeOverride::default();
        let mut types = Vec::new();
        let mut by_key = BTreeMap::new();
        let mut by_name = BTreeMap::new();

        for definition in schema.entity_types() {
            for bundle in definition.bundle_names() {
                let type_name = format!("{}--{}", definition.id, bundle);
                let type_override = overrides.get(&type_name).unwrap_or(&no_override);
                let fields = schema
                    .field_definitions(&definition.id, &bundle)
                    .iter()
                    .map(|field| Self::resource_type_field(definition, field, type_override))
                    .collect();

                let resource_type = ResourceType::new(&definition.id, &bundle, fields)
                    .with_internal(
                        definition.internal || type_override.internal || type_override.disabled,
                    )
                    .with_locatable(definition.is_locatable())
                    .with_fieldable(definition.fieldable)
                    .with_include_count(type_override.include_count);

                by_key.insert((definition.id.clone(), bundle), types.len());
                by_name.insert(type_name, types.len());
                types.push(Arc::new(resource_type));
            }
        }

        for resource_type in &types {
            let mut relatable = BTreeMap::new();
            for field in schema.field_definitions(resource_type.entity_type_id(), resource_type.bundle()) {
                let Some(settings) = field.settings.as_ref().filter(|_| field.is_reference()) else {
                    continue;
                };
                let bundles = settings
                    .target_bundles
                    .clone()
                    .unwrap_or_else(|| schema.bundles(&settings.target_type));
                let targets = bundles
                    .iter()
                    .filter_map(|bundle| by_key.get(&(settings.target_type.clone(), bundle.clone())))
                    .map(|&index| Arc::downgrade(&types[index]))
                    .collect();
                relatable.insert(field.name.clone(), targets);
            }
            resource_type.set_relatable_types(relatable)?;
        }

        debug!(count = types.len(), "Built resource type catalog");
        Ok(Self {
            types,
            by_key,
            by_name,
        })
    }

    fn resource_type_field(
        definition: &EntityTypeDefinition,
        field: &FieldDefinition,
        type_override: &ResourceTypeOverride,
    ) -> ResourceTypeField {
        let kind = if field.is_reference() {
            FieldKind::Relationship
        } else {
            FieldKind::Attribute
        };
        let field_override = type_override.fields.get(&field.name);

        // `id` and `type` are reserved members of resource objects.
        let public_name = match field_override.and_then(|o| o.public_name.clone()) {
            Some(name) => name,
            None if field.name == "id" || field.name == "type" => {
                format!("{}_{}", definition.id, field.name)
            }
            None => field.name.clone(),
        };

        let is_key = field.name == definition.keys.uuid
            || definition.keys.bundle.as_deref() == Some(field.name.as_str());
        let disabled = is_key || field.internal || field_override.is_some_and(|o| o.disabled);

        let resource_field = ResourceTypeField::new(&field.name, kind, field.cardinality.is_single())
            .with_public_name(public_name);
        if disabled {
            resource_field.disabled()
        } else {
            resource_field
        }
    }

    /// Returns all resource types.
    pub fn all(&self) -> &[Arc<ResourceType>] {
        &self.types
    }

    /// Returns the resource type of an (entity type, bundle) pair.
    pub fn get(&self, entity_type_id: &str, bundle: &str) -> Option<Arc<ResourceType>> {
        self.by_key
            .get(&(entity_type_id.to_string(), bundle.to_string()))
            .map(|&index| Arc::clone(&self.types[index]))
    }

    /// Returns the resource type with the given public type name.
    pub fn get_by_type_name(&self, type_name: &str) -> Option<Arc<ResourceType>> {
        self.by_name
            .get(type_name)
            .map(|&index| Arc::clone(&self.types[index]))
    }

    /// Returns the resource type of an entity.
    pub fn get_for_entity(&self, entity: &Entity) -> Option<Arc<ResourceType>> {
        self.get(entity.entity_type(), entity.bundle())
    }
}

/// Memoizes the resource type catalog per schema snapshot.
///
/// The catalog is a pure function of the schema snapshot and the overrides.
/// A request carrying a different snapshot than the memoized one rebuilds
/// the catalog. Concurrent builds for the same snapshot are harmless; the
/// first one published is kept and the others are dropped.
#[derive(Debug, Default)]
pub struct ResourceTypeRepository {
    overrides: ResourceTypeOverrides,
    catalog: RwLock<Option<MemoizedCatalog>>,
}

#[derive(Debug)]
struct MemoizedCatalog {
    schema: Arc<Schema>,
    catalog: Arc<ResourceTypeCatalog>,
}

impl ResourceTypeRepository {
    /// Creates a repository applying the given overrides.
    pub fn new(overrides: ResourceTypeOverrides) -> Self {
        Self {
            overrides,
            catalog: RwLock::new(None),
        }
    }

    /// Returns the overrides.
    pub fn overrides(&self) -> &ResourceTypeOverrides {
        &self.overrides
    }

    /// Returns the catalog of `schema`, building it when the memoized one
    /// belongs to another snapshot.
    pub fn catalog(
        &self,
        schema: &Arc<Schema>,
    ) -> Result<Arc<ResourceTypeCatalog>, ResourceTypeError> {
        if let Some(memo) = self.catalog.read().as_ref()
            && Arc::ptr_eq(&memo.schema, schema)
        {
            return Ok(Arc::clone(&memo.catalog));
        }

        let built = Arc::new(ResourceTypeCatalog::build(schema, &self.overrides)?);
        let mut slot = self.catalog.write();
        if let Some(memo) = slot.as_ref()
            && Arc::ptr_eq(&memo.schema, schema)
        {
            return Ok(Arc::clone(&memo.catalog));
        }
        info!(resource_types = built.all().len(), "Published resource type catalog");
        *slot = Some(MemoizedCatalog {
            schema: Arc::clone(schema),
            catalog: Arc::clone(&built),
        });
        Ok(built)
    }

    /// Drops the memoized catalog; the next request rebuilds it.
    pub fn clear(&self) {
        *self.catalog.write() = None;
    }

    /// Returns all resource types.
    pub fn all(&self, schema: &Arc<Schema>) -> Result<Vec<Arc<ResourceType>>, ResourceTypeError> {
        Ok(self.catalog(schema)?.all().to_vec())
    }

    /// Returns the resource type of an (entity type, bundle) pair.
    pub fn get(
        &self,
        schema: &Arc<Schema>,
        entity_type_id: &str,
        bundle: &str,
    ) -> Result<Option<Arc<ResourceType>>, ResourceTypeError> {
        Ok(self.catalog(schema)?.get(entity_type_id, bundle))
    }

    /// Returns the resource type with the given public type name.
    pub fn get_by_type_name(
        &self,
        schema: &Arc<Schema>,
        type_name: &str,
    ) -> Result<Option<Arc<ResourceType>>, ResourceTypeError> {
        Ok(self.catalog(schema)?.get_by_type_name(type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{"entity_types": [
                {"id": "node", "keys": {"bundle": "type"}, "bundles": {
                    "article": {"fields": [
                        {"name": "title", "type": "string"},
                        {"name": "id", "type": "integer"},
                        {"name": "uid", "type": "entity_reference", "settings": {"target_type": "user"}},
                        {"name": "related", "type": "entity_reference", "cardinality": -1,
                         "settings": {"target_type": "node", "target_bundles": ["page"]}},
                        {"name": "any_node", "type": "entity_reference", "cardinality": -1,
                         "settings": {"target_type": "node"}}
                    ]},
                    "page": {"fields": [{"name": "title", "type": "string"}]}
                }},
                {"id": "user", "base_fields": [{"name": "name", "type": "string"}]},
                {"id": "config", "internal": true, "storage": "null", "fieldable": false}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_one_type_per_bundle() {
        let catalog = ResourceTypeCatalog::build(&schema(), &ResourceTypeOverrides::new()).unwrap();
        let mut names: Vec<_> = catalog.all().iter().map(|t| t.type_name().to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["config--config", "node--article", "node--page", "user--user"]
        );
        assert!(catalog.get("node", "article").is_some());
        assert!(catalog.get("node", "blog").is_none());
        assert!(catalog.get_by_type_name("user--user").is_some());
    }

    #[test]
    fn test_flags() {
        let catalog = ResourceTypeCatalog::build(&schema(), &ResourceTypeOverrides::new()).unwrap();
        let config = catalog.get("config", "config").unwrap();
        assert!(config.is_internal());
        assert!(!config.is_locatable());
        assert!(!config.is_fieldable());
        assert!(catalog.get("user", "user").unwrap().is_locatable());
    }

    #[test]
    fn test_keys_disabled_and_reserved_names_aliased() {
        let catalog = ResourceTypeCatalog::build(&schema(), &ResourceTypeOverrides::new()).unwrap();
        let article = catalog.get("node", "article").unwrap();
        assert!(!article.is_field_enabled("uuid"));
        assert!(!article.is_field_enabled("type"));
        assert_eq!(article.public_name("id"), "node_id");
        assert_eq!(article.internal_name("node_id"), "id");
    }

    #[test]
    fn test_relatable_types_respect_target_bundles() {
        let catalog = ResourceTypeCatalog::build(&schema(), &ResourceTypeOverrides::new()).unwrap();
        let article = catalog.get("node", "article").unwrap();

        let related: Vec<_> = article
            .relatable_types_by_field("related")
            .unwrap()
            .iter()
            .map(|t| t.type_name().to_string())
            .collect();
        assert_eq!(related, vec!["node--page"]);

        let any: Vec<_> = article
            .relatable_types_by_field("any_node")
            .unwrap()
            .iter()
            .map(|t| t.type_name().to_string())
            .collect();
        assert_eq!(any, vec!["node--article", "node--page"]);

        let uid = article.relatable_types_by_field("uid").unwrap();
        assert_eq!(uid[0].type_name(), "user--user");
    }

    #[test]
    fn test_overrides() {
        let mut overrides = ResourceTypeOverrides::new();
        let mut fields = BTreeMap::new();
        fields.insert(
            "uid".to_string(),
            FieldOverride {
                public_name: Some("author".to_string()),
                disabled: false,
            },
        );
        fields.insert(
            "any_node".to_string(),
            FieldOverride {
                public_name: None,
                disabled: true,
            },
        );
        overrides.insert(
            "node--article".to_string(),
            ResourceTypeOverride {
                include_count: true,
                fields,
                ..Default::default()
            },
        );
        overrides.insert(
            "node--page".to_string(),
            ResourceTypeOverride {
                disabled: true,
                ..Default::default()
            },
        );

        let catalog = ResourceTypeCatalog::build(&schema(), &overrides).unwrap();
        let article = catalog.get("node", "article").unwrap();
        assert!(article.include_count());
        assert_eq!(article.internal_name("author"), "uid");
        assert!(!article.is_field_enabled("any_node"));
        assert!(catalog.get("node", "page").unwrap().is_internal());
    }

    #[test]
    fn test_repository_memoizes_and_clears() {
        let repository = ResourceTypeRepository::default();
        let schema = Arc::new(schema());
        let first = repository.catalog(&schema).unwrap();
        let second = repository.catalog(&schema).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        repository.clear();
        let third = repository.catalog(&schema).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(
            repository.get(&schema, "node", "page").unwrap().unwrap().type_name(),
            "node--page"
        );
        assert_eq!(repository.all(&schema).unwrap().len(), 4);
    }

    #[test]
    fn test_repository_rebuilds_for_new_schema_snapshot() {
        let repository = ResourceTypeRepository::default();
        let original = Arc::new(schema());
        let first = repository.catalog(&original).unwrap();
        assert!(repository.get(&original, "node", "article").unwrap().is_some());

        let replaced = Arc::new(
            Schema::from_json(
                r#"{"entity_types": [
                    {"id": "taxonomy_term", "keys": {"bundle": "vid"}, "bundles": {
                        "topics": {"fields": [{"name": "name", "type": "string"}]}
                    }}
                ]}"#,
            )
            .unwrap(),
        );
        let second = repository.catalog(&replaced).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.get("taxonomy_term", "topics").is_some());
        assert!(second.get("node", "article").is_none());

        let again = repository.catalog(&replaced).unwrap();
        assert!(Arc::ptr_eq(&second, &again));
    }
}
