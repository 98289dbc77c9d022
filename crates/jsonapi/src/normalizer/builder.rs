//! Builds normalization trees from entities.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use helios_entity::Entity;
use helios_entity::access::{
    AccessPolicy, Account, EntityOperation, FieldOperation, PERMISSIONS_CACHE_CONTEXT,
};
use helios_entity::cache::CacheableMetadata;
use helios_entity::schema::{FieldDefinition, Schema};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::entity::{EntityNormalizerValue, FieldValue};
use super::exception::HttpExceptionNormalizerValue;
use super::field::{FieldNormalizerValue, NullFieldNormalizerValue};
use super::relationship::{
    IncludeOnlyRelationshipValue, MISSING_ID, RelationshipNormalizerValue, ResourceIdentifier,
};
use super::ResourceObjectValue;
use crate::error::{JsonApiError, JsonApiResult};
use crate::include_resolver::{IncludeTree, ReferenceIndex};
use crate::link_manager::LinkManager;
use crate::query::CollectionItem;
use crate::resource_type::{ResourceType, ResourceTypeCatalog, ResourceTypeField};

/// Requested public field names, keyed by resource type name.
pub type SparseFieldsets = BTreeMap<String, Vec<String>>;

const GET_DENIED: &str = "The current user is not allowed to GET the selected resource.";

/// Normalizes entities for one request.
///
/// Referenced entities are read from a prefetched [`ReferenceIndex`];
/// nothing is loaded while normalizing.
pub struct Normalizer<'a> {
    schema: &'a Schema,
    catalog: &'a ResourceTypeCatalog,
    policy: &'a dyn AccessPolicy,
    account: &'a Account,
    links: &'a LinkManager,
    fieldsets: &'a SparseFieldsets,
    references: &'a ReferenceIndex,
}

impl<'a> Normalizer<'a> {
    /// Creates a normalizer.
    pub fn new(
        schema: &'a Schema,
        catalog: &'a ResourceTypeCatalog,
        policy: &'a dyn AccessPolicy,
        account: &'a Account,
        links: &'a LinkManager,
        fieldsets: &'a SparseFieldsets,
        references: &'a ReferenceIndex,
    ) -> Self {
        Self {
            schema,
            catalog,
            policy,
            account,
            links,
            fieldsets,
            references,
        }
    }

    /// Normalizes one entity, following `includes` below it.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the entity has no resource type.
    pub fn normalize_entity(
        &self,
        entity: &Entity,
        includes: &IncludeTree,
    ) -> JsonApiResult<EntityNormalizerValue> {
        let resource_type = self.resource_type_of(entity)?;
        let fieldset = self.fieldsets.get(resource_type.type_name());

        let mut fields = Vec::new();
        for field in resource_type.fields().iter().filter(|f| f.is_enabled()) {
            let in_fieldset = fieldset.is_none_or(|names| names.iter().any(|n| n == field.public_name()));
            let subtree = includes.child(field.internal_name());
            if !in_fieldset && subtree.is_none() {
                continue;
            }
            let Some(definition) = self.schema.field_definition(
                entity.entity_type(),
                entity.bundle(),
                field.internal_name(),
            ) else {
                continue;
            };

            let access = self
                .policy
                .field_access(FieldOperation::View, definition, self.account, Some(entity));
            let value = if !access.is_allowed() {
                FieldValue::Null(NullFieldNormalizerValue::new(access.cacheability()))
            } else if field.is_relationship() {
                let included = match subtree {
                    Some(subtree) => self.included_targets(entity, definition, subtree)?,
                    None => Vec::new(),
                };
                if in_fieldset {
                    FieldValue::Relationship(self.relationship_value(
                        entity,
                        &resource_type,
                        field,
                        definition,
                        included,
                        access.cacheability(),
                    )?)
                } else {
                    FieldValue::IncludeOnly(IncludeOnlyRelationshipValue::new(
                        included,
                        access.cacheability(),
                    ))
                }
            } else {
                FieldValue::Attribute(FieldNormalizerValue::from_items(
                    entity.get(field.internal_name()),
                    definition,
                    access.cacheability(),
                ))
            };
            fields.push((field.public_name().to_string(), value));
        }

        let mut links = Map::new();
        if let Some(href) = self.links.entity_link(&resource_type, entity.uuid()) {
            links.insert("self".to_string(), json!({ "href": href }));
        }

        Ok(EntityNormalizerValue::new(
            resource_type.type_name(),
            entity.uuid(),
            fields,
            links,
            &entity.cacheability(),
        ))
    }

    /// Normalizes the items of a collection. Denied rows become errors.
    ///
    /// # Errors
    ///
    /// Propagates [`Normalizer::normalize_entity`] failures.
    pub fn normalize_collection(
        &self,
        items: &[CollectionItem],
        includes: &IncludeTree,
    ) -> JsonApiResult<Vec<ResourceObjectValue>> {
        items
            .iter()
            .map(|item| match item {
                CollectionItem::Entity(entity) => Ok(ResourceObjectValue::Entity(Arc::new(
                    self.normalize_entity(entity, includes)?,
                ))),
                CollectionItem::Denied(error) => Ok(ResourceObjectValue::Exception(Arc::new(
                    HttpExceptionNormalizerValue::new(
                        error.clone(),
                        CacheableMetadata::new().with_contexts([PERMISSIONS_CACHE_CONTEXT]),
                    ),
                ))),
            })
            .collect()
    }

    /// Normalizes one relationship of an entity, with its includes.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the field is unknown to the schema.
    pub fn normalize_relationship(
        &self,
        entity: &Entity,
        field: &ResourceTypeField,
        includes: &IncludeTree,
    ) -> JsonApiResult<RelationshipNormalizerValue> {
        let resource_type = self.resource_type_of(entity)?;
        let definition = self
            .schema
            .field_definition(entity.entity_type(), entity.bundle(), field.internal_name())
            .ok_or_else(|| {
                JsonApiError::internal(format!(
                    "The field {} does not exist on {}.",
                    field.internal_name(),
                    resource_type.type_name()
                ))
            })?;
        let access = self
            .policy
            .field_access(FieldOperation::View, definition, self.account, Some(entity));
        let included = self.included_targets(entity, definition, includes)?;
        self.relationship_value(
            entity,
            &resource_type,
            field,
            definition,
            included,
            access.cacheability(),
        )
    }

    fn resource_type_of(&self, entity: &Entity) -> JsonApiResult<Arc<ResourceType>> {
        self.catalog.get_for_entity(entity).ok_or_else(|| {
            JsonApiError::internal(format!(
                "No resource type exists for {}--{}.",
                entity.entity_type(),
                entity.bundle()
            ))
        })
    }

    fn relationship_value(
        &self,
        entity: &Entity,
        resource_type: &ResourceType,
        field: &ResourceTypeField,
        definition: &FieldDefinition,
        included: Vec<ResourceObjectValue>,
        access: &CacheableMetadata,
    ) -> JsonApiResult<RelationshipNormalizerValue> {
        let target_type = definition.target_type().unwrap_or_default();
        let fallback = resource_type
            .relatable_types_by_field(field.internal_name())?
            .first()
            .map(|t| t.type_name().to_string());

        let mut identifiers = Vec::new();
        let mut cacheability = access.clone();
        for item in entity.get(field.internal_name()) {
            let Some(target_id) = item.get("target_id").and_then(Value::as_str) else {
                continue;
            };
            let identifier = match self.references.get(target_type, target_id) {
                Some(target) => match self.catalog.get_for_entity(target) {
                    Some(target_type) => {
                        cacheability.add_dependency(&target.cacheability());
                        ResourceIdentifier::new(target_type.type_name(), target.uuid())
                    }
                    None => continue,
                },
                None => match &fallback {
                    Some(type_name) => ResourceIdentifier::new(type_name.clone(), MISSING_ID),
                    None => continue,
                },
            };
            let meta: Map<String, Value> = definition
                .extra_properties
                .iter()
                .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
                .collect();
            identifiers.push(identifier.with_meta(meta));
        }

        let mut links = Map::new();
        if let Some(href) =
            self.links
                .relationship_link(resource_type, entity.uuid(), field.public_name())
        {
            links.insert("self".to_string(), json!({ "href": href }));
        }
        if let Some(href) = self
            .links
            .related_link(resource_type, entity.uuid(), field.public_name())
        {
            links.insert("related".to_string(), json!({ "href": href }));
        }

        Ok(RelationshipNormalizerValue::new(
            identifiers,
            field.has_one(),
            links,
            included,
            &cacheability,
        ))
    }

    fn included_targets(
        &self,
        entity: &Entity,
        definition: &FieldDefinition,
        subtree: &IncludeTree,
    ) -> JsonApiResult<Vec<ResourceObjectValue>> {
        let Some(target_type) = definition.target_type() else {
            return Ok(Vec::new());
        };
        let mut seen = BTreeSet::new();
        let mut included = Vec::new();
        for target_id in entity.target_ids(&definition.name) {
            if !seen.insert(target_id.clone()) {
                continue;
            }
            let Some(target) = self.references.get(target_type, &target_id) else {
                continue;
            };
            let Some(target_resource_type) = self.catalog.get_for_entity(target) else {
                continue;
            };
            if target_resource_type.is_internal() {
                continue;
            }

            let access = self
                .policy
                .entity_access(target, EntityOperation::View, self.account);
            if access.is_allowed() {
                let value = self.normalize_entity(target, subtree)?;
                included.push(ResourceObjectValue::Entity(Arc::new(value)));
            } else {
                debug!(
                    resource_type = target_resource_type.type_name(),
                    id = target.uuid(),
                    "Included resource is not viewable"
                );
                let error = JsonApiError::entity_access_denied(
                    target,
                    target_resource_type.type_name(),
                    &access,
                    "/data",
                    GET_DENIED,
                );
                included.push(ResourceObjectValue::Exception(Arc::new(
                    HttpExceptionNormalizerValue::new(error, access.cacheability().clone()),
                )));
            }
        }
        Ok(included)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizerValue;
    use crate::resource_type::ResourceTypeOverrides;
    use helios_entity::access::PermissionAccessPolicy;
    use helios_entity::cache::Cacheable;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{"entity_types": [
                {"id": "node", "keys": {"bundle": "type"}, "bundles": {
                    "article": {"fields": [
                        {"name": "title", "type": "string"},
                        {"name": "secret", "type": "string", "view_permission": "view secrets"},
                        {"name": "uid", "type": "entity_reference", "settings": {"target_type": "user"}},
                        {"name": "tags", "type": "entity_reference", "cardinality": -1,
                         "extra_properties": ["weight"],
                         "settings": {"target_type": "tag"}}
                    ]}
                }},
                {"id": "user", "base_fields": [{"name": "name", "type": "string"}]},
                {"id": "tag", "internal": true, "base_fields": [{"name": "name", "type": "string"}]}
            ]}"#,
        )
        .unwrap()
    }

    struct Fixture {
        schema: Schema,
        catalog: ResourceTypeCatalog,
        policy: PermissionAccessPolicy,
        links: LinkManager,
        references: ReferenceIndex,
        article: Entity,
    }

    fn fixture() -> Fixture {
        let schema = schema();
        let mut overrides = ResourceTypeOverrides::new();
        overrides.insert(
            "node--article".to_string(),
            serde_json::from_value(json!({"fields": {"uid": {"public_name": "author"}}})).unwrap(),
        );
        let catalog = ResourceTypeCatalog::build(&schema, &overrides).unwrap();

        let mut references = ReferenceIndex::new();
        references.insert(Entity::new("user", "user", "u1").with_value("name", json!("Ada")));
        references.insert(Entity::new("tag", "tag", "t1").with_value("name", json!("rust")));

        let mut tag_item = helios_entity::entity::reference_item("t1".to_string());
        tag_item.insert("weight".to_string(), json!(5));
        let mut article = Entity::new("node", "article", "a1")
            .with_value("title", json!("Hello"))
            .with_value("secret", json!("hidden"))
            .with_references("uid", ["u1"]);
        article.set(
            "tags",
            vec![tag_item, helios_entity::entity::reference_item("t9".to_string())],
        );

        Fixture {
            schema,
            catalog,
            policy: PermissionAccessPolicy::new(),
            links: LinkManager::new("http://localhost", "/jsonapi"),
            references,
            article,
        }
    }

    fn render(fx: &Fixture, account: &Account, fieldsets: &SparseFieldsets, tree: &IncludeTree) -> Value {
        let normalizer = Normalizer::new(
            &fx.schema,
            &fx.catalog,
            &fx.policy,
            account,
            &fx.links,
            fieldsets,
            &fx.references,
        );
        normalizer.normalize_entity(&fx.article, tree).unwrap().rasterize()
    }

    fn viewer() -> Account {
        Account::new("1", ["view node", "view user"])
    }

    #[test]
    fn test_entity_rendering() {
        let fx = fixture();
        let value = render(&fx, &viewer(), &SparseFieldsets::new(), &IncludeTree::new());
        assert_eq!(value["type"], "node--article");
        assert_eq!(value["id"], "a1");
        assert_eq!(value["attributes"]["title"], "Hello");
        assert!(value["attributes"].get("secret").is_none());
        assert!(value["attributes"].get("type").is_none());
        assert_eq!(
            value["relationships"]["author"]["data"],
            json!({"type": "user--user", "id": "u1"})
        );
        assert_eq!(
            value["relationships"]["author"]["links"]["related"]["href"],
            "http://localhost/jsonapi/node/article/a1/author"
        );
        assert_eq!(
            value["links"]["self"]["href"],
            "http://localhost/jsonapi/node/article/a1"
        );
    }

    #[test]
    fn test_missing_target_and_identifier_meta() {
        let fx = fixture();
        let value = render(&fx, &viewer(), &SparseFieldsets::new(), &IncludeTree::new());
        assert_eq!(
            value["relationships"]["tags"]["data"],
            json!([
                {"type": "tag--tag", "id": "t1", "meta": {"weight": 5}},
                {"type": "tag--tag", "id": "missing"}
            ])
        );
    }

    #[test]
    fn test_sparse_fieldset() {
        let fx = fixture();
        let mut fieldsets = SparseFieldsets::new();
        fieldsets.insert("node--article".to_string(), vec!["title".to_string()]);
        let value = render(&fx, &viewer(), &fieldsets, &IncludeTree::new());
        assert_eq!(value["attributes"], json!({"title": "Hello"}));
        assert!(value.get("relationships").is_none());
    }

    #[test]
    fn test_include_outside_fieldset_is_include_only() {
        let fx = fixture();
        let mut fieldsets = SparseFieldsets::new();
        fieldsets.insert("node--article".to_string(), vec!["title".to_string()]);
        let mut tree = IncludeTree::new();
        tree.insert_path(&["uid".to_string()]);
        let account = viewer();
        let normalizer = Normalizer::new(
            &fx.schema,
            &fx.catalog,
            &fx.policy,
            &account,
            &fx.links,
            &fieldsets,
            &fx.references,
        );
        let value = normalizer.normalize_entity(&fx.article, &tree).unwrap();
        assert!(value.rasterize().get("relationships").is_none());
        let includes = value.rasterize_includes();
        assert_eq!(includes.len(), 1);
        assert_eq!(includes[0].identity(), Some(("user--user", "u1")));
    }

    #[test]
    fn test_denied_include_becomes_exception() {
        let fx = fixture();
        let account = Account::new("2", ["view node"]);
        let mut tree = IncludeTree::new();
        tree.insert_path(&["uid".to_string()]);
        let fieldsets = SparseFieldsets::new();
        let normalizer = Normalizer::new(
            &fx.schema,
            &fx.catalog,
            &fx.policy,
            &account,
            &fx.links,
            &fieldsets,
            &fx.references,
        );
        let value = normalizer.normalize_entity(&fx.article, &tree).unwrap();
        let includes = value.rasterize_includes();
        assert!(matches!(includes[0], ResourceObjectValue::Exception(_)));
        assert!(value.cacheability().contexts().contains(PERMISSIONS_CACHE_CONTEXT));
    }

    #[test]
    fn test_internal_targets_are_not_included() {
        let fx = fixture();
        let mut tree = IncludeTree::new();
        tree.insert_path(&["tags".to_string()]);
        let account = viewer();
        let fieldsets = SparseFieldsets::new();
        let normalizer = Normalizer::new(
            &fx.schema,
            &fx.catalog,
            &fx.policy,
            &account,
            &fx.links,
            &fieldsets,
            &fx.references,
        );
        let value = normalizer.normalize_entity(&fx.article, &tree).unwrap();
        assert!(value.rasterize_includes().is_empty());
    }

    #[test]
    fn test_field_access_controls_secret() {
        let fx = fixture();
        let account = Account::new("3", ["view node", "view secrets"]);
        let value = render(&fx, &account, &SparseFieldsets::new(), &IncludeTree::new());
        assert_eq!(value["attributes"]["secret"], "hidden");
    }
}
