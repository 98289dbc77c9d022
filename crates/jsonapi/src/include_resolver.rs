//! Include parameter processing.
//!
//! `?include=author,tags.owner` is resolved against the primary resource
//! types into an [`IncludeTree`] keyed by internal field names. Before
//! normalization, every entity the document may reference is prefetched
//! into a [`ReferenceIndex`], one level of the tree at a time, so each
//! level costs one `load_multiple` per target entity type.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use helios_entity::Entity;
use helios_entity::core::EntityStorage;
use helios_entity::schema::Schema;
use tracing::debug;

use crate::error::{JsonApiError, JsonApiResult};
use crate::field_resolver::FieldResolver;
use crate::resource_type::ResourceType;

/// Include paths as a tree of internal field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the given include paths.
    ///
    /// Each path is resolved against every candidate resource type; a path
    /// only fails if it resolves against none of them, in which case the
    /// error of the first candidate is returned.
    ///
    /// # Errors
    ///
    /// Returns a bad request for paths that cannot be resolved.
    pub fn resolve(
        paths: &[String],
        resource_types: &[Arc<ResourceType>],
        resolver: &FieldResolver<'_>,
    ) -> JsonApiResult<Self> {
        let mut tree = Self::new();
        for path in paths {
            let parts: Vec<&str> = path.split('.').collect();
            let mut first_error: Option<JsonApiError> = None;
            let mut resolved_any = false;
            for resource_type in resource_types {
                match resolver.resolve_include_path(resource_type, &parts) {
                    Ok(alternatives) => {
                        resolved_any = true;
                        for alternative in alternatives {
                            tree.insert_path(&alternative);
                        }
                    }
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }
            if !resolved_any {
                return Err(first_error
                    .unwrap_or_else(|| JsonApiError::bad_request(format!("`{}` is not a valid include path.", path))));
            }
        }
        debug!(?tree, "Resolved include tree");
        Ok(tree)
    }

    /// Adds one path of internal field names.
    pub fn insert_path(&mut self, path: &[String]) {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.clone()).or_default();
        }
    }

    /// Returns the subtree below an internal field name.
    pub fn child(&self, field: &str) -> Option<&IncludeTree> {
        self.children.get(field)
    }

    /// Returns the internal field names of the first level.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Returns true if nothing is included.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Entities reachable from a document, keyed by `(entity_type, uuid)`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entities: HashMap<(String, String), Entity>,
}

impl ReferenceIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the targets of every reference field of `roots`, then follows
    /// the include tree, loading the targets of each included entity.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn load<S: EntityStorage + ?Sized>(
        storage: &S,
        schema: &Schema,
        roots: &[&Entity],
        tree: &IncludeTree,
    ) -> JsonApiResult<Self> {
        let mut index = Self::new();
        let mut frontier: Vec<(Entity, IncludeTree)> = roots
            .iter()
            .map(|entity| ((*entity).clone(), tree.clone()))
            .collect();
        let mut level = 0usize;

        while !frontier.is_empty() {
            let mut pending: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for (entity, _) in &frontier {
                for definition in schema.field_definitions(entity.entity_type(), entity.bundle()) {
                    let Some(target_type) = definition.target_type() else {
                        continue;
                    };
                    for target in entity.target_ids(&definition.name) {
                        if !index.contains(target_type, &target) {
                            pending
                                .entry(target_type.to_string())
                                .or_default()
                                .insert(target);
                        }
                    }
                }
            }

            for (target_type, uuids) in pending {
                let uuids: Vec<String> = uuids.into_iter().collect();
                for loaded in storage.load_multiple(&target_type, &uuids).await? {
                    index.insert(loaded);
                }
            }

            let mut next = Vec::new();
            for (entity, subtree) in &frontier {
                for (field, child) in &subtree.children {
                    let Some(definition) =
                        schema.field_definition(entity.entity_type(), entity.bundle(), field)
                    else {
                        continue;
                    };
                    let Some(target_type) = definition.target_type() else {
                        continue;
                    };
                    for target in entity.target_ids(field) {
                        if let Some(loaded) = index.get(target_type, &target) {
                            next.push((loaded.clone(), child.clone()));
                        }
                    }
                }
            }
            level += 1;
            debug!(level, loaded = index.len(), "Prefetched referenced entities");
            frontier = next;
        }

        Ok(index)
    }

    /// Adds an entity.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(
            (entity.entity_type().to_string(), entity.uuid().to_string()),
            entity,
        );
    }

    /// Returns a loaded entity.
    pub fn get(&self, entity_type: &str, uuid: &str) -> Option<&Entity> {
        self.entities
            .get(&(entity_type.to_string(), uuid.to_string()))
    }

    /// Returns true if the entity is loaded.
    pub fn contains(&self, entity_type: &str, uuid: &str) -> bool {
        self.get(entity_type, uuid).is_some()
    }

    /// Returns the number of loaded entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_type::{ResourceTypeCatalog, ResourceTypeOverrides};
    use helios_entity::access::{Account, PermissionAccessPolicy};
    use helios_entity::backends::memory::MemoryBackend;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{"entity_types": [
                {"id": "node", "keys": {"bundle": "type"}, "bundles": {
                    "article": {"fields": [
                        {"name": "title", "type": "string"},
                        {"name": "uid", "type": "entity_reference", "settings": {"target_type": "user"}},
                        {"name": "related", "type": "entity_reference", "cardinality": -1,
                         "settings": {"target_type": "node"}}
                    ]}
                }},
                {"id": "user", "base_fields": [
                    {"name": "name", "type": "string"},
                    {"name": "manager", "type": "entity_reference", "settings": {"target_type": "user"}}
                ]}
            ]}"#,
        )
        .unwrap()
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tree_merges_paths() {
        let mut tree = IncludeTree::new();
        tree.insert_path(&path(&["uid"]));
        tree.insert_path(&path(&["related", "uid"]));
        tree.insert_path(&path(&["related", "related"]));
        assert_eq!(tree.fields().collect::<Vec<_>>(), vec!["related", "uid"]);
        let related = tree.child("related").unwrap();
        assert_eq!(related.fields().collect::<Vec<_>>(), vec!["related", "uid"]);
        assert!(tree.child("uid").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_reports_invalid_path() {
        let schema = schema();
        let catalog = ResourceTypeCatalog::build(&schema, &ResourceTypeOverrides::new()).unwrap();
        let rt = catalog.get("node", "article").unwrap();
        let policy = PermissionAccessPolicy::new();
        let account = Account::anonymous(Vec::<String>::new());
        let resolver = FieldResolver::new(&schema, &policy, &account);

        let tree = IncludeTree::resolve(&path(&["uid.manager", "related"]), &[rt.clone()], &resolver)
            .unwrap();
        assert!(tree.child("uid").unwrap().child("manager").is_some());

        let err = IncludeTree::resolve(&path(&["title"]), &[rt], &resolver).unwrap_err();
        assert!(err.detail().starts_with("`title` is not a valid relationship field name."));
    }

    #[tokio::test]
    async fn test_reference_index_follows_tree() {
        let backend = MemoryBackend::new(schema());
        backend
            .seed([
                Entity::new("user", "user", "boss").with_value("name", "Boss".into()),
                Entity::new("user", "user", "u1")
                    .with_value("name", "Ada".into())
                    .with_references("manager", ["boss"]),
                Entity::new("node", "article", "a2").with_references("uid", ["u1"]),
                Entity::new("node", "article", "a1")
                    .with_references("uid", ["u1"])
                    .with_references("related", ["a2", "gone"]),
            ])
            .unwrap();
        let schema = backend.schema();
        let root = backend.load("node", "a1").await.unwrap().unwrap();

        // Without includes only direct references are loaded.
        let index = ReferenceIndex::load(&backend, &schema, &[&root], &IncludeTree::new())
            .await
            .unwrap();
        assert!(index.contains("user", "u1"));
        assert!(index.contains("node", "a2"));
        assert!(!index.contains("node", "gone"));
        assert!(!index.contains("user", "boss"));

        let mut tree = IncludeTree::new();
        tree.insert_path(&path(&["uid"]));
        let index = ReferenceIndex::load(&backend, &schema, &[&root], &tree)
            .await
            .unwrap();
        assert!(index.contains("user", "boss"));
    }
}
