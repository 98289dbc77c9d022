//! Public field path resolution.
//!
//! Translates the dotted, aliasable field paths clients use in `include`,
//! `filter` and `sort` into internal paths:
//!
//! - [`FieldResolver::resolve_include_path`] returns every internal field
//!   sequence an include path can denote. The same public path can be valid
//!   in several ways when relatable types alias fields differently.
//! - [`FieldResolver::resolve_entity_query_path`] returns the single
//!   storage path a filter or sort path denotes, inserting reference
//!   traversal properties where the client left them implicit
//!   (`author.name` becomes `uid.entity.name`).

use std::collections::VecDeque;
use std::sync::Arc;

use helios_entity::access::{Account, AccessPolicy, FieldOperation};
use helios_entity::schema::{FieldDefinition, Schema};
use tracing::debug;

use crate::error::{JsonApiError, JsonApiResult};
use crate::resource_type::{ResourceType, ResourceTypeError};

/// Failure of a nested include resolution step.
#[derive(Debug)]
enum IncludePathError {
    /// The path is invalid; carries the distinct underlying reasons.
    Invalid(Vec<String>),
    /// The catalog is not usable.
    Logic(ResourceTypeError),
}

impl From<ResourceTypeError> for IncludePathError {
    fn from(err: ResourceTypeError) -> Self {
        IncludePathError::Logic(err)
    }
}

/// Resolves public field paths against resource types.
pub struct FieldResolver<'a> {
    schema: &'a Schema,
    policy: &'a dyn AccessPolicy,
    account: &'a Account,
}

impl<'a> FieldResolver<'a> {
    /// Creates a resolver checking field access for `account`.
    pub fn new(schema: &'a Schema, policy: &'a dyn AccessPolicy, account: &'a Account) -> Self {
        Self {
            schema,
            policy,
            account,
        }
    }

    /// Resolves an include path to all of its internal interpretations.
    ///
    /// # Errors
    ///
    /// Returns a bad request when the path is empty, names a field that is
    /// not a relationship, or cannot be resolved through any relatable type.
    pub fn resolve_include_path(
        &self,
        resource_type: &ResourceType,
        path: &[&str],
    ) -> JsonApiResult<Vec<Vec<String>>> {
        match Self::resolve_include_segments(resource_type, path, 0) {
            Ok(resolved) => Ok(resolved),
            Err(IncludePathError::Invalid(reasons)) => {
                Err(JsonApiError::bad_request(reasons.join(" ")))
            }
            Err(IncludePathError::Logic(err)) => Err(err.into()),
        }
    }

    fn resolve_include_segments(
        resource_type: &ResourceType,
        path: &[&str],
        depth: usize,
    ) -> Result<Vec<Vec<String>>, IncludePathError> {
        let Some((public_name, remaining)) = path.split_first().filter(|(first, _)| !first.is_empty())
        else {
            return Err(IncludePathError::Invalid(vec!["Empty include path.".to_string()]));
        };

        let internal_name = resource_type
            .field_by_public_name(public_name)
            .map(|field| field.internal_name().to_string())
            .unwrap_or_default();
        let relatable = resource_type.relatable_types_by_field(&internal_name)?;
        if internal_name.is_empty() || relatable.is_empty() {
            let mut message = format!("`{}` is not a valid relationship field name.", public_name);
            let possible = resource_type.relationship_public_names()?;
            if !possible.is_empty() {
                message.push_str(&format!(" Possible values: {}.", possible.join(", ")));
            }
            return Err(IncludePathError::Invalid(vec![message]));
        }

        if remaining.is_empty() {
            return Ok(vec![vec![internal_name]]);
        }

        let mut resolved = Vec::new();
        let mut reasons: Vec<String> = Vec::new();
        let mut failures = 0;
        for relatable_type in &relatable {
            match Self::resolve_include_segments(relatable_type, remaining, depth + 1) {
                Ok(paths) => resolved.extend(paths.into_iter().map(|path| {
                    let mut full = Vec::with_capacity(path.len() + 1);
                    full.push(internal_name.clone());
                    full.extend(path);
                    full
                })),
                Err(IncludePathError::Invalid(nested)) => {
                    failures += 1;
                    for reason in nested {
                        if !reasons.contains(&reason) {
                            reasons.push(reason);
                        }
                    }
                }
                Err(logic) => return Err(logic),
            }
        }

        if failures == relatable.len() {
            if depth == 0 {
                let message = format!(
                    "`{}.{}` is not a valid include path. {}",
                    public_name,
                    remaining.join("."),
                    reasons.join(" ")
                );
                return Err(IncludePathError::Invalid(vec![message]));
            }
            return Err(IncludePathError::Invalid(reasons));
        }

        Ok(resolved)
    }

    /// Resolves a filter or sort path to a storage query path.
    ///
    /// # Errors
    ///
    /// - 400 when a segment names no field on any current type, when a
    ///   property does not exist, or when an implicit reference traversal is
    ///   ambiguous (the message lists every disambiguated alternative).
    /// - 403 when the account may not view a traversed field.
    pub fn resolve_entity_query_path(
        &self,
        resource_type: &Arc<ResourceType>,
        external: &str,
    ) -> JsonApiResult<String> {
        let mut resource_types = vec![Arc::clone(resource_type)];
        let mut parts: VecDeque<&str> = external.split('.').collect();
        let mut consumed: Vec<&str> = Vec::new();
        let mut breadcrumbs: Vec<String> = Vec::new();

        while let Some(part) = parts.pop_front() {
            consumed.push(part);

            if !resource_types.iter().any(|t| t.is_fieldable()) {
                let field_name = resource_types
                    .first()
                    .map(|t| t.internal_name(part))
                    .unwrap_or_else(|| part.to_string());
                breadcrumbs.push(field_name);
                breadcrumbs.extend(parts.iter().map(|p| p.to_string()));
                return Ok(breadcrumbs.join("."));
            }

            let candidates: Vec<(Arc<ResourceType>, String, &FieldDefinition)> = resource_types
                .iter()
                .filter_map(|t| {
                    let field_name = self.member_name(t, part)?;
                    self.schema
                        .field_definition(t.entity_type_id(), t.bundle(), &field_name)
                        .map(|definition| (Arc::clone(t), field_name, definition))
                })
                .collect();
            let Some(field_name) = candidates.first().map(|(_, name, _)| name.clone()) else {
                return Err(JsonApiError::bad_request(format!(
                    "Invalid nested filtering. The field `{}`, given in the path `{}`, does not exist.",
                    part, external
                )));
            };
            breadcrumbs.push(field_name.clone());

            for (_, _, definition) in &candidates {
                let access =
                    self.policy
                        .field_access(FieldOperation::View, definition, self.account, None);
                if !access.is_allowed() {
                    let mut message = format!(
                        "The current user is not authorized to filter by the `{}` field, given in the path `{}`.",
                        field_name,
                        breadcrumbs.join(".")
                    );
                    if let Some(reason) = access.reason() {
                        message.push(' ');
                        message.push_str(reason);
                    }
                    return Err(JsonApiError::access_denied(message));
                }
            }

            let mut next_types: Vec<Arc<ResourceType>> = Vec::new();
            for (candidate_type, candidate_name, _) in &candidates {
                for related in candidate_type.relatable_types_by_field(candidate_name)? {
                    if !next_types.iter().any(|t| t.type_name() == related.type_name()) {
                        next_types.push(related);
                    }
                }
            }
            let definitions: Vec<&FieldDefinition> = candidates.iter().map(|(_, _, d)| *d).collect();

            if let Some(delta) = parts.front().copied().filter(|p| is_delta(p)) {
                parts.pop_front();
                consumed.push(delta);
                breadcrumbs.push(delta.to_string());
            }

            let Some(next) = parts.front().copied() else {
                break;
            };

            if definitions.iter().any(|d| d.property(next).is_some()) {
                parts.pop_front();
                consumed.push(next);
                breadcrumbs.push(next.to_string());
                if definitions.iter().any(|d| d.reference_property() == Some(next)) {
                    resource_types = next_types;
                    continue;
                }
                breadcrumbs.extend(parts.drain(..).map(String::from));
                break;
            }

            let mut reference_properties: Vec<&str> =
                definitions.iter().filter_map(|d| d.reference_property()).collect();
            reference_properties.sort_unstable();
            reference_properties.dedup();

            match reference_properties.as_slice() {
                [] => {
                    return Err(JsonApiError::bad_request(format!(
                        "Invalid nested filtering. The property `{}`, given in the path `{}`, does not exist.",
                        next, external
                    )));
                }
                [reference_property] => {
                    breadcrumbs.push(reference_property.to_string());
                    resource_types = next_types;
                }
                ambiguous => {
                    let prefix = consumed.join(".");
                    let remaining = parts.iter().copied().collect::<Vec<_>>().join(".");
                    let alternatives = ambiguous
                        .iter()
                        .map(|reference| format!("`{}.{}.{}`", prefix, reference, remaining))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(JsonApiError::bad_request(format!(
                        "Ambiguous path. Try one of the following: {}, in place of the given path: {}",
                        alternatives, external
                    )));
                }
            }
        }

        let resolved = breadcrumbs.join(".");
        debug!(external = %external, internal = %resolved, "Resolved entity query path");
        Ok(resolved)
    }

    /// Maps a public segment to the internal name of a filterable member of
    /// `resource_type`. `id` denotes the UUID key.
    fn member_name(&self, resource_type: &ResourceType, public_name: &str) -> Option<String> {
        if let Some(field) = resource_type.field_by_public_name(public_name) {
            return Some(field.internal_name().to_string());
        }
        if public_name != "id" {
            return None;
        }
        self.schema
            .entity_type(resource_type.entity_type_id())
            .map(|definition| definition.keys.uuid.clone())
    }
}

fn is_delta(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_type::{ResourceTypeCatalog, ResourceTypeOverrides};
    use helios_entity::access::PermissionAccessPolicy;
    use axum::http::StatusCode;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{"entity_types": [
                {"id": "node", "keys": {"bundle": "type"}, "bundles": {
                    "article": {"fields": [
                        {"name": "title", "type": "string"},
                        {"name": "body", "type": "text"},
                        {"name": "secret", "type": "string", "view_permission": "view secrets"},
                        {"name": "uid", "type": "entity_reference", "settings": {"target_type": "user"}},
                        {"name": "tags", "type": "entity_reference", "cardinality": -1,
                         "settings": {"target_type": "user"}},
                        {"name": "related", "type": "entity_reference", "cardinality": -1,
                         "settings": {"target_type": "node"}},
                        {"name": "owner", "type": "entity_reference",
                         "settings": {"target_type": "user", "reference_property": "entity"}},
                        {"name": "cfg", "type": "entity_reference", "settings": {"target_type": "config"}}
                    ]},
                    "page": {"fields": [
                        {"name": "title", "type": "string"},
                        {"name": "uid", "type": "entity_reference", "settings": {"target_type": "user"}},
                        {"name": "owner", "type": "entity_reference",
                         "settings": {"target_type": "user", "reference_property": "target"}}
                    ]}
                }},
                {"id": "user", "base_fields": [{"name": "name", "type": "string"}]},
                {"id": "config", "fieldable": false, "storage": "null"}
            ]}"#,
        )
        .unwrap()
    }

    fn catalog(schema: &Schema) -> ResourceTypeCatalog {
        let mut overrides = ResourceTypeOverrides::new();
        overrides.insert(
            "node--article".to_string(),
            serde_json::from_value(serde_json::json!({
                "fields": {"uid": {"public_name": "author"}}
            }))
            .unwrap(),
        );
        ResourceTypeCatalog::build(schema, &overrides).unwrap()
    }

    fn resolve_query(path: &str) -> JsonApiResult<String> {
        let schema = schema();
        // Relatable types are weak references; keep the catalog alive.
        let catalog = catalog(&schema);
        let rt = catalog.get("node", "article").unwrap();
        let policy = PermissionAccessPolicy::new();
        let account = Account::anonymous(Vec::<String>::new());
        let resolver = FieldResolver::new(&schema, &policy, &account);
        resolver.resolve_entity_query_path(&rt, path)
    }

    fn resolve_include(path: &str) -> JsonApiResult<Vec<Vec<String>>> {
        let schema = schema();
        let catalog = ResourceTypeCatalog::build(&schema, &ResourceTypeOverrides::new()).unwrap();
        let rt = catalog.get("node", "article").unwrap();
        let policy = PermissionAccessPolicy::new();
        let account = Account::anonymous(Vec::<String>::new());
        let resolver = FieldResolver::new(&schema, &policy, &account);
        let parts: Vec<&str> = path.split('.').collect();
        resolver.resolve_include_path(&rt, &parts)
    }

    #[test]
    fn test_query_path_plain_field() {
        assert_eq!(resolve_query("title").unwrap(), "title");
        assert_eq!(resolve_query("id").unwrap(), "uuid");
    }

    #[test]
    fn test_query_path_alias_and_implicit_reference() {
        assert_eq!(resolve_query("author.name").unwrap(), "uid.entity.name");
        assert_eq!(resolve_query("author.id").unwrap(), "uid.entity.uuid");
        assert_eq!(resolve_query("author.entity.name").unwrap(), "uid.entity.name");
        assert_eq!(resolve_query("author").unwrap(), "uid");
    }

    #[test]
    fn test_query_path_value_property() {
        assert_eq!(resolve_query("body.value").unwrap(), "body.value");
        assert_eq!(resolve_query("author.target_id").unwrap(), "uid.target_id");
    }

    #[test]
    fn test_query_path_zero_is_a_segment() {
        assert_eq!(resolve_query("tags.0").unwrap(), "tags.0");
        assert_eq!(resolve_query("tags.0.name").unwrap(), "tags.0.entity.name");
    }

    #[test]
    fn test_query_path_non_fieldable_target() {
        assert_eq!(resolve_query("cfg.settings.mode").unwrap(), "cfg.entity.settings.mode");
    }

    #[test]
    fn test_query_path_unknown_field() {
        let err = resolve_query("author.nope").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.detail(),
            "Invalid nested filtering. The field `nope`, given in the path `author.nope`, does not exist."
        );

        // The internal name is not public once aliased.
        assert!(resolve_query("uid.name").is_err());
    }

    #[test]
    fn test_query_path_unknown_property_on_value_field() {
        let err = resolve_query("title.foo").unwrap_err();
        assert_eq!(
            err.detail(),
            "Invalid nested filtering. The property `foo`, given in the path `title.foo`, does not exist."
        );
    }

    #[test]
    fn test_query_path_field_access() {
        let err = resolve_query("secret").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            err.detail(),
            "The current user is not authorized to filter by the `secret` field, given in the path `secret`. The 'view secrets' permission is required."
        );
    }

    #[test]
    fn test_query_path_ambiguous_reference() {
        let err = resolve_query("related.owner.name").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.detail(),
            "Ambiguous path. Try one of the following: `related.owner.entity.name`, `related.owner.target.name`, in place of the given path: related.owner.name"
        );
    }

    #[test]
    fn test_query_path_deterministic() {
        assert_eq!(
            resolve_query("related.uid.name").unwrap(),
            resolve_query("related.uid.name").unwrap()
        );
        assert_eq!(
            resolve_query("related.uid.name").unwrap(),
            "related.entity.uid.entity.name"
        );
    }

    #[test]
    fn test_include_single_segment() {
        assert_eq!(resolve_include("uid").unwrap(), vec![vec!["uid".to_string()]]);
    }

    #[test]
    fn test_include_multiple_alternatives() {
        let resolved = resolve_include("related.uid").unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|p| p == &vec!["related".to_string(), "uid".to_string()]));
    }

    #[test]
    fn test_include_partial_success() {
        // Only node--article defines `tags`.
        let resolved = resolve_include("related.tags").unwrap();
        assert_eq!(resolved, vec![vec!["related".to_string(), "tags".to_string()]]);
    }

    #[test]
    fn test_include_empty_path() {
        let err = resolve_include("").unwrap_err();
        assert_eq!(err.detail(), "Empty include path.");
    }

    #[test]
    fn test_include_invalid_field_lists_possible_values() {
        let err = resolve_include("title").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.detail(),
            "`title` is not a valid relationship field name. Possible values: uid, tags, related, owner, cfg."
        );
    }

    #[test]
    fn test_include_aggregated_failure_wrapped_once() {
        let err = resolve_include("uid.name").unwrap_err();
        assert_eq!(
            err.detail(),
            "`uid.name` is not a valid include path. `name` is not a valid relationship field name."
        );

        let err = resolve_include("related.uid.nope").unwrap_err();
        assert_eq!(
            err.detail(),
            "`related.uid.nope` is not a valid include path. `nope` is not a valid relationship field name."
        );
    }
}
