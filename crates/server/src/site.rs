//! Site documents.
//!
//! A site document describes everything the server needs at startup: the
//! entity schema, resource type overrides, the known accounts and the
//! entities to seed the in-memory store with.

use std::path::Path;

use anyhow::Context;
use helios_entity::Entity;
use helios_entity::access::Account;
use helios_entity::backends::memory::MemoryBackend;
use helios_entity::schema::{EntityTypeDefinition, Schema};
use helios_jsonapi::ResourceTypeOverrides;
use serde::Deserialize;
use tracing::info;

/// The serialized form of a site.
#[derive(Debug, Default, Deserialize)]
pub struct SiteDocument {
    /// Entity type definitions.
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDefinition>,

    /// Resource type overrides keyed by `entity_type--bundle`.
    #[serde(default)]
    pub resource_types: ResourceTypeOverrides,

    /// Accounts selectable with `X-Account-Id`.
    #[serde(default)]
    pub accounts: Vec<Account>,

    /// Entities stored at startup.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// A loaded site: a seeded backend plus the request-level configuration.
pub struct Site {
    pub backend: MemoryBackend,
    pub overrides: ResourceTypeOverrides,
    pub accounts: Vec<Account>,
}

impl SiteDocument {
    /// Reads a site document from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read site document {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse site document {}", path.display()))
    }

    /// Builds the schema and seeds a memory backend.
    pub fn into_site(self) -> anyhow::Result<Site> {
        let schema = Schema::from_definitions(self.entity_types)?;
        let backend = MemoryBackend::new(schema);
        let seeded = backend.seed(self.entities)?;
        info!(
            entities = seeded,
            accounts = self.accounts.len(),
            overrides = self.resource_types.len(),
            "Loaded site"
        );
        Ok(Site {
            backend,
            overrides: self.resource_types,
            accounts: self.accounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SITE: &str = r#"{
        "entity_types": [
            {"id": "user", "base_fields": [{"name": "name", "type": "string"}]}
        ],
        "resource_types": {"user--user": {"include_count": true}},
        "accounts": [{"id": "admin", "permissions": ["administer entities"]}],
        "entities": [
            {"entity_type": "user", "bundle": "user", "uuid": "u1",
             "fields": {"name": [{"value": "Ada"}]}}
        ]
    }"#;

    #[test]
    fn test_load_site_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SITE.as_bytes()).unwrap();

        let site = SiteDocument::from_file(file.path()).unwrap().into_site().unwrap();
        assert_eq!(site.backend.len(), 1);
        assert_eq!(site.accounts.len(), 1);
        assert!(site.accounts[0].has_permission("administer entities"));
        assert!(site.overrides["user--user"].include_count);
    }

    #[test]
    fn test_empty_document_is_an_empty_site() {
        let document: SiteDocument = serde_json::from_str("{}").unwrap();
        let site = document.into_site().unwrap();
        assert!(site.backend.is_empty());
        assert!(site.accounts.is_empty());
    }

    #[test]
    fn test_entity_of_unknown_bundle_is_rejected() {
        let document: SiteDocument = serde_json::from_str(
            r#"{"entity_types": [{"id": "user"}],
                "entities": [{"entity_type": "user", "bundle": "robot", "uuid": "r1"}]}"#,
        )
        .unwrap();
        assert!(document.into_site().is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = SiteDocument::from_file("/nonexistent/site.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/site.json"));
    }
}
