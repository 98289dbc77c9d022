//! JSON:API resource types.
//!
//! A [`ResourceType`] is the JSON:API identity of one (entity type, bundle)
//! pair. It maps public field names to internal ones, knows which fields are
//! enabled, and, once the catalog is fully built, which resource types each
//! relationship field can point to.
//!
//! Relatable types are populated in a second construction pass because the
//! relationship graph is cyclic (a type may relate to itself). Each resource
//! type keeps only weak back-references; the owning `Arc`s live in the
//! [`ResourceTypeCatalog`].

mod repository;

pub use repository::{
    FieldOverride, ResourceTypeCatalog, ResourceTypeOverride, ResourceTypeOverrides,
    ResourceTypeRepository,
};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use thiserror::Error;

/// Logic errors in resource type construction or use.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceTypeError {
    /// Relatable types were read before the catalog finished building.
    #[error("Relatable resource types of {type_name} have not been set")]
    RelatableTypesNotSet {
        /// The resource type name.
        type_name: String,
    },

    /// Relatable types were set twice.
    #[error("Relatable resource types of {type_name} have already been set")]
    RelatableTypesAlreadySet {
        /// The resource type name.
        type_name: String,
    },
}

/// Whether a field renders as an attribute or as a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain value field.
    Attribute,
    /// A reference field.
    Relationship,
}

/// A field as exposed by a resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeField {
    internal_name: String,
    public_name: String,
    enabled: bool,
    kind: FieldKind,
    has_one: bool,
}

impl ResourceTypeField {
    /// Creates an enabled field exposed under its internal name.
    pub fn new(internal_name: impl Into<String>, kind: FieldKind, has_one: bool) -> Self {
        let internal_name = internal_name.into();
        Self {
            public_name: internal_name.clone(),
            internal_name,
            enabled: true,
            kind,
            has_one,
        }
    }

    /// Sets the public name.
    pub fn with_public_name(mut self, public_name: impl Into<String>) -> Self {
        self.public_name = public_name.into();
        self
    }

    /// Disables the field.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns the internal field name.
    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    /// Returns the public field name.
    pub fn public_name(&self) -> &str {
        &self.public_name
    }

    /// Returns true if the field is exposed.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns true for relationship fields.
    pub fn is_relationship(&self) -> bool {
        self.kind == FieldKind::Relationship
    }

    /// Returns true for cardinality-1 fields.
    pub fn has_one(&self) -> bool {
        self.has_one
    }
}

/// Relatable types keyed by internal field name.
type RelatableTypes = BTreeMap<String, Vec<Weak<ResourceType>>>;

/// The JSON:API identity of an (entity type, bundle) pair.
pub struct ResourceType {
    entity_type_id: String,
    bundle: String,
    type_name: String,
    internal: bool,
    locatable: bool,
    fieldable: bool,
    include_count: bool,
    fields: Vec<ResourceTypeField>,
    relatable: OnceLock<RelatableTypes>,
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("type_name", &self.type_name)
            .field("internal", &self.internal)
            .field("locatable", &self.locatable)
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

impl ResourceType {
    /// Creates a resource type with default flags.
    pub fn new(
        entity_type_id: impl Into<String>,
        bundle: impl Into<String>,
        fields: Vec<ResourceTypeField>,
    ) -> Self {
        let entity_type_id = entity_type_id.into();
        let bundle = bundle.into();
        Self {
            type_name: format!("{}--{}", entity_type_id, bundle),
            entity_type_id,
            bundle,
            internal: false,
            locatable: true,
            fieldable: true,
            include_count: false,
            fields,
            relatable: OnceLock::new(),
        }
    }

    /// Marks the type as internal.
    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    /// Sets whether individual resources are addressable.
    pub fn with_locatable(mut self, locatable: bool) -> Self {
        self.locatable = locatable;
        self
    }

    /// Sets whether the type backs a field system that paths can traverse.
    pub fn with_fieldable(mut self, fieldable: bool) -> Self {
        self.fieldable = fieldable;
        self
    }

    /// Sets whether collections report a total count.
    pub fn with_include_count(mut self, include_count: bool) -> Self {
        self.include_count = include_count;
        self
    }

    /// Returns the entity type id.
    pub fn entity_type_id(&self) -> &str {
        &self.entity_type_id
    }

    /// Returns the bundle.
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// Returns the public type name, `entity_type--bundle`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns true if the type is excluded from routing and inclusion.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Returns true if individual resources have a URL.
    pub fn is_locatable(&self) -> bool {
        self.locatable
    }

    /// Returns true if paths can traverse into this type's fields.
    pub fn is_fieldable(&self) -> bool {
        self.fieldable
    }

    /// Returns true if collections should carry a total count.
    pub fn include_count(&self) -> bool {
        self.include_count
    }

    /// Returns all fields, enabled or not, in declaration order.
    pub fn fields(&self) -> &[ResourceTypeField] {
        &self.fields
    }

    /// Returns the field with the given internal name.
    pub fn field(&self, internal_name: &str) -> Option<&ResourceTypeField> {
        self.fields.iter().find(|f| f.internal_name == internal_name)
    }

    /// Returns the enabled field with the given public name.
    pub fn field_by_public_name(&self, public_name: &str) -> Option<&ResourceTypeField> {
        self.fields
            .iter()
            .find(|f| f.enabled && f.public_name == public_name)
    }

    /// Translates a public field name; unknown names map to themselves.
    pub fn internal_name(&self, public_name: &str) -> String {
        self.field_by_public_name(public_name)
            .map(|f| f.internal_name.clone())
            .unwrap_or_else(|| public_name.to_string())
    }

    /// Translates an internal field name; unknown names map to themselves.
    pub fn public_name(&self, internal_name: &str) -> String {
        self.field(internal_name)
            .map(|f| f.public_name.clone())
            .unwrap_or_else(|| internal_name.to_string())
    }

    /// Returns true if the internal field exists and is enabled.
    pub fn is_field_enabled(&self, internal_name: &str) -> bool {
        self.field(internal_name).is_some_and(|f| f.enabled)
    }

    /// Returns true if the internal field is an enabled relationship.
    pub fn is_relationship_field(&self, internal_name: &str) -> bool {
        self.field(internal_name)
            .is_some_and(|f| f.enabled && f.is_relationship())
    }

    /// Sets the relatable types. May only be called once.
    pub fn set_relatable_types(
        &self,
        relatable: BTreeMap<String, Vec<Weak<ResourceType>>>,
    ) -> Result<(), ResourceTypeError> {
        self.relatable
            .set(relatable)
            .map_err(|_| ResourceTypeError::RelatableTypesAlreadySet {
                type_name: self.type_name.clone(),
            })
    }

    fn relatable(&self) -> Result<&RelatableTypes, ResourceTypeError> {
        self.relatable
            .get()
            .ok_or_else(|| ResourceTypeError::RelatableTypesNotSet {
                type_name: self.type_name.clone(),
            })
    }

    /// Returns the relatable types of every relationship field, keyed by
    /// internal field name.
    ///
    /// # Errors
    ///
    /// Fails if the catalog has not finished its second construction pass.
    pub fn relatable_types(
        &self,
    ) -> Result<BTreeMap<String, Vec<Arc<ResourceType>>>, ResourceTypeError> {
        Ok(self
            .relatable()?
            .iter()
            .map(|(field, types)| (field.clone(), types.iter().filter_map(Weak::upgrade).collect()))
            .collect())
    }

    /// Returns the types an enabled relationship field can point to.
    ///
    /// Disabled and non-relationship fields have none.
    pub fn relatable_types_by_field(
        &self,
        internal_name: &str,
    ) -> Result<Vec<Arc<ResourceType>>, ResourceTypeError> {
        let relatable = self.relatable()?;
        if !self.is_relationship_field(internal_name) {
            return Ok(Vec::new());
        }
        Ok(relatable
            .get(internal_name)
            .map(|types| types.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default())
    }

    /// Returns the public names of enabled relationship fields with at least
    /// one relatable type.
    pub fn relationship_public_names(&self) -> Result<Vec<String>, ResourceTypeError> {
        let relatable = self.relatable()?;
        Ok(self
            .fields
            .iter()
            .filter(|f| f.enabled && f.is_relationship())
            .filter(|f| {
                relatable
                    .get(&f.internal_name)
                    .is_some_and(|types| types.iter().any(|t| t.strong_count() > 0))
            })
            .map(|f| f.public_name.clone())
            .collect())
    }
}
