//! Entity type and field definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage kind of an entity type.
///
/// Entity types with [`StorageKind::Null`] storage cannot be loaded
/// individually, so they have no addressable URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Entities are persisted and loadable by UUID.
    #[default]
    Memory,
    /// Virtual storage; nothing is persisted.
    Null,
}

/// The entity keys of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKeys {
    /// Field holding the UUID.
    #[serde(default = "default_uuid_key")]
    pub uuid: String,

    /// Field holding the bundle, if the entity type has bundles.
    #[serde(default)]
    pub bundle: Option<String>,

    /// Field holding the label, if any.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_uuid_key() -> String {
    "uuid".to_string()
}

impl Default for EntityKeys {
    fn default() -> Self {
        Self {
            uuid: default_uuid_key(),
            bundle: None,
            label: None,
        }
    }
}

/// A bundle (sub-type) of an entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleDefinition {
    /// Human-readable label.
    #[serde(default)]
    pub label: Option<String>,

    /// Bundle-specific fields, in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// An entity type (collection type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDefinition {
    /// Machine name, e.g. `node`.
    pub id: String,

    /// Human-readable label.
    #[serde(default)]
    pub label: Option<String>,

    /// Internal entity types are never exposed as resources of their own.
    #[serde(default)]
    pub internal: bool,

    /// Storage kind.
    #[serde(default)]
    pub storage: StorageKind,

    /// Whether the entity type carries a field system. Entity types without
    /// one are flat records whose nested values are plain properties.
    #[serde(default = "default_true")]
    pub fieldable: bool,

    /// Entity keys.
    #[serde(default)]
    pub keys: EntityKeys,

    /// Fields shared by every bundle, in declaration order.
    #[serde(default)]
    pub base_fields: Vec<FieldDefinition>,

    /// Bundles keyed by machine name. An entity type without bundles has a
    /// single implicit bundle named after the entity type.
    #[serde(default)]
    pub bundles: BTreeMap<String, BundleDefinition>,
}

fn default_true() -> bool {
    true
}

impl EntityTypeDefinition {
    /// Returns the bundle names, falling back to the entity type id.
    pub fn bundle_names(&self) -> Vec<String> {
        if self.bundles.is_empty() {
            vec![self.id.clone()]
        } else {
            self.bundles.keys().cloned().collect()
        }
    }

    /// Returns true if entities of this type can be loaded individually.
    pub fn is_locatable(&self) -> bool {
        self.storage != StorageKind::Null
    }
}

/// Data types of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Plain string.
    String,
    /// Formatted text with `value` and `format`.
    Text,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean.
    Boolean,
    /// RFC 3339 timestamp or unix seconds.
    Timestamp,
    /// UUID string.
    Uuid,
    /// Free-form JSON object.
    Map,
    /// Link with `uri` and `title`.
    Link,
    /// Reference to another entity.
    EntityReference,
}

impl FieldType {
    /// Returns the machine name of the field type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Uuid => "uuid",
            FieldType::Map => "map",
            FieldType::Link => "link",
            FieldType::EntityReference => "entity_reference",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Number of items a field may hold.
///
/// Serialized as an integer where `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Cardinality {
    /// At most this many items.
    Limited(u32),
    /// Any number of items.
    Unlimited,
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::Limited(1)
    }
}

impl From<i64> for Cardinality {
    fn from(value: i64) -> Self {
        if value < 0 {
            Cardinality::Unlimited
        } else {
            Cardinality::Limited(u32::try_from(value.max(1)).unwrap_or(u32::MAX))
        }
    }
}

impl From<Cardinality> for i64 {
    fn from(value: Cardinality) -> Self {
        match value {
            Cardinality::Limited(n) => i64::from(n),
            Cardinality::Unlimited => -1,
        }
    }
}

impl Cardinality {
    /// Returns true for fields holding at most one item.
    pub fn is_single(&self) -> bool {
        matches!(self, Cardinality::Limited(1))
    }

    /// Returns the item limit, if any.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Cardinality::Limited(n) => Some(*n as usize),
            Cardinality::Unlimited => None,
        }
    }
}

/// Target settings of an entity reference field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSettings {
    /// Entity type the field points to.
    pub target_type: String,

    /// Allowed target bundles. `None` allows every bundle.
    #[serde(default)]
    pub target_bundles: Option<Vec<String>>,

    /// Name of the property that dereferences the target entity.
    #[serde(default = "default_reference_property")]
    pub reference_property: String,
}

fn default_reference_property() -> String {
    "entity".to_string()
}

/// Role a property plays within a field item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Stored scalar or structured value.
    Value,
    /// Stored identifier of a referenced entity.
    ReferenceTarget,
    /// Computed property dereferencing the referenced entity.
    DataReference,
}

/// A property of a field item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    /// Property name.
    pub name: String,
    /// Role of the property.
    pub kind: PropertyKind,
    /// Computed properties are never stored on items.
    pub computed: bool,
}

impl PropertyDefinition {
    fn value(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: PropertyKind::Value,
            computed: false,
        }
    }
}

/// A field of an (entity type, bundle) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Machine name.
    pub name: String,

    /// Data type.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Item limit.
    #[serde(default)]
    pub cardinality: Cardinality,

    /// Whether at least one item is required.
    #[serde(default)]
    pub required: bool,

    /// Read-only fields are never editable through the API.
    #[serde(default)]
    pub read_only: bool,

    /// Internal fields are stored but never exposed.
    #[serde(default)]
    pub internal: bool,

    /// Permission required to view the field.
    #[serde(default)]
    pub view_permission: Option<String>,

    /// Permission required to edit the field.
    #[serde(default)]
    pub edit_permission: Option<String>,

    /// Target settings for entity reference fields.
    #[serde(default)]
    pub settings: Option<ReferenceSettings>,

    /// Additional stored properties on entity reference items
    /// (rendered as relationship meta).
    #[serde(default)]
    pub extra_properties: Vec<String>,
}

impl FieldDefinition {
    /// Creates a single-valued field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            cardinality: Cardinality::default(),
            required: false,
            read_only: false,
            internal: false,
            view_permission: None,
            edit_permission: None,
            settings: None,
            extra_properties: Vec::new(),
        }
    }

    /// Creates an entity reference field pointing at `target_type`.
    pub fn reference(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            settings: Some(ReferenceSettings {
                target_type: target_type.into(),
                target_bundles: None,
                reference_property: default_reference_property(),
            }),
            ..Self::new(name, FieldType::EntityReference)
        }
    }

    /// Sets the cardinality.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Restricts reference targets to the given bundles.
    pub fn with_target_bundles<I, T>(mut self, bundles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        if let Some(settings) = self.settings.as_mut() {
            settings.target_bundles = Some(bundles.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Returns the property definitions of this field's items.
    pub fn properties(&self) -> Vec<PropertyDefinition> {
        match self.field_type {
            FieldType::Text => vec![
                PropertyDefinition::value("value"),
                PropertyDefinition::value("format"),
            ],
            FieldType::Link => vec![
                PropertyDefinition::value("uri"),
                PropertyDefinition::value("title"),
            ],
            FieldType::EntityReference => {
                let reference_property = self
                    .settings
                    .as_ref()
                    .map(|s| s.reference_property.clone())
                    .unwrap_or_else(default_reference_property);
                let mut properties = vec![
                    PropertyDefinition {
                        name: "target_id".to_string(),
                        kind: PropertyKind::ReferenceTarget,
                        computed: false,
                    },
                    PropertyDefinition {
                        name: reference_property,
                        kind: PropertyKind::DataReference,
                        computed: true,
                    },
                ];
                properties.extend(
                    self.extra_properties
                        .iter()
                        .map(|name| PropertyDefinition::value(name)),
                );
                properties
            }
            _ => vec![PropertyDefinition::value("value")],
        }
    }

    /// Returns the names of the stored (non-computed) properties.
    pub fn stored_property_names(&self) -> Vec<String> {
        self.properties()
            .into_iter()
            .filter(|p| !p.computed)
            .map(|p| p.name)
            .collect()
    }

    /// Returns the main property name.
    pub fn main_property(&self) -> &'static str {
        match self.field_type {
            FieldType::Link => "uri",
            FieldType::EntityReference => "target_id",
            _ => "value",
        }
    }

    /// Returns the named property definition.
    pub fn property(&self, name: &str) -> Option<PropertyDefinition> {
        self.properties().into_iter().find(|p| p.name == name)
    }

    /// Returns true if the main property is a reference target.
    pub fn is_reference(&self) -> bool {
        self.field_type == FieldType::EntityReference
    }

    /// Returns the reference property name, for reference fields.
    pub fn reference_property(&self) -> Option<&str> {
        self.settings
            .as_ref()
            .filter(|_| self.is_reference())
            .map(|s| s.reference_property.as_str())
    }

    /// Returns the target entity type, for reference fields.
    pub fn target_type(&self) -> Option<&str> {
        self.settings
            .as_ref()
            .filter(|_| self.is_reference())
            .map(|s| s.target_type.as_str())
    }
}
