//! The normalization value tree.
//!
//! Normalizing an entity does not produce JSON directly. It produces a tree
//! of values that each carry their own cacheability, so the response can
//! report every cache tag and context that influenced it. The tree is
//! rendered with [`NormalizerValue::rasterize`] once it is complete.
//!
//! ```text
//! JsonApiDocumentTopLevelNormalizerValue
//!   └─ ResourceObjectValue (Entity | Exception)
//!        └─ FieldValue (Attribute | Relationship | IncludeOnly | Null)
//!             └─ ResourceObjectValue ... (includes)
//! ```

mod builder;
mod document;
mod entity;
mod exception;
mod field;
mod relationship;

pub use builder::{Normalizer, SparseFieldsets};
pub use document::{DocumentData, JsonApiDocumentTopLevelNormalizerValue};
pub use entity::{EntityNormalizerValue, FieldValue};
pub use exception::HttpExceptionNormalizerValue;
pub use field::{FieldItemNormalizerValue, FieldNormalizerValue, NullFieldNormalizerValue};
pub use relationship::{
    IncludeOnlyRelationshipValue, MISSING_ID, RelationshipNormalizerValue, ResourceIdentifier,
    ensure_unique_resource_identifier_objects,
};

use std::sync::Arc;

use helios_entity::cache::{Cacheable, CacheableMetadata};
use serde_json::Value;

/// A node of the normalization tree.
pub trait NormalizerValue: Cacheable {
    /// Renders the node as JSON.
    fn rasterize(&self) -> Value;
}

/// A resource object, or the error that replaced it.
#[derive(Debug, Clone)]
pub enum ResourceObjectValue {
    /// A normalized entity.
    Entity(Arc<EntityNormalizerValue>),
    /// An entity that could not be shown.
    Exception(Arc<HttpExceptionNormalizerValue>),
}

impl ResourceObjectValue {
    /// Returns `(type, id)` for entities.
    pub fn identity(&self) -> Option<(&str, &str)> {
        match self {
            ResourceObjectValue::Entity(entity) => Some((entity.type_name(), entity.id())),
            ResourceObjectValue::Exception(_) => None,
        }
    }

    /// Returns every value included below this one, depth first.
    pub fn nested_includes(&self) -> Vec<ResourceObjectValue> {
        match self {
            ResourceObjectValue::Entity(entity) => entity.rasterize_includes(),
            ResourceObjectValue::Exception(_) => Vec::new(),
        }
    }
}

impl Cacheable for ResourceObjectValue {
    fn cacheability(&self) -> &CacheableMetadata {
        match self {
            ResourceObjectValue::Entity(entity) => entity.cacheability(),
            ResourceObjectValue::Exception(exception) => exception.cacheability(),
        }
    }
}

impl NormalizerValue for ResourceObjectValue {
    fn rasterize(&self) -> Value {
        match self {
            ResourceObjectValue::Entity(entity) => entity.rasterize(),
            ResourceObjectValue::Exception(exception) => exception.rasterize(),
        }
    }
}
