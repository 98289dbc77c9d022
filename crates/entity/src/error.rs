//! Error types for the entity storage layer.
//!
//! Errors are grouped by concern: entity state, schema lookups, query
//! construction and backend failures. [`StorageError`] wraps them all.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Entity state errors
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Schema lookup errors
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Query construction and evaluation errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors related to entity state.
#[derive(Error, Debug)]
pub enum EntityError {
    /// The requested entity was not found.
    #[error("entity not found: {entity_type}/{id}")]
    NotFound { entity_type: String, id: String },

    /// An entity with the given UUID already exists.
    #[error("entity already exists: {entity_type}/{id}")]
    AlreadyExists { entity_type: String, id: String },

    /// The entity's bundle does not belong to its entity type.
    #[error("bundle {bundle} does not exist on entity type {entity_type}")]
    InvalidBundle { entity_type: String, bundle: String },
}

/// Errors related to schema lookups and schema documents.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The entity type is not defined.
    #[error("unknown entity type: {entity_type}")]
    UnknownEntityType { entity_type: String },

    /// An entity type was defined more than once.
    #[error("duplicate entity type definition: {entity_type}")]
    DuplicateEntityType { entity_type: String },

    /// A field was defined more than once on one bundle.
    #[error("duplicate field {field} on {entity_type}--{bundle}")]
    DuplicateField {
        entity_type: String,
        bundle: String,
        field: String,
    },

    /// A reference field targets an entity type that is not defined.
    #[error("field {field} on {entity_type} targets unknown entity type {target_type}")]
    UnknownTargetType {
        entity_type: String,
        field: String,
        target_type: String,
    },

    /// A reference field is missing its target settings.
    #[error("reference field {field} on {entity_type} has no target settings")]
    MissingReferenceSettings { entity_type: String, field: String },

    /// The schema document could not be parsed.
    #[error("invalid schema document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors related to query construction and evaluation.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The operator string is not part of the supported vocabulary.
    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },

    /// The operator requires a value of a different shape.
    #[error("operator {operator} requires {expected}")]
    InvalidValue {
        operator: String,
        expected: &'static str,
    },

    /// A path segment names a field that does not exist.
    #[error("unknown field {field} in query path {path}")]
    UnknownField { field: String, path: String },
}

/// Backend-specific errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// An internal error occurred in the backend.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Returns true if this error means the entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Entity(EntityError::NotFound { .. }))
    }

    /// Returns true if this error means the entity already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Entity(EntityError::AlreadyExists { .. }))
    }
}
