//! # helios-entity - Schema-described entity storage
//!
//! This crate is the storage collaborator underneath the Helios JSON:API
//! layer. It knows nothing about HTTP or JSON:API documents; it exposes the
//! contracts the API layer consumes:
//!
//! - **Schema introspection**: entity types, their bundles and the field
//!   definitions of every (entity type, bundle) pair, including reference
//!   target metadata ([`schema`]).
//! - **Entities**: typed field lists keyed by UUID ([`entity`]).
//! - **Access control**: entity- and field-level access results carrying
//!   cacheability ([`access`]).
//! - **Queries**: a condition/sort/range query builder returning opaque row
//!   identifiers ([`query`]).
//! - **Validation**: per-field constraint violations ([`validation`]).
//! - **Storage**: the [`EntityStorage`](core::EntityStorage) trait and an
//!   in-memory backend ([`backends::memory`]).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use helios_entity::backends::memory::MemoryBackend;
//! use helios_entity::core::EntityStorage;
//! use helios_entity::query::{EntityQuery, Operator};
//! use helios_entity::schema::Schema;
//!
//! let schema = Schema::from_json(include_str!("schema.json"))?;
//! let backend = MemoryBackend::new(schema);
//!
//! let mut query = EntityQuery::new("node");
//! query.condition("type", "article".into(), Operator::Eq);
//! let ids = backend.execute(&query).await?;
//! ```
//!
//! ## Cacheability
//!
//! Every value the API layer renders carries [`CacheableMetadata`]
//! (cache contexts, cache tags and a max-age). Metadata merges as a simple
//! monoid: set union for contexts and tags, minimum for max-age.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod access;
pub mod backends;
pub mod cache;
pub mod core;
pub mod entity;
pub mod error;
pub mod query;
pub mod schema;
pub mod validation;

pub use cache::{CacheableMetadata, MaxAge};
pub use entity::{Entity, FieldItem};
pub use error::{StorageError, StorageResult};
