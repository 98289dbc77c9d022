//! In-memory storage backend.
//!
//! Evaluates the full query vocabulary over entities held in memory:
//! dotted paths with deltas and reference traversal, all comparison
//! operators, nested AND/OR groups, multi-key sorts and ranges.
//!
//! Language codes on sorts are accepted and ignored; the store holds a
//! single translation per entity.

mod backend;
mod evaluator;

pub use backend::MemoryBackend;
