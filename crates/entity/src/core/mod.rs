//! Core storage traits.

mod storage;

pub use storage::EntityStorage;
