//! Common test utilities for JSON:API testing.
//!
//! - [`harness`] - Test server factory and request helpers
//! - [`fixtures`] - Schema, entities and accounts
//! - [`assertions`] - Response assertions

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;
