//! Entity query builder.
//!
//! An [`EntityQuery`] is a plain description: a root AND group of
//! conditions, sorts, an optional range and an opaque metadata bag.
//! Backends execute it and return the UUIDs of matching entities.
//!
//! Field paths are dotted: `field[.delta][.property]`, and references are
//! followed through their reference property, e.g. `uid.entity.name`.

mod condition;

pub use condition::{ConditionGroup, ConditionMember, Conjunction, Operator};

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Returns the wire form of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySort {
    /// Dotted storage path.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
    /// Language code, if the sort is language-specific.
    pub langcode: Option<String>,
}

/// A query against one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    entity_type: String,
    condition: ConditionGroup,
    sorts: Vec<QuerySort>,
    range: Option<(usize, usize)>,
    count: bool,
    metadata: BTreeMap<String, Value>,
}

impl EntityQuery {
    /// Creates a query over all entities of a type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            condition: ConditionGroup::and(),
            sorts: Vec::new(),
            range: None,
            count: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a comparison to the root group.
    pub fn condition(&mut self, field: impl Into<String>, value: Value, operator: Operator) -> &mut Self {
        self.condition.condition(field, value, operator);
        self
    }

    /// Adds an existence check to the root group.
    pub fn exists(&mut self, field: impl Into<String>) -> &mut Self {
        self.condition.exists(field);
        self
    }

    /// Adds a non-existence check to the root group.
    pub fn not_exists(&mut self, field: impl Into<String>) -> &mut Self {
        self.condition.not_exists(field);
        self
    }

    /// Attaches a compiled group to the root group.
    pub fn condition_group(&mut self, group: ConditionGroup) -> &mut Self {
        self.condition.add_group(group);
        self
    }

    /// Adds a sort key.
    pub fn sort(
        &mut self,
        field: impl Into<String>,
        direction: SortDirection,
        langcode: Option<String>,
    ) -> &mut Self {
        self.sorts.push(QuerySort {
            field: field.into(),
            direction,
            langcode,
        });
        self
    }

    /// Restricts the result to `length` rows starting at `offset`.
    pub fn range(&mut self, offset: usize, length: usize) -> &mut Self {
        self.range = Some((offset, length));
        self
    }

    /// Removes the range.
    pub fn clear_range(&mut self) -> &mut Self {
        self.range = None;
        self
    }

    /// Turns the query into a count query.
    pub fn count(&mut self) -> &mut Self {
        self.count = true;
        self
    }

    /// Stores opaque metadata alongside the query.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the entity type.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the root condition group.
    pub fn root(&self) -> &ConditionGroup {
        &self.condition
    }

    /// Returns the sorts in order.
    pub fn sorts(&self) -> &[QuerySort] {
        &self.sorts
    }

    /// Returns the range, if any.
    pub fn get_range(&self) -> Option<(usize, usize)> {
        self.range
    }

    /// Returns true for count queries.
    pub fn is_count(&self) -> bool {
        self.count
    }

    /// Returns a metadata entry.
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}
