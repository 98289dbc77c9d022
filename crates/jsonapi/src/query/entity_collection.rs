//! Loaded query results.

use helios_entity::Entity;

use crate::error::JsonApiError;

/// A collection slot: a loaded entity, or the access error that replaced it.
#[derive(Debug, Clone)]
pub enum CollectionItem {
    /// An entity the account may view.
    Entity(Entity),
    /// An entity the account may not view.
    Denied(JsonApiError),
}

/// One page of loaded entities.
#[derive(Debug, Clone, Default)]
pub struct EntityCollection {
    items: Vec<CollectionItem>,
    has_next_page: bool,
    total_count: Option<usize>,
}

impl EntityCollection {
    /// Creates a collection.
    pub fn new(items: Vec<CollectionItem>) -> Self {
        Self {
            items,
            has_next_page: false,
            total_count: None,
        }
    }

    /// Sets whether a next page exists.
    pub fn with_has_next_page(mut self, has_next_page: bool) -> Self {
        self.has_next_page = has_next_page;
        self
    }

    /// Sets the total number of matching rows.
    pub fn with_total_count(mut self, total_count: Option<usize>) -> Self {
        self.total_count = total_count;
        self
    }

    /// Returns the slots in order.
    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }

    /// Consumes the collection, returning its slots.
    pub fn into_items(self) -> Vec<CollectionItem> {
        self.items
    }

    /// Returns true if a next page exists.
    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    /// Returns the total count, if computed.
    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    /// Returns the number of slots.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no slots.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
