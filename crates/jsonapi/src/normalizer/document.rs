//! The top-level document value.

use std::collections::HashMap;
use std::sync::Arc;

use helios_entity::cache::{Cacheable, CacheableMetadata};
use serde_json::{Map, Value, json};

use super::entity::EntityNormalizerValue;
use super::relationship::RelationshipNormalizerValue;
use super::{NormalizerValue, ResourceObjectValue};
use crate::responses::document::jsonapi_object;

/// The primary data of a document.
#[derive(Debug, Clone)]
pub enum DocumentData {
    /// A single resource object.
    Individual(Arc<EntityNormalizerValue>),
    /// A list of resource objects, some of which may be errors.
    Collection(Vec<ResourceObjectValue>),
    /// The linkage of one relationship.
    Relationship(RelationshipNormalizerValue),
    /// An empty to-one related resource.
    Null,
}

impl DocumentData {
    fn includes(&self) -> Vec<ResourceObjectValue> {
        match self {
            DocumentData::Individual(entity) => entity.rasterize_includes(),
            DocumentData::Collection(items) => items
                .iter()
                .flat_map(ResourceObjectValue::nested_includes)
                .collect(),
            DocumentData::Relationship(relationship) => relationship
                .includes()
                .iter()
                .flat_map(|include| {
                    std::iter::once(include.clone()).chain(include.nested_includes())
                })
                .collect(),
            DocumentData::Null => Vec::new(),
        }
    }

    fn cacheability(&self) -> CacheableMetadata {
        match self {
            DocumentData::Individual(entity) => entity.cacheability().clone(),
            DocumentData::Collection(items) => {
                CacheableMetadata::merge_all(items.iter().map(Cacheable::cacheability))
            }
            DocumentData::Relationship(relationship) => relationship.cacheability().clone(),
            DocumentData::Null => CacheableMetadata::new(),
        }
    }
}

/// A complete JSON:API document.
#[derive(Debug, Clone)]
pub struct JsonApiDocumentTopLevelNormalizerValue {
    data: DocumentData,
    links: Map<String, Value>,
    meta: Map<String, Value>,
    includes: Vec<ResourceObjectValue>,
    cacheability: CacheableMetadata,
}

impl JsonApiDocumentTopLevelNormalizerValue {
    /// Creates a document. Includes are collected from the data tree.
    pub fn new(data: DocumentData, links: Map<String, Value>) -> Self {
        let includes = data.includes();
        let cacheability = includes
            .iter()
            .fold(data.cacheability(), |acc, include| acc.merge(include.cacheability()));
        Self {
            data,
            links,
            meta: Map::new(),
            includes,
            cacheability,
        }
    }

    /// Adds pager links and the total count. Ignored for non-collection
    /// documents.
    pub fn with_pager(mut self, pager_links: Map<String, Value>, count: Option<usize>) -> Self {
        if !matches!(self.data, DocumentData::Collection(_)) {
            return self;
        }
        self.links.extend(pager_links);
        if let Some(count) = count {
            self.meta.insert("count".to_string(), json!(count));
        }
        self
    }

    /// Merges extra cacheability, e.g. the list cache tag of a collection.
    pub fn with_cacheability(mut self, cacheability: &CacheableMetadata) -> Self {
        self.cacheability = self.cacheability.merge(cacheability);
        self
    }

    /// Returns the primary data.
    pub fn data(&self) -> &DocumentData {
        &self.data
    }

    /// Returns the deduplicated included resource objects.
    ///
    /// A `(type, id)` seen more than once keeps the position of its first
    /// occurrence and the value of its last.
    pub fn included(&self) -> Vec<&EntityNormalizerValue> {
        let mut positions: HashMap<(&str, &str), usize> = HashMap::new();
        let mut included: Vec<&EntityNormalizerValue> = Vec::new();
        for include in &self.includes {
            if let ResourceObjectValue::Entity(entity) = include {
                let entity: &EntityNormalizerValue = entity;
                let key = (entity.type_name(), entity.id());
                match positions.get(&key) {
                    Some(&position) => included[position] = entity,
                    None => {
                        positions.insert(key, included.len());
                        included.push(entity);
                    }
                }
            }
        }
        included
    }

    fn errors(&self) -> Vec<Value> {
        let data_errors: Vec<&ResourceObjectValue> = match &self.data {
            DocumentData::Collection(items) => items.iter().collect(),
            _ => Vec::new(),
        };
        data_errors
            .into_iter()
            .chain(self.includes.iter())
            .filter_map(|value| match value {
                ResourceObjectValue::Exception(exception) => Some(exception.rasterize()),
                ResourceObjectValue::Entity(_) => None,
            })
            .flat_map(|errors| match errors {
                Value::Array(errors) => errors,
                other => vec![other],
            })
            .collect()
    }

    fn rasterize_data(&self) -> Value {
        match &self.data {
            DocumentData::Individual(entity) => entity.rasterize(),
            DocumentData::Collection(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| match item {
                        ResourceObjectValue::Entity(entity) => Some(entity.rasterize()),
                        ResourceObjectValue::Exception(_) => None,
                    })
                    .collect(),
            ),
            DocumentData::Relationship(relationship) => relationship.rasterize_data(),
            DocumentData::Null => Value::Null,
        }
    }
}

impl Cacheable for JsonApiDocumentTopLevelNormalizerValue {
    fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }
}

impl NormalizerValue for JsonApiDocumentTopLevelNormalizerValue {
    fn rasterize(&self) -> Value {
        let mut document = Map::new();
        document.insert("jsonapi".to_string(), jsonapi_object());
        document.insert("data".to_string(), self.rasterize_data());

        let included: Vec<Value> = self.included().into_iter().map(|e| e.rasterize()).collect();
        if !included.is_empty() {
            document.insert("included".to_string(), Value::Array(included));
        }

        let mut links = self.links.clone();
        if let DocumentData::Relationship(relationship) = &self.data {
            for (name, link) in relationship.links() {
                links.entry(name.clone()).or_insert_with(|| link.clone());
            }
        }
        if !links.is_empty() {
            document.insert("links".to_string(), Value::Object(links));
        }

        let mut meta = self.meta.clone();
        let errors = self.errors();
        if !errors.is_empty() {
            meta.insert("errors".to_string(), Value::Array(errors));
        }
        if !meta.is_empty() {
            document.insert("meta".to_string(), Value::Object(meta));
        }
        Value::Object(document)
    }
}
