//! The `sort` query parameter.
//!
//! Accepts the string form (`sort=-created,title`) and the expanded form
//! (`sort[a][path]=created&sort[a][direction]=DESC&sort[a][langcode]=en`).

use std::sync::Arc;

use helios_entity::query::{EntityQuery, SortDirection};
use serde_json::{Map, Value};

use crate::error::{JsonApiError, JsonApiResult};
use crate::field_resolver::FieldResolver;
use crate::resource_type::ResourceType;

const PATH_KEY: &str = "path";
const DIRECTION_KEY: &str = "direction";
const LANGUAGE_KEY: &str = "langcode";

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// Storage path (public until resolved).
    pub path: String,
    /// Direction.
    pub direction: SortDirection,
    /// Language to sort in.
    pub langcode: Option<String>,
}

/// A parsed `sort` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    fields: Vec<SortField>,
}

impl Sort {
    /// Wraps sort keys.
    pub fn new(fields: Vec<SortField>) -> Self {
        Self { fields }
    }

    /// Returns the sort keys in order.
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// Parses the `sort` parameter and resolves its paths.
    ///
    /// # Errors
    ///
    /// Returns a bad request for empty values, missing paths, unknown keys
    /// or directions, and propagates path resolution failures.
    pub fn from_query_parameter(
        parameter: &Value,
        resource_type: &Arc<ResourceType>,
        resolver: &FieldResolver<'_>,
    ) -> JsonApiResult<Self> {
        let fields = Self::expand(parameter)?
            .into_iter()
            .map(|mut field| {
                field.path = resolver.resolve_entity_query_path(resource_type, &field.path)?;
                Ok(field)
            })
            .collect::<JsonApiResult<Vec<_>>>()?;
        Ok(Self::new(fields))
    }

    /// Expands the parameter into unresolved sort keys.
    pub fn expand(parameter: &Value) -> JsonApiResult<Vec<SortField>> {
        match parameter {
            Value::String(fields) if fields.trim().is_empty() => Err(JsonApiError::bad_request(
                "You need to provide a value for the sort parameter.",
            )),
            Value::String(fields) => fields.split(',').map(Self::expand_field_string).collect(),
            Value::Object(items) => items.values().map(Self::expand_item).collect(),
            Value::Array(items) => items.iter().map(Self::expand_item).collect(),
            _ => Err(JsonApiError::bad_request(
                "You need to provide a value for the sort parameter.",
            )),
        }
    }

    fn expand_field_string(field: &str) -> JsonApiResult<SortField> {
        let field = field.trim();
        let (direction, path) = match field.strip_prefix('-') {
            Some(path) => (SortDirection::Desc, path),
            None => (SortDirection::Asc, field),
        };
        if path.is_empty() {
            return Err(Self::missing_field());
        }
        Ok(SortField {
            path: path.to_string(),
            direction,
            langcode: None,
        })
    }

    fn expand_item(item: &Value) -> JsonApiResult<SortField> {
        let item: &Map<String, Value> = match item {
            Value::Object(map) => map,
            Value::String(field) => return Self::expand_field_string(field),
            _ => return Err(Self::missing_field()),
        };
        if item
            .keys()
            .any(|k| k != PATH_KEY && k != DIRECTION_KEY && k != LANGUAGE_KEY)
        {
            return Err(JsonApiError::bad_request(
                "You have provided an invalid set of sort keys.",
            ));
        }
        let Some(path) = item
            .get(PATH_KEY)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
        else {
            return Err(Self::missing_field());
        };
        let direction = match item.get(DIRECTION_KEY).and_then(Value::as_str) {
            None => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("ASC") => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("DESC") => SortDirection::Desc,
            Some(_) => {
                return Err(JsonApiError::bad_request(
                    "The sort direction must be ASC or DESC.",
                ));
            }
        };
        Ok(SortField {
            path: path.to_string(),
            direction,
            langcode: item
                .get(LANGUAGE_KEY)
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    fn missing_field() -> JsonApiError {
        JsonApiError::bad_request("You need to provide a field name for the sort parameter.")
    }

    /// Adds the sort keys to a query.
    pub fn apply_to(&self, query: &mut EntityQuery) {
        for field in &self.fields {
            query.sort(field.path.clone(), field.direction, field.langcode.clone());
        }
    }
}
