//! The `filter` query parameter.
//!
//! Filters arrive as a flat, keyed structure:
//!
//! ```text
//! filter[a][condition][path]=title
//! filter[a][condition][operator]=CONTAINS
//! filter[a][condition][value]=Rust
//! filter[a][condition][memberOf]=g
//! filter[g][group][conjunction]=OR
//! filter[status]=1                       (shorthand)
//! ```
//!
//! Parsing expands shorthand items, resolves every condition path through the
//! [`FieldResolver`], and assembles the `memberOf` references into a tree
//! rooted at the reserved `@root` group. [`Filter::compile`] turns the tree
//! into a storage [`ConditionGroup`].

use std::collections::BTreeSet;
use std::sync::Arc;

use helios_entity::query::{ConditionGroup, Conjunction, EntityQuery, Operator};
use serde_json::{Map, Value};

use crate::error::{JsonApiError, JsonApiResult};
use crate::field_resolver::FieldResolver;
use crate::resource_type::ResourceType;

/// Id of the implicit root group.
pub const ROOT_ID: &str = "@root";

const CONDITION_KEY: &str = "condition";
const GROUP_KEY: &str = "group";
const MEMBER_KEY: &str = "memberOf";
const PATH_KEY: &str = "path";
const VALUE_KEY: &str = "value";
const OPERATOR_KEY: &str = "operator";
const CONJUNCTION_KEY: &str = "conjunction";

/// A single filter condition on a resolved storage path.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCondition {
    field: String,
    operator: Operator,
    value: Option<Value>,
}

impl EntityCondition {
    /// Creates a condition.
    pub fn new(field: impl Into<String>, operator: Operator, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Validates and builds a condition from its query parameter form.
    ///
    /// # Errors
    ///
    /// Returns a bad request when the path is missing, the operator is not
    /// allowed, or the value does not fit the operator.
    pub fn from_query_parameter(parameter: &Map<String, Value>) -> JsonApiResult<Self> {
        let Some(path) = parameter.get(PATH_KEY).and_then(Value::as_str) else {
            return Err(JsonApiError::bad_request(
                "Filter parameter is missing a 'path' key.",
            ));
        };

        let operator_name = parameter
            .get(OPERATOR_KEY)
            .and_then(Value::as_str)
            .unwrap_or("=");
        let operator: Operator = operator_name.parse().map_err(|_| {
            JsonApiError::bad_request(format!(
                "The '{}' operator is not allowed in a filter parameter.",
                operator_name
            ))
        })?;

        let value = parameter.get(VALUE_KEY).cloned();
        if operator.is_existence_check() {
            if value.is_some() {
                return Err(JsonApiError::bad_request(format!(
                    "Filters using the '{}' operator should not provide a value.",
                    operator
                )));
            }
        } else {
            let Some(value) = value.as_ref() else {
                return Err(JsonApiError::bad_request(
                    "Filter parameter is missing a 'value' key.",
                ));
            };
            if operator.requires_list() && !value.is_array() {
                return Err(JsonApiError::bad_request(format!(
                    "The '{}' operator requires an array value.",
                    operator
                )));
            }
            if matches!(operator, Operator::Between | Operator::NotBetween)
                && value.as_array().is_some_and(|v| v.len() != 2)
            {
                return Err(JsonApiError::bad_request(format!(
                    "The '{}' operator requires exactly two values.",
                    operator
                )));
            }
        }

        Ok(Self::new(path, operator, value))
    }

    /// Returns the storage path.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the value; existence checks have none.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// A member of a filter group.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterMember {
    /// A condition.
    Condition(EntityCondition),
    /// A nested group.
    Group(EntityConditionGroup),
}

/// A group of filter members joined by one conjunction.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityConditionGroup {
    conjunction: Conjunction,
    members: Vec<FilterMember>,
}

impl EntityConditionGroup {
    /// Creates a group.
    pub fn new(conjunction: Conjunction, members: Vec<FilterMember>) -> Self {
        Self {
            conjunction,
            members,
        }
    }

    /// Creates a group from its wire conjunction.
    ///
    /// # Errors
    ///
    /// Returns a bad request for anything but `AND` and `OR`.
    pub fn with_conjunction(conjunction: &str, members: Vec<FilterMember>) -> JsonApiResult<Self> {
        let conjunction = conjunction
            .parse()
            .map_err(|_| JsonApiError::bad_request("Allowed conjunctions: AND, OR."))?;
        Ok(Self::new(conjunction, members))
    }

    /// Returns the conjunction.
    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    /// Returns the members in order.
    pub fn members(&self) -> &[FilterMember] {
        &self.members
    }
}

/// A parsed `filter` parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    root: EntityConditionGroup,
}

impl Filter {
    /// Wraps a root group.
    pub fn new(root: EntityConditionGroup) -> Self {
        Self { root }
    }

    /// Returns the root group.
    pub fn root(&self) -> &EntityConditionGroup {
        &self.root
    }

    /// Parses the `filter` parameter for a resource type.
    ///
    /// # Errors
    ///
    /// Returns a bad request for malformed items and reserved ids, and
    /// propagates path resolution failures.
    pub fn from_query_parameter(
        parameter: &Value,
        resource_type: &Arc<ResourceType>,
        resolver: &FieldResolver<'_>,
    ) -> JsonApiResult<Self> {
        let mut items = Self::expand(parameter)?;
        for item in &mut items {
            let Some(Value::Object(condition)) = item.body.get_mut(CONDITION_KEY) else {
                continue;
            };
            let Some(path) = condition.get(PATH_KEY).and_then(Value::as_str) else {
                continue;
            };
            let resolved = resolver.resolve_entity_query_path(resource_type, path)?;
            condition.insert(PATH_KEY.to_string(), Value::String(resolved));
        }
        Ok(Self::new(Self::build_tree(&items)?))
    }

    /// Expands every item to the long form and records its parent group.
    fn expand(parameter: &Value) -> JsonApiResult<Vec<FilterItem>> {
        let entries: Vec<(String, Value)> = match parameter {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Value::Array(list) => list
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            _ => {
                return Err(JsonApiError::bad_request(
                    "The filter parameter needs to be an array.",
                ));
            }
        };

        entries
            .into_iter()
            .map(|(id, raw)| {
                if id == ROOT_ID {
                    return Err(JsonApiError::bad_request(format!(
                        "'{}' is a reserved filter id.",
                        ROOT_ID
                    )));
                }
                let mut body = match raw {
                    Value::Object(map) => map,
                    scalar => {
                        let mut map = Map::new();
                        map.insert(VALUE_KEY.to_string(), scalar);
                        map
                    }
                };

                let member_of = [CONDITION_KEY, GROUP_KEY]
                    .iter()
                    .find_map(|key| {
                        body.get_mut(*key)
                            .and_then(Value::as_object_mut)
                            .and_then(|inner| inner.shift_remove(MEMBER_KEY))
                    })
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_else(|| ROOT_ID.to_string());

                // Shorthand: the item itself is the condition.
                if body.contains_key(VALUE_KEY) {
                    body.shift_remove(MEMBER_KEY);
                    body.entry(PATH_KEY.to_string())
                        .or_insert_with(|| Value::String(id.clone()));
                    let mut long = Map::new();
                    long.insert(CONDITION_KEY.to_string(), Value::Object(body));
                    body = long;
                }

                if !body.contains_key(GROUP_KEY) {
                    if let Some(condition) = body
                        .entry(CONDITION_KEY.to_string())
                        .or_insert_with(|| Value::Object(Map::new()))
                        .as_object_mut()
                    {
                        condition
                            .entry(OPERATOR_KEY.to_string())
                            .or_insert_with(|| Value::String("=".to_string()));
                    }
                }

                Ok(FilterItem {
                    id,
                    member_of,
                    body,
                })
            })
            .collect()
    }

    fn build_tree(items: &[FilterItem]) -> JsonApiResult<EntityConditionGroup> {
        let mut visited = BTreeSet::new();
        visited.insert(ROOT_ID.to_string());
        Self::build_group(ROOT_ID, Conjunction::And, items, &mut visited)
    }

    fn build_group(
        group_id: &str,
        conjunction: Conjunction,
        items: &[FilterItem],
        visited: &mut BTreeSet<String>,
    ) -> JsonApiResult<EntityConditionGroup> {
        let mut members = Vec::new();
        for child in items.iter().filter(|item| item.member_of == group_id) {
            if let Some(group) = child.body.get(GROUP_KEY) {
                if !visited.insert(child.id.clone()) {
                    continue;
                }
                let conjunction = group
                    .get(CONJUNCTION_KEY)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let parsed = EntityConditionGroup::with_conjunction(conjunction, Vec::new())?;
                members.push(FilterMember::Group(Self::build_group(
                    &child.id,
                    parsed.conjunction(),
                    items,
                    visited,
                )?));
            } else if let Some(Value::Object(condition)) = child.body.get(CONDITION_KEY) {
                members.push(FilterMember::Condition(EntityCondition::from_query_parameter(
                    condition,
                )?));
            } else {
                return Err(JsonApiError::bad_request(
                    "Filter parameter is missing a 'path' key.",
                ));
            }
        }
        Ok(EntityConditionGroup::new(conjunction, members))
    }

    /// Compiles the filter tree into a storage condition group.
    pub fn compile(&self) -> ConditionGroup {
        Self::compile_group(&self.root)
    }

    /// Compiles the filter and attaches it to a query.
    pub fn apply_to(&self, query: &mut EntityQuery) {
        if !self.root.members.is_empty() {
            query.condition_group(self.compile());
        }
    }

    fn compile_group(group: &EntityConditionGroup) -> ConditionGroup {
        let mut compiled = ConditionGroup::new(group.conjunction);
        for member in &group.members {
            match member {
                FilterMember::Group(nested) => {
                    compiled.add_group(Self::compile_group(nested));
                }
                FilterMember::Condition(condition) => match condition.operator {
                    Operator::IsNull => {
                        compiled.not_exists(condition.field.clone());
                    }
                    Operator::IsNotNull => {
                        compiled.exists(condition.field.clone());
                    }
                    operator => {
                        compiled.condition(
                            condition.field.clone(),
                            condition.value.clone().unwrap_or(Value::Null),
                            operator,
                        );
                    }
                },
            }
        }
        compiled
    }
}

/// An expanded filter item.
#[derive(Debug)]
struct FilterItem {
    id: String,
    member_of: String,
    body: Map<String, Value>,
}
