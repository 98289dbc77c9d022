//! Condition and sort evaluation over in-memory entities.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::entity::{Entity, FieldItem};
use crate::query::{ConditionGroup, ConditionMember, Conjunction, Operator, QuerySort, SortDirection};
use crate::schema::Schema;

use super::backend::StoredEntity;

/// Entities keyed by entity type, then UUID.
pub(crate) type Store = BTreeMap<String, BTreeMap<String, StoredEntity>>;

/// Evaluates dotted field paths and condition trees.
pub(crate) struct Evaluator<'a> {
    schema: &'a Schema,
    store: &'a Store,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(schema: &'a Schema, store: &'a Store) -> Self {
        Self { schema, store }
    }

    /// Returns every non-null value a path resolves to on the entity.
    pub(crate) fn resolve(&self, entity: &Entity, path: &str) -> Vec<Value> {
        let segments: Vec<&str> = path.split('.').collect();
        self.resolve_segments(entity, &segments)
            .into_iter()
            .filter(|v| !v.is_null())
            .collect()
    }

    fn resolve_segments(&self, entity: &Entity, segments: &[&str]) -> Vec<Value> {
        let Some((field_name, mut rest)) = segments.split_first() else {
            return Vec::new();
        };
        let Some(definition) =
            self.schema
                .field_definition(entity.entity_type(), entity.bundle(), field_name)
        else {
            return Vec::new();
        };

        let all_items = entity.get(field_name);
        let items: Vec<&FieldItem> = match rest.first().and_then(|s| s.parse::<usize>().ok()) {
            Some(delta) => {
                rest = &rest[1..];
                all_items.get(delta).into_iter().collect()
            }
            None => all_items.iter().collect(),
        };

        let Some((next, tail)) = rest.split_first() else {
            return items
                .iter()
                .filter_map(|item| item.get(definition.main_property()).cloned())
                .collect();
        };

        if definition.reference_property() == Some(*next) {
            let Some(targets) = definition.target_type().and_then(|t| self.store.get(t)) else {
                return Vec::new();
            };
            return items
                .iter()
                .filter_map(|item| item.get("target_id").and_then(Value::as_str))
                .filter_map(|target_id| targets.get(target_id))
                .flat_map(|target| {
                    if tail.is_empty() {
                        vec![Value::String(target.entity.uuid().to_string())]
                    } else {
                        self.resolve_segments(&target.entity, tail)
                    }
                })
                .collect();
        }

        items
            .iter()
            .filter_map(|item| item.get(*next))
            .flat_map(|value| descend(value, tail))
            .collect()
    }

    /// Returns true if the entity matches every member of the group (AND)
    /// or at least one (OR). Empty groups match.
    pub(crate) fn matches_group(&self, entity: &Entity, group: &ConditionGroup) -> bool {
        if group.is_empty() {
            return true;
        }
        let mut results = group.members().iter().map(|m| self.matches_member(entity, m));
        match group.conjunction() {
            Conjunction::And => results.all(|r| r),
            Conjunction::Or => results.any(|r| r),
        }
    }

    fn matches_member(&self, entity: &Entity, member: &ConditionMember) -> bool {
        match member {
            ConditionMember::Condition {
                field,
                value,
                operator,
            } => {
                let values = self.resolve(entity, field);
                match operator {
                    Operator::IsNull => values.is_empty(),
                    Operator::IsNotNull => !values.is_empty(),
                    _ => values.iter().any(|actual| compare(actual, *operator, value)),
                }
            }
            ConditionMember::Exists(field) => !self.resolve(entity, field).is_empty(),
            ConditionMember::NotExists(field) => self.resolve(entity, field).is_empty(),
            ConditionMember::Group(group) => self.matches_group(entity, group),
        }
    }

    /// Orders entities by the sort keys; missing values sort first.
    pub(crate) fn sort(&self, entities: &mut [&StoredEntity], sorts: &[QuerySort]) {
        if sorts.is_empty() {
            return;
        }
        let keys: BTreeMap<(String, usize), Option<Value>> = entities
            .iter()
            .flat_map(|stored| {
                sorts.iter().enumerate().map(move |(i, sort)| {
                    (
                        (stored.entity.uuid().to_string(), i),
                        self.resolve(&stored.entity, &sort.field).into_iter().next(),
                    )
                })
            })
            .collect();

        entities.sort_by(|a, b| {
            for (i, sort) in sorts.iter().enumerate() {
                let left = keys.get(&(a.entity.uuid().to_string(), i)).cloned().flatten();
                let right = keys.get(&(b.entity.uuid().to_string(), i)).cloned().flatten();
                let ordering = match (&left, &right) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
                };
                let ordering = match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

fn descend(value: &Value, path: &[&str]) -> Vec<Value> {
    let Some((head, tail)) = path.split_first() else {
        return vec![value.clone()];
    };
    match value {
        Value::Object(map) => map.get(*head).map(|v| descend(v, tail)).unwrap_or_default(),
        Value::Array(list) => head
            .parse::<usize>()
            .ok()
            .and_then(|i| list.get(i))
            .map(|v| descend(v, tail))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

/// Compares two values, coercing query-string values to the stored type.
pub(crate) fn compare_values(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            Some(as_bool(actual)?.cmp(&as_bool(expected)?))
        }
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            as_number(actual)?.partial_cmp(&as_number(expected)?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    compare_values(actual, expected) == Some(Ordering::Equal)
}

fn list_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(list) => list.clone(),
        other => vec![other.clone()],
    }
}

fn between(actual: &Value, bounds: &Value) -> Option<bool> {
    let bounds = list_of(bounds);
    let (low, high) = (bounds.first()?, bounds.get(1)?);
    let above = compare_values(actual, low)? != Ordering::Less;
    let below = compare_values(actual, high)? != Ordering::Greater;
    Some(above && below)
}

fn compare(actual: &Value, operator: Operator, expected: &Value) -> bool {
    let text_match = |f: fn(&str, &str) -> bool| match (as_text(actual), as_text(expected)) {
        (Some(a), Some(e)) => f(&a.to_lowercase(), &e.to_lowercase()),
        _ => false,
    };
    match operator {
        Operator::Eq => loose_eq(actual, expected),
        Operator::NotEq => !loose_eq(actual, expected),
        Operator::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::StartsWith => text_match(|a, e| a.starts_with(e)),
        Operator::Contains => text_match(|a, e| a.contains(e)),
        Operator::EndsWith => text_match(|a, e| a.ends_with(e)),
        Operator::In => list_of(expected).iter().any(|e| loose_eq(actual, e)),
        Operator::NotIn => !list_of(expected).iter().any(|e| loose_eq(actual, e)),
        Operator::Between => between(actual, expected).unwrap_or(false),
        Operator::NotBetween => between(actual, expected).is_some_and(|inside| !inside),
        Operator::IsNull => actual.is_null(),
        Operator::IsNotNull => !actual.is_null(),
    }
}
