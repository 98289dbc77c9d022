//! Entity validation.
//!
//! Validation never fails as an operation; it returns the list of
//! [`Violation`]s. Each violation names the field it belongs to so callers
//! can filter by field (e.g. only submitted or viewable fields).

use serde_json::Value;

use crate::entity::Entity;
use crate::schema::{FieldDefinition, FieldType, Schema};

/// A constraint violation on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field machine name.
    pub field: String,
    /// Path of the offending value, e.g. `title` or `tags.1.target_id`.
    pub property_path: String,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    fn new(field: &str, property_path: String, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            property_path,
            message: message.into(),
        }
    }
}

/// Validates an entity against the schema.
///
/// `reference_bundle` resolves `(entity_type, uuid)` to the bundle of an
/// existing entity, or `None` when it does not exist.
pub fn validate_entity<F>(schema: &Schema, entity: &Entity, reference_bundle: F) -> Vec<Violation>
where
    F: Fn(&str, &str) -> Option<String>,
{
    let mut violations = Vec::new();
    let definitions = schema.field_definitions(entity.entity_type(), entity.bundle());

    for field_name in entity.field_names() {
        if !definitions.iter().any(|d| d.name == field_name) {
            violations.push(Violation::new(
                field_name,
                field_name.to_string(),
                format!("The field {} does not exist.", field_name),
            ));
        }
    }

    for definition in definitions {
        validate_field(definition, entity, &reference_bundle, &mut violations);
    }

    violations
}

fn validate_field<F>(
    definition: &FieldDefinition,
    entity: &Entity,
    reference_bundle: &F,
    violations: &mut Vec<Violation>,
) where
    F: Fn(&str, &str) -> Option<String>,
{
    let name = definition.name.as_str();
    let items = entity.get(name);

    if definition.required && items.iter().all(|item| item_is_empty(definition, item)) {
        violations.push(Violation::new(
            name,
            name.to_string(),
            "This value should not be null.",
        ));
    }

    if let Some(limit) = definition.cardinality.limit() {
        if items.len() > limit {
            violations.push(Violation::new(
                name,
                name.to_string(),
                format!("{}: this field cannot hold more than {} values.", name, limit),
            ));
        }
    }

    let stored = definition.stored_property_names();
    for (delta, item) in items.iter().enumerate() {
        for (property, value) in item {
            let path = format!("{}.{}.{}", name, delta, property);
            if !stored.contains(property) {
                violations.push(Violation::new(
                    name,
                    path,
                    format!("The property {} does not exist on field {}.", property, name),
                ));
                continue;
            }
            if value.is_null() {
                continue;
            }
            if !value_has_type(definition, property, value) {
                violations.push(Violation::new(
                    name,
                    path,
                    "This value should be of the correct primitive type.",
                ));
            }
        }

        if let (Some(settings), Some(target_id)) = (
            definition.settings.as_ref().filter(|_| definition.is_reference()),
            item.get("target_id").and_then(Value::as_str),
        ) {
            let path = format!("{}.{}.target_id", name, delta);
            match reference_bundle(&settings.target_type, target_id) {
                None => violations.push(Violation::new(
                    name,
                    path,
                    format!(
                        "The referenced entity ({}: {}) does not exist.",
                        settings.target_type, target_id
                    ),
                )),
                Some(bundle) => {
                    let allowed = settings
                        .target_bundles
                        .as_ref()
                        .is_none_or(|bundles| bundles.contains(&bundle));
                    if !allowed {
                        violations.push(Violation::new(
                            name,
                            path,
                            format!(
                                "This entity ({}: {}) cannot be referenced.",
                                settings.target_type, target_id
                            ),
                        ));
                    }
                }
            }
        }
    }
}

fn item_is_empty(definition: &FieldDefinition, item: &crate::entity::FieldItem) -> bool {
    match item.get(definition.main_property()) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn value_has_type(definition: &FieldDefinition, property: &str, value: &Value) -> bool {
    match (definition.field_type, property) {
        (FieldType::Integer, "value") => value.is_i64() || value.is_u64(),
        (FieldType::Float, "value") => value.is_number(),
        (FieldType::Boolean, "value") => value.is_boolean(),
        (FieldType::Map, "value") => value.is_object(),
        (FieldType::Timestamp, "value") => match value {
            Value::Number(n) => n.is_i64(),
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            _ => false,
        },
        (FieldType::Uuid, "value") => value
            .as_str()
            .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        (FieldType::EntityReference, "target_id") => value.is_string(),
        (FieldType::EntityReference, _) => !value.is_object(),
        _ => value.is_string(),
    }
}

/// Keeps only violations on the given fields.
pub fn filter_by_fields<'a, I>(violations: Vec<Violation>, fields: I) -> Vec<Violation>
where
    I: IntoIterator<Item = &'a str>,
{
    let fields: Vec<&str> = fields.into_iter().collect();
    violations
        .into_iter()
        .filter(|v| fields.contains(&v.field.as_str()))
        .collect()
}
