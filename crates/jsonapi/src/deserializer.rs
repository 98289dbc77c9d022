//! Request body decoding.
//!
//! Turns a JSON:API resource object into field items keyed by internal field
//! name, and relationship payloads into reference items. Relationship targets
//! are checked for existence here; everything else about field values is left
//! to entity validation.

use std::sync::Arc;

use helios_entity::FieldItem;
use helios_entity::core::EntityStorage;
use helios_entity::entity::reference_item;
use helios_entity::schema::{FieldDefinition, FieldType, Schema};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{JsonApiError, JsonApiResult};
use crate::resource_type::{FieldKind, ResourceType, ResourceTypeCatalog, ResourceTypeField};

/// One submitted attribute or relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedField {
    /// Internal field name.
    pub internal_name: String,
    /// Public field name as submitted.
    pub public_name: String,
    /// Attribute or relationship.
    pub kind: FieldKind,
    /// Decoded items.
    pub items: Vec<FieldItem>,
}

impl SubmittedField {
    /// Returns the JSON pointer of the submitted member.
    pub fn pointer(&self) -> String {
        let member = match self.kind {
            FieldKind::Attribute => "attributes",
            FieldKind::Relationship => "relationships",
        };
        format!("/data/{}/{}", member, self.public_name)
    }
}

/// A decoded resource object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    /// Client-provided id, if any.
    pub id: Option<String>,
    /// Submitted fields in payload order.
    pub fields: Vec<SubmittedField>,
}

/// Decodes request bodies for one resource type.
pub struct Deserializer<'a, S: ?Sized> {
    storage: &'a S,
    schema: &'a Schema,
    catalog: &'a ResourceTypeCatalog,
}

impl<'a, S: EntityStorage + ?Sized> Deserializer<'a, S> {
    /// Creates a deserializer.
    pub fn new(storage: &'a S, schema: &'a Schema, catalog: &'a ResourceTypeCatalog) -> Self {
        Self {
            storage,
            schema,
            catalog,
        }
    }

    /// Decodes a resource object document.
    ///
    /// # Errors
    ///
    /// - 400 for empty or malformed bodies and identifiers.
    /// - 409 when `type` is not the destination resource type.
    /// - 422 for malformed ids and unknown fields.
    /// - 404 for relationship targets that do not exist.
    pub async fn deserialize(
        &self,
        body: &[u8],
        resource_type: &Arc<ResourceType>,
    ) -> JsonApiResult<ResourceDocument> {
        let data = parse_data(body)?;
        let Value::Object(data) = data else {
            return Err(JsonApiError::bad_request("Missing `data`."));
        };

        let type_name = data
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonApiError::bad_request("Resource object must include a \"type\"."))?;
        if type_name != resource_type.type_name() {
            return Err(JsonApiError::conflict(format!(
                "The provided type ({}) does not match the destination resource types ({}).",
                type_name,
                resource_type.type_name()
            )));
        }

        let id = match data.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return Err(invalid_id()),
        };

        let mut fields = Vec::new();
        if let Some(attributes) = members(&data, "attributes")? {
            for (public_name, value) in attributes {
                let field = resource_type
                    .field_by_public_name(public_name)
                    .filter(|f| f.is_enabled() && !f.is_relationship())
                    .ok_or_else(|| unknown_field("attribute", public_name, resource_type))?;
                let definition = self.definition(resource_type, field)?;
                fields.push(SubmittedField {
                    internal_name: field.internal_name().to_string(),
                    public_name: public_name.clone(),
                    kind: FieldKind::Attribute,
                    items: attribute_items(value, definition),
                });
            }
        }

        if let Some(relationships) = members(&data, "relationships")? {
            for (public_name, value) in relationships {
                let field = resource_type
                    .field_by_public_name(public_name)
                    .filter(|f| f.is_enabled() && f.is_relationship())
                    .ok_or_else(|| unknown_field("relationship", public_name, resource_type))?;
                let data = value.get("data").ok_or_else(|| {
                    JsonApiError::bad_request(format!(
                        "The relationship `{}` must contain a `data` member.",
                        public_name
                    ))
                    .with_pointer(format!("/data/relationships/{}", public_name))
                })?;
                let items = self.relationship_items(resource_type, field, data).await?;
                fields.push(SubmittedField {
                    internal_name: field.internal_name().to_string(),
                    public_name: public_name.clone(),
                    kind: FieldKind::Relationship,
                    items,
                });
            }
        }

        debug!(
            resource_type = resource_type.type_name(),
            fields = fields.len(),
            "Deserialized resource object"
        );
        Ok(ResourceDocument { id, fields })
    }

    /// Decodes a relationship document (`{"data": ...}`) for one field.
    ///
    /// # Errors
    ///
    /// Same as the relationship part of [`Deserializer::deserialize`].
    pub async fn deserialize_relationship(
        &self,
        body: &[u8],
        resource_type: &Arc<ResourceType>,
        field: &ResourceTypeField,
    ) -> JsonApiResult<Vec<FieldItem>> {
        let data = parse_data(body)?;
        self.relationship_items(resource_type, field, &data).await
    }

    fn definition(
        &self,
        resource_type: &ResourceType,
        field: &ResourceTypeField,
    ) -> JsonApiResult<&'a FieldDefinition> {
        self.schema
            .field_definition(
                resource_type.entity_type_id(),
                resource_type.bundle(),
                field.internal_name(),
            )
            .ok_or_else(|| {
                JsonApiError::internal(format!(
                    "The field {} has no definition on {}.",
                    field.internal_name(),
                    resource_type.type_name()
                ))
            })
    }

    async fn relationship_items(
        &self,
        resource_type: &Arc<ResourceType>,
        field: &ResourceTypeField,
        data: &Value,
    ) -> JsonApiResult<Vec<FieldItem>> {
        let identifiers: Vec<&Value> = match data {
            Value::Null => Vec::new(),
            Value::Array(values) => values.iter().collect(),
            Value::Object(_) => vec![data],
            _ => {
                return Err(JsonApiError::bad_request(
                    "Relationship data must be a resource identifier object, an array of them, or null.",
                ));
            }
        };

        let definition = self.definition(resource_type, field)?;
        let targets = resource_type.relatable_types_by_field(field.internal_name())?;
        let target_names: Vec<&str> = targets.iter().map(|t| t.type_name()).collect();

        let mut items = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let (type_name, id) = match (
                identifier.get("type").and_then(Value::as_str),
                identifier.get("id").and_then(Value::as_str),
            ) {
                (Some(type_name), Some(id)) => (type_name, id),
                _ => {
                    return Err(JsonApiError::bad_request(
                        "Resource identifier objects must include a \"type\" and an \"id\".",
                    ));
                }
            };
            let Some(target_type) = targets.iter().find(|t| t.type_name() == type_name) else {
                return Err(JsonApiError::bad_request(format!(
                    "The provided type ({}) does not match the destination resource types ({}).",
                    type_name,
                    target_names.join(", ")
                )));
            };

            let exists = self
                .storage
                .load(target_type.entity_type_id(), id)
                .await?
                .is_some_and(|target| {
                    self.catalog
                        .get_for_entity(&target)
                        .is_some_and(|t| t.type_name() == type_name)
                });
            if !exists {
                return Err(JsonApiError::not_found(format!(
                    "The resource identified by `{}:{}` (given as a relationship item) could not be found.",
                    type_name, id
                )));
            }

            let mut item = reference_item(id.to_string());
            if let Some(meta) = identifier.get("meta").and_then(Value::as_object) {
                for property in &definition.extra_properties {
                    if let Some(value) = meta.get(property) {
                        item.insert(property.clone(), value.clone());
                    }
                }
            }
            items.push(item);
        }
        Ok(items)
    }
}

/// Checks that a client-generated id is a UUID.
///
/// # Errors
///
/// Returns an unprocessable entity error pointing at `/data/id`.
pub fn validate_client_id(id: &str) -> JsonApiResult<()> {
    Uuid::parse_str(id).map(|_| ()).map_err(|_| invalid_id())
}

fn invalid_id() -> JsonApiError {
    JsonApiError::unprocessable(
        "IDs should be properly generated and formatted UUIDs as described in RFC 4122.",
        Some("/data/id".to_string()),
    )
}

fn parse_data(body: &[u8]) -> JsonApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(JsonApiError::bad_request("Empty request body."));
    }
    let document: Value = serde_json::from_slice(body)
        .map_err(|e| JsonApiError::bad_request(format!("Syntax error: {}", e)))?;
    match document {
        Value::Object(mut document) => document
            .shift_remove("data")
            .ok_or_else(|| JsonApiError::bad_request("Missing `data`.")),
        _ => Err(JsonApiError::bad_request("Missing `data`.")),
    }
}

fn members<'v>(data: &'v Map<String, Value>, name: &str) -> JsonApiResult<Option<&'v Map<String, Value>>> {
    match data.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(members)) => Ok(Some(members)),
        Some(_) => Err(JsonApiError::bad_request(format!(
            "The `{}` member must be an object.",
            name
        ))
        .with_pointer(format!("/data/{}", name))),
    }
}

fn unknown_field(kind: &str, public_name: &str, resource_type: &ResourceType) -> JsonApiError {
    JsonApiError::unprocessable(
        format!(
            "The {} {} does not exist on the {} resource type.",
            kind,
            public_name,
            resource_type.type_name()
        ),
        Some(format!("/data/{}s/{}", kind, public_name)),
    )
}

/// Converts an attribute value into field items.
///
/// Scalars fill the main property, objects are taken as items (map fields
/// wrap them in `value`), arrays hold one entry per item and `null` clears
/// the field.
pub fn attribute_items(value: &Value, definition: &FieldDefinition) -> Vec<FieldItem> {
    let entries: Vec<&Value> = match value {
        Value::Null => Vec::new(),
        Value::Array(values) if !definition.cardinality.is_single() => values.iter().collect(),
        other => vec![other],
    };
    entries
        .into_iter()
        .filter(|entry| !entry.is_null())
        .map(|entry| match entry {
            Value::Object(object) if definition.field_type != FieldType::Map => object.clone(),
            other => {
                let mut item = FieldItem::new();
                item.insert(definition.main_property().to_string(), other.clone());
                item
            }
        })
        .collect()
}
