//! Request orchestration for resource routes.
//!
//! Every operation runs the same pipeline: access check, then (for
//! mutations) deserialization with per-field access checks and validation,
//! then the storage call, then normalization. Each step can end the request
//! with a [`JsonApiError`].

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::http::StatusCode;
use helios_entity::access::{
    AccessPolicy, AccessResult, Account, EntityOperation, FieldOperation,
};
use helios_entity::cache::CacheableMetadata;
use helios_entity::core::EntityStorage;
use helios_entity::query::{EntityQuery, Operator};
use helios_entity::schema::{FieldDefinition, Schema};
use helios_entity::validation::Violation;
use helios_entity::{Entity, FieldItem};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::deserializer::{Deserializer, SubmittedField, validate_client_id};
use crate::error::{ErrorViolation, JsonApiError, JsonApiResult};
use crate::field_resolver::FieldResolver;
use crate::include_resolver::{IncludeTree, ReferenceIndex};
use crate::link_manager::LinkManager;
use crate::normalizer::{
    DocumentData, JsonApiDocumentTopLevelNormalizerValue, Normalizer, ResourceObjectValue,
};
use crate::query::{CollectionItem, EntityCollection, Filter, OffsetPage, QueryParameters, Sort};
use crate::resource_type::{FieldKind, ResourceType, ResourceTypeCatalog, ResourceTypeField};
use crate::responses::{CacheHeaderSettings, ResourceResponse};

/// Cache context of responses that vary by query string.
pub const QUERY_ARGS_CACHE_CONTEXT: &str = "url.query_args";

/// Page size limits for collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Size used when `page[limit]` is absent.
    pub default_size: usize,
    /// Upper bound of `page[limit]`.
    pub max_size: usize,
}

/// The request URL and its decoded query.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The absolute request URL.
    pub url: Url,
    /// The decoded query parameters.
    pub params: QueryParameters,
}

impl RequestContext {
    /// Creates a context from an absolute URL.
    pub fn new(url: Url) -> Self {
        let params = QueryParameters::parse(url.query());
        Self { url, params }
    }
}

/// Orchestrates JSON:API operations for one account.
pub struct EntityResource<'a, S: ?Sized> {
    storage: &'a S,
    schema: Arc<Schema>,
    catalog: Arc<ResourceTypeCatalog>,
    policy: &'a dyn AccessPolicy,
    account: &'a Account,
    links: &'a LinkManager,
    pages: PageLimits,
    cache: CacheHeaderSettings,
}

impl<'a, S: EntityStorage + ?Sized> EntityResource<'a, S> {
    /// Creates an orchestrator.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: &'a S,
        schema: Arc<Schema>,
        catalog: Arc<ResourceTypeCatalog>,
        policy: &'a dyn AccessPolicy,
        account: &'a Account,
        links: &'a LinkManager,
        pages: PageLimits,
        cache: CacheHeaderSettings,
    ) -> Self {
        Self {
            storage,
            schema,
            catalog,
            policy,
            account,
            links,
            pages,
            cache,
        }
    }

    /// Returns the resource type catalog used by this request.
    pub fn catalog(&self) -> &ResourceTypeCatalog {
        &self.catalog
    }

    /// Resolves a routable resource type from its path segments.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown and internal resource types.
    pub fn routable_type(&self, entity_type: &str, bundle: &str) -> JsonApiResult<Arc<ResourceType>> {
        self.catalog
            .get(entity_type, bundle)
            .filter(|t| !t.is_internal())
            .ok_or_else(|| {
                JsonApiError::not_found(format!(
                    "The resource type {}--{} does not exist.",
                    entity_type, bundle
                ))
            })
    }

    /// Loads the entity addressed by an individual route.
    ///
    /// # Errors
    ///
    /// Returns not found when no entity of this resource type has the id.
    pub async fn load_entity(&self, resource_type: &ResourceType, id: &str) -> JsonApiResult<Entity> {
        self.storage
            .load(resource_type.entity_type_id(), id)
            .await?
            .filter(|entity| entity.bundle() == resource_type.bundle())
            .ok_or_else(|| {
                JsonApiError::not_found(format!(
                    "The requested resource {}/{} could not be found.",
                    resource_type.type_name(),
                    id
                ))
            })
    }

    /// `GET /{type}/{id}`.
    ///
    /// # Errors
    ///
    /// Returns access denied when the account may not view the entity.
    pub async fn get_individual(
        &self,
        resource_type: &Arc<ResourceType>,
        entity: &Entity,
        request: &RequestContext,
    ) -> JsonApiResult<ResourceResponse> {
        debug!(
            resource_type = resource_type.type_name(),
            id = entity.uuid(),
            "Getting individual resource"
        );
        let access = self.entity_access(resource_type, entity, EntityOperation::View, "GET")?;
        let document = self
            .individual_document(resource_type, entity, request, self_link(&request.url))
            .await?
            .with_cacheability(access.cacheability())
            .with_cacheability(&query_args_context());
        Ok(ResourceResponse::new(StatusCode::OK, document).with_cache_headers(self.cache))
    }

    /// `GET /{type}`.
    ///
    /// # Errors
    ///
    /// Returns a bad request for invalid `filter`, `sort`, `page` or
    /// `include` parameters.
    pub async fn get_collection(
        &self,
        resource_type: &Arc<ResourceType>,
        request: &RequestContext,
    ) -> JsonApiResult<ResourceResponse> {
        debug!(resource_type = resource_type.type_name(), "Getting collection");
        let params = &request.params;
        let resolver = FieldResolver::new(&self.schema, self.policy, self.account);

        let mut query = EntityQuery::new(resource_type.entity_type_id());
        if let Some(bundle_key) = self
            .schema
            .entity_type(resource_type.entity_type_id())
            .and_then(|definition| definition.keys.bundle.clone())
        {
            query.condition(bundle_key, json!(resource_type.bundle()), Operator::Eq);
        }
        if let Some(filter) = params.get("filter") {
            Filter::from_query_parameter(filter, resource_type, &resolver)?.apply_to(&mut query);
        }
        if let Some(sort) = params.get("sort") {
            Sort::from_query_parameter(sort, resource_type, &resolver)?.apply_to(&mut query);
        }
        let page = OffsetPage::from_query_parameter(
            params.get("page"),
            self.pages.default_size,
            self.pages.max_size,
        )?;
        page.apply_to(&mut query);

        let mut ids = self.storage.execute(&query).await?;
        let has_next_page = ids.len() > page.size();
        ids.truncate(page.size());

        let total = if resource_type.include_count() {
            let mut count_query = query.clone();
            count_query.clear_range().count();
            Some(self.storage.count(&count_query).await?)
        } else {
            None
        };

        let entities = self
            .storage
            .load_multiple(resource_type.entity_type_id(), &ids)
            .await?;
        let collection = EntityCollection::new(self.with_view_access(resource_type, entities))
            .with_has_next_page(has_next_page)
            .with_total_count(total);

        let pager = self.links.pager_links(&request.url, &page, has_next_page, total)?;
        let list_tag = CacheableMetadata::new()
            .with_tags([Entity::list_cache_tag(resource_type.entity_type_id())]);
        let document = self
            .collection_document(&[resource_type.clone()], &collection, request)
            .await?
            .with_pager(pager, collection.total_count())
            .with_cacheability(&list_tag);
        Ok(ResourceResponse::new(StatusCode::OK, document).with_cache_headers(self.cache))
    }

    /// `GET /{type}/{id}/{related}`.
    ///
    /// # Errors
    ///
    /// Returns not found for fields that are not viewable relationships.
    pub async fn get_related(
        &self,
        resource_type: &Arc<ResourceType>,
        entity: &Entity,
        public_field: &str,
        request: &RequestContext,
    ) -> JsonApiResult<ResourceResponse> {
        let (field, definition, access) = self.viewable_relationship(resource_type, entity, public_field)?;
        let target_type = definition.target_type().unwrap_or_default();

        let mut seen = BTreeSet::new();
        let ids: Vec<String> = entity
            .target_ids(field.internal_name())
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        let targets: Vec<Entity> = self
            .storage
            .load_multiple(target_type, &ids)
            .await?
            .into_iter()
            .filter(|target| {
                self.catalog
                    .get_for_entity(target)
                    .is_some_and(|t| !t.is_internal())
            })
            .collect();
        let target_types = resource_type.relatable_types_by_field(field.internal_name())?;

        let host = entity.cacheability().merge(&access);
        let links = self_link(&request.url);
        let document = if field.has_one() {
            match targets.into_iter().next() {
                Some(target) => {
                    let target_type = self
                        .catalog
                        .get_for_entity(&target)
                        .ok_or_else(|| JsonApiError::internal("Related resource has no type."))?;
                    let view =
                        self.entity_access(&target_type, &target, EntityOperation::View, "GET")?;
                    self.individual_document(&target_type, &target, request, links)
                        .await?
                        .with_cacheability(view.cacheability())
                }
                None => JsonApiDocumentTopLevelNormalizerValue::new(DocumentData::Null, links),
            }
        } else {
            let collection = EntityCollection::new(self.with_view_access_by_entity(targets));
            self.collection_document(&target_types, &collection, request)
                .await?
        };

        let document = document
            .with_cacheability(&host)
            .with_cacheability(&query_args_context());
        Ok(ResourceResponse::new(StatusCode::OK, document).with_cache_headers(self.cache))
    }

    /// `GET /{type}/{id}/relationships/{related}`.
    ///
    /// # Errors
    ///
    /// Returns not found for fields that are not viewable relationships.
    pub async fn get_relationship(
        &self,
        resource_type: &Arc<ResourceType>,
        entity: &Entity,
        public_field: &str,
        request: &RequestContext,
    ) -> JsonApiResult<ResourceResponse> {
        let (field, _, access) = self.viewable_relationship(resource_type, entity, public_field)?;
        let document = self
            .relationship_document(resource_type, entity, &field, request)
            .await?
            .with_cacheability(&access)
            .with_cacheability(&query_args_context());
        Ok(ResourceResponse::new(StatusCode::OK, document).with_cache_headers(self.cache))
    }

    /// `POST /{type}`.
    ///
    /// # Errors
    ///
    /// - 403 without create access or edit access to a submitted field.
    /// - 409 when an entity with the submitted id exists.
    /// - 422 for unknown fields or validation failures.
    pub async fn create_individual(
        &self,
        resource_type: &Arc<ResourceType>,
        body: &[u8],
        request: &RequestContext,
    ) -> JsonApiResult<ResourceResponse> {
        let access = self.policy.create_access(
            resource_type.entity_type_id(),
            resource_type.bundle(),
            self.account,
        );
        if !access.is_allowed() {
            warn!(resource_type = resource_type.type_name(), "Create denied");
            return Err(JsonApiError::AccessDenied {
                message: "The current user is not allowed to POST the selected resource."
                    .to_string(),
                pointer: Some("/data".to_string()),
                reason: access.reason().map(String::from),
                resource: None,
            });
        }

        let document = self.deserializer().deserialize(body, resource_type).await?;
        let id = match document.id {
            Some(id) => {
                validate_client_id(&id)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        if self
            .storage
            .load(resource_type.entity_type_id(), &id)
            .await?
            .is_some()
        {
            return Err(JsonApiError::conflict("Conflict: Entity already exists."));
        }

        let mut entity = Entity::new(resource_type.entity_type_id(), resource_type.bundle(), &id);
        if let Some(definition) = self.schema.entity_type(resource_type.entity_type_id()) {
            entity.sync_keys(definition);
        }
        for submitted in &document.fields {
            let definition = self.field_definition(resource_type, &submitted.internal_name)?;
            let edit = self.policy.field_access(
                FieldOperation::Edit,
                definition,
                self.account,
                Some(&entity),
            );
            if !edit.is_allowed() {
                warn!(field = %submitted.public_name, "Field edit denied on create");
                return Err(field_access_denied("POST", submitted, &edit));
            }
            entity.set(submitted.internal_name.clone(), submitted.items.clone());
        }

        self.validate(resource_type, &entity, None).await?;
        let saved = self.storage.save(entity).await?;
        debug!(
            resource_type = resource_type.type_name(),
            id = saved.uuid(),
            "Created resource"
        );

        let location = self.links.entity_link(resource_type, saved.uuid());
        let links = location
            .as_deref()
            .map(|href| link_map("self", href))
            .unwrap_or_default();
        let document = self
            .individual_document(resource_type, &saved, request, links)
            .await?;
        Ok(ResourceResponse::new(StatusCode::CREATED, document).with_location(location))
    }

    /// `PATCH /{type}/{id}`.
    ///
    /// # Errors
    ///
    /// - 400 when the payload id does not match the entity.
    /// - 403 without update access or for changed non-editable fields.
    /// - 422 for unknown fields or validation failures.
    pub async fn patch_individual(
        &self,
        resource_type: &Arc<ResourceType>,
        mut entity: Entity,
        body: &[u8],
        request: &RequestContext,
    ) -> JsonApiResult<ResourceResponse> {
        self.entity_access(resource_type, &entity, EntityOperation::Update, "PATCH")?;

        let document = self.deserializer().deserialize(body, resource_type).await?;
        if document.id.as_deref() != Some(entity.uuid()) {
            return Err(JsonApiError::bad_request(format!(
                "The selected entity ({}) does not match the ID in the payload ({}).",
                entity.uuid(),
                document.id.as_deref().unwrap_or_default()
            )));
        }

        let mut submitted_names = BTreeSet::new();
        for submitted in &document.fields {
            let definition = self.field_definition(resource_type, &submitted.internal_name)?;
            if self.check_patch_field_access(&entity, definition, submitted)? {
                entity.set(submitted.internal_name.clone(), submitted.items.clone());
                submitted_names.insert(submitted.internal_name.clone());
            }
        }

        self.validate(resource_type, &entity, Some(&submitted_names))
            .await?;
        let saved = self.storage.save(entity).await?;
        debug!(
            resource_type = resource_type.type_name(),
            id = saved.uuid(),
            fields = submitted_names.len(),
            "Patched resource"
        );

        let document = self
            .individual_document(resource_type, &saved, request, self_link(&request.url))
            .await?;
        Ok(ResourceResponse::new(StatusCode::OK, document))
    }

    /// `DELETE /{type}/{id}`.
    ///
    /// # Errors
    ///
    /// Returns access denied without delete access.
    pub async fn delete_individual(
        &self,
        resource_type: &Arc<ResourceType>,
        entity: &Entity,
    ) -> JsonApiResult<ResourceResponse> {
        self.entity_access(resource_type, entity, EntityOperation::Delete, "DELETE")?;
        self.storage.delete(entity).await?;
        debug!(
            resource_type = resource_type.type_name(),
            id = entity.uuid(),
            "Deleted resource"
        );
        Ok(ResourceResponse::no_content())
    }

    /// `POST /{type}/{id}/relationships/{related}`: appends targets.
    ///
    /// Responds 200 with the relationship when the appended targets change
    /// the arity of what was already referenced, 204 otherwise.
    ///
    /// # Errors
    ///
    /// Returns a conflict for to-one relationships.
    pub async fn create_relationship(
        &self,
        resource_type: &Arc<ResourceType>,
        mut entity: Entity,
        public_field: &str,
        body: &[u8],
        request: &RequestContext,
    ) -> JsonApiResult<ResourceResponse> {
        let field = self.editable_relationship(resource_type, &entity, public_field)?;
        if field.has_one() {
            return Err(JsonApiError::conflict(format!(
                "You can only POST to to-many relationships. {} is a to-one relationship.",
                public_field
            )));
        }
        let received = self
            .deserializer()
            .deserialize_relationship(body, resource_type, &field)
            .await?;

        let original = entity.target_ids(field.internal_name());
        let mut items = entity.get(field.internal_name()).to_vec();
        items.extend(received);
        entity.set(field.internal_name().to_string(), items);
        let appended = entity.target_ids(field.internal_name());

        let saved = self
            .save_relationship(resource_type, entity, &field)
            .await?;
        if relationship_arity_is_affected(&original, &appended) {
            let document = self
                .relationship_document(resource_type, &saved, &field, request)
                .await?;
            Ok(ResourceResponse::new(StatusCode::OK, document))
        } else {
            Ok(ResourceResponse::no_content())
        }
    }

    /// `PATCH /{type}/{id}/relationships/{related}`: replaces all targets.
    ///
    /// # Errors
    ///
    /// Returns a bad request for more than one item on a to-one
    /// relationship.
    pub async fn patch_relationship(
        &self,
        resource_type: &Arc<ResourceType>,
        mut entity: Entity,
        public_field: &str,
        body: &[u8],
    ) -> JsonApiResult<ResourceResponse> {
        let field = self.editable_relationship(resource_type, &entity, public_field)?;
        let received = self
            .deserializer()
            .deserialize_relationship(body, resource_type, &field)
            .await?;
        if field.has_one() && received.len() > 1 {
            return Err(JsonApiError::bad_request(format!(
                "The relationship {} is to-one and accepts at most one resource identifier.",
                public_field
            )));
        }
        entity.set(field.internal_name().to_string(), received);
        self.save_relationship(resource_type, entity, &field).await?;
        Ok(ResourceResponse::no_content())
    }

    /// `DELETE /{type}/{id}/relationships/{related}`: removes the given
    /// targets. Targets that are not referenced are ignored.
    ///
    /// # Errors
    ///
    /// Returns a conflict for to-one relationships.
    pub async fn delete_relationship(
        &self,
        resource_type: &Arc<ResourceType>,
        mut entity: Entity,
        public_field: &str,
        body: &[u8],
    ) -> JsonApiResult<ResourceResponse> {
        let field = self.editable_relationship(resource_type, &entity, public_field)?;
        if field.has_one() {
            return Err(JsonApiError::conflict(format!(
                "You can only DELETE from to-many relationships. {} is a to-one relationship.",
                public_field
            )));
        }
        let received = self
            .deserializer()
            .deserialize_relationship(body, resource_type, &field)
            .await?;
        let removed: BTreeSet<String> = target_ids(&received).into_iter().collect();

        let kept: Vec<FieldItem> = entity
            .get(field.internal_name())
            .iter()
            .filter(|item| {
                item.get("target_id")
                    .and_then(Value::as_str)
                    .is_none_or(|id| !removed.contains(id))
            })
            .cloned()
            .collect();
        entity.set(field.internal_name().to_string(), kept);
        self.save_relationship(resource_type, entity, &field).await?;
        Ok(ResourceResponse::no_content())
    }

    /// Decides whether a submitted field may be written on PATCH.
    ///
    /// - Editable: the value is applied (`Ok(true)`), changed or not.
    /// - Not editable, viewable and equal to the stored value: skipped
    ///   (`Ok(false)`).
    /// - Otherwise access is denied. A value the account cannot view is
    ///   treated as changed.
    ///
    /// # Errors
    ///
    /// Returns access denied pointing at the submitted member.
    pub fn check_patch_field_access(
        &self,
        original: &Entity,
        definition: &FieldDefinition,
        received: &SubmittedField,
    ) -> JsonApiResult<bool> {
        let edit = self.policy.field_access(
            FieldOperation::Edit,
            definition,
            self.account,
            Some(original),
        );
        if edit.is_allowed() {
            return Ok(true);
        }

        let view = self.policy.field_access(
            FieldOperation::View,
            definition,
            self.account,
            Some(original),
        );
        if view.is_allowed() && original.get(&received.internal_name) == received.items.as_slice() {
            debug!(field = %received.public_name, "Skipping unchanged non-editable field");
            return Ok(false);
        }

        warn!(field = %received.public_name, "Field edit denied on update");
        Err(field_access_denied("PATCH", received, &edit))
    }

    fn deserializer(&self) -> Deserializer<'_, S> {
        Deserializer::new(self.storage, &self.schema, &self.catalog)
    }

    fn normalizer<'n>(
        &'n self,
        fieldsets: &'n crate::normalizer::SparseFieldsets,
        references: &'n ReferenceIndex,
    ) -> Normalizer<'n> {
        Normalizer::new(
            &self.schema,
            &self.catalog,
            self.policy,
            self.account,
            self.links,
            fieldsets,
            references,
        )
    }

    fn include_tree(
        &self,
        resource_types: &[Arc<ResourceType>],
        params: &QueryParameters,
    ) -> JsonApiResult<IncludeTree> {
        let paths = params.include_paths();
        if paths.is_empty() {
            return Ok(IncludeTree::new());
        }
        let resolver = FieldResolver::new(&self.schema, self.policy, self.account);
        IncludeTree::resolve(&paths, resource_types, &resolver)
    }

    async fn individual_document(
        &self,
        resource_type: &Arc<ResourceType>,
        entity: &Entity,
        request: &RequestContext,
        links: Map<String, Value>,
    ) -> JsonApiResult<JsonApiDocumentTopLevelNormalizerValue> {
        let includes = self.include_tree(&[resource_type.clone()], &request.params)?;
        let references = ReferenceIndex::load(self.storage, &self.schema, &[entity], &includes).await?;
        let fieldsets = request.params.fieldsets();
        let value = self
            .normalizer(&fieldsets, &references)
            .normalize_entity(entity, &includes)?;
        Ok(JsonApiDocumentTopLevelNormalizerValue::new(
            DocumentData::Individual(Arc::new(value)),
            links,
        ))
    }

    async fn collection_document(
        &self,
        resource_types: &[Arc<ResourceType>],
        collection: &EntityCollection,
        request: &RequestContext,
    ) -> JsonApiResult<JsonApiDocumentTopLevelNormalizerValue> {
        let includes = self.include_tree(resource_types, &request.params)?;
        let roots: Vec<&Entity> = collection
            .items()
            .iter()
            .filter_map(|item| match item {
                CollectionItem::Entity(entity) => Some(entity),
                CollectionItem::Denied(_) => None,
            })
            .collect();
        let references = ReferenceIndex::load(self.storage, &self.schema, &roots, &includes).await?;
        let fieldsets = request.params.fieldsets();
        let items: Vec<ResourceObjectValue> = self
            .normalizer(&fieldsets, &references)
            .normalize_collection(collection.items(), &includes)?;
        Ok(JsonApiDocumentTopLevelNormalizerValue::new(
            DocumentData::Collection(items),
            self_link(&request.url),
        ))
    }

    async fn relationship_document(
        &self,
        resource_type: &Arc<ResourceType>,
        entity: &Entity,
        field: &ResourceTypeField,
        request: &RequestContext,
    ) -> JsonApiResult<JsonApiDocumentTopLevelNormalizerValue> {
        let includes = self.include_tree(&[resource_type.clone()], &request.params)?;
        let field_includes = includes.child(field.internal_name()).cloned().unwrap_or_default();
        let references = ReferenceIndex::load(self.storage, &self.schema, &[entity], &includes).await?;
        let fieldsets = request.params.fieldsets();
        let value = self
            .normalizer(&fieldsets, &references)
            .normalize_relationship(entity, field, &field_includes)?;
        Ok(JsonApiDocumentTopLevelNormalizerValue::new(
            DocumentData::Relationship(value),
            Map::new(),
        ))
    }

    fn entity_access(
        &self,
        resource_type: &ResourceType,
        entity: &Entity,
        operation: EntityOperation,
        method: &str,
    ) -> JsonApiResult<AccessResult> {
        let access = self.policy.entity_access(entity, operation, self.account);
        if access.is_allowed() {
            return Ok(access);
        }
        if operation != EntityOperation::View {
            warn!(
                resource_type = resource_type.type_name(),
                id = entity.uuid(),
                operation = %operation,
                "Entity operation denied"
            );
        }
        Err(JsonApiError::entity_access_denied(
            entity,
            resource_type.type_name(),
            &access,
            "/data",
            format!(
                "The current user is not allowed to {} the selected resource.",
                method
            ),
        ))
    }

    fn with_view_access(
        &self,
        resource_type: &ResourceType,
        entities: Vec<Entity>,
    ) -> Vec<CollectionItem> {
        entities
            .into_iter()
            .map(|entity| {
                match self.entity_access(resource_type, &entity, EntityOperation::View, "GET") {
                    Ok(_) => CollectionItem::Entity(entity),
                    Err(error) => CollectionItem::Denied(error),
                }
            })
            .collect()
    }

    fn with_view_access_by_entity(&self, entities: Vec<Entity>) -> Vec<CollectionItem> {
        entities
            .into_iter()
            .filter_map(|entity| {
                let resource_type = self.catalog.get_for_entity(&entity)?;
                Some(
                    match self.entity_access(&resource_type, &entity, EntityOperation::View, "GET") {
                        Ok(_) => CollectionItem::Entity(entity),
                        Err(error) => CollectionItem::Denied(error),
                    },
                )
            })
            .collect()
    }

    fn field_definition(
        &self,
        resource_type: &ResourceType,
        internal_name: &str,
    ) -> JsonApiResult<&FieldDefinition> {
        self.schema
            .field_definition(resource_type.entity_type_id(), resource_type.bundle(), internal_name)
            .ok_or_else(|| {
                JsonApiError::internal(format!(
                    "The field {} has no definition on {}.",
                    internal_name,
                    resource_type.type_name()
                ))
            })
    }

    /// Resolves a relationship the account may view on a viewable entity.
    /// Anything else is reported as not present.
    fn viewable_relationship(
        &self,
        resource_type: &ResourceType,
        entity: &Entity,
        public_field: &str,
    ) -> JsonApiResult<(ResourceTypeField, &FieldDefinition, CacheableMetadata)> {
        let not_present = || {
            JsonApiError::not_found(format!(
                "The relationship {} is not present in this resource.",
                public_field
            ))
        };
        let field = resource_type
            .field_by_public_name(public_field)
            .filter(|f| f.is_enabled() && f.is_relationship())
            .cloned()
            .ok_or_else(not_present)?;
        let definition = self.field_definition(resource_type, field.internal_name())?;

        let access = self
            .policy
            .entity_access(entity, EntityOperation::View, self.account)
            .and_if(self.policy.field_access(
                FieldOperation::View,
                definition,
                self.account,
                Some(entity),
            ));
        if !access.is_allowed() {
            debug!(field = public_field, "Relationship is not viewable");
            return Err(not_present());
        }
        Ok((field, definition, access.cacheability().clone()))
    }

    fn editable_relationship(
        &self,
        resource_type: &ResourceType,
        entity: &Entity,
        public_field: &str,
    ) -> JsonApiResult<ResourceTypeField> {
        let field = resource_type
            .field_by_public_name(public_field)
            .filter(|f| f.is_enabled() && f.is_relationship())
            .cloned()
            .ok_or_else(|| {
                JsonApiError::not_found(format!(
                    "The relationship {} is not present in this resource.",
                    public_field
                ))
            })?;
        self.entity_access(resource_type, entity, EntityOperation::Update, "PATCH")?;

        let definition = self.field_definition(resource_type, field.internal_name())?;
        let edit = self.policy.field_access(
            FieldOperation::Edit,
            definition,
            self.account,
            Some(entity),
        );
        if !edit.is_allowed() {
            warn!(field = public_field, "Relationship edit denied");
            return Err(JsonApiError::AccessDenied {
                message: format!(
                    "The current user is not allowed to PATCH the selected field ({}).",
                    public_field
                ),
                pointer: Some("/data".to_string()),
                reason: edit.reason().map(String::from),
                resource: Some(format!("/{}/{}", resource_type.type_name(), entity.uuid())),
            });
        }
        Ok(field)
    }

    async fn save_relationship(
        &self,
        resource_type: &ResourceType,
        entity: Entity,
        field: &ResourceTypeField,
    ) -> JsonApiResult<Entity> {
        let only = BTreeSet::from([field.internal_name().to_string()]);
        self.validate(resource_type, &entity, Some(&only)).await?;
        let saved = self.storage.save(entity).await?;
        debug!(
            resource_type = resource_type.type_name(),
            id = saved.uuid(),
            field = field.public_name(),
            "Updated relationship"
        );
        Ok(saved)
    }

    /// Validates an entity. Violations on fields the account cannot view
    /// are dropped; with `only`, so are violations on other fields.
    async fn validate(
        &self,
        resource_type: &ResourceType,
        entity: &Entity,
        only: Option<&BTreeSet<String>>,
    ) -> JsonApiResult<()> {
        let violations: Vec<Violation> = self
            .storage
            .validate(entity)
            .await?
            .into_iter()
            .filter(|v| only.is_none_or(|fields| fields.contains(&v.field)))
            .filter(|v| {
                self.schema
                    .field_definition(entity.entity_type(), entity.bundle(), &v.field)
                    .is_some_and(|definition| {
                        self.policy
                            .field_access(FieldOperation::View, definition, self.account, Some(entity))
                            .is_allowed()
                    })
            })
            .collect();
        if violations.is_empty() {
            return Ok(());
        }

        debug!(count = violations.len(), "Entity validation failed");
        Err(JsonApiError::UnprocessableEntity {
            violations: violations
                .iter()
                .map(|violation| {
                    let pointer = resource_type.field(&violation.field).map(|field| {
                        let member = match field.kind() {
                            FieldKind::Attribute => "attributes",
                            FieldKind::Relationship => "relationships",
                        };
                        format!("/data/{}/{}", member, field.public_name())
                    });
                    ErrorViolation::new(
                        format!("{}: {}", violation.property_path, violation.message),
                        pointer,
                    )
                })
                .collect(),
        })
    }
}

/// Returns true when a relationship change alters the arity of a target
/// that was already referenced: the number of references changed and the
/// old and new target sets intersect.
pub fn relationship_arity_is_affected(old: &[String], new: &[String]) -> bool {
    old.len() != new.len() && old.iter().any(|id| new.contains(id))
}

fn target_ids(items: &[FieldItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.get("target_id").and_then(Value::as_str))
        .map(String::from)
        .collect()
}

fn field_access_denied(method: &str, field: &SubmittedField, access: &AccessResult) -> JsonApiError {
    JsonApiError::AccessDenied {
        message: format!(
            "The current user is not allowed to {} the selected field ({}).",
            method, field.public_name
        ),
        pointer: Some(field.pointer()),
        reason: access.reason().map(String::from),
        resource: None,
    }
}

fn link_map(name: &str, href: &str) -> Map<String, Value> {
    let mut links = Map::new();
    links.insert(name.to_string(), json!({ "href": href }));
    links
}

fn self_link(url: &Url) -> Map<String, Value> {
    link_map("self", url.as_str())
}

fn query_args_context() -> CacheableMetadata {
    CacheableMetadata::new().with_contexts([QUERY_ARGS_CACHE_CONTEXT])
}
