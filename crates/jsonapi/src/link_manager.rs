//! URL generation for resources, relationships and pagers.

use serde_json::{Map, Value, json};
use url::Url;

use crate::error::{JsonApiError, JsonApiResult};
use crate::query::OffsetPage;
use crate::resource_type::ResourceType;

const OFFSET_PARAM: &str = "page[offset]";
const SIZE_PARAM: &str = "page[limit]";

/// Builds absolute links under the configured base URL and path.
#[derive(Debug, Clone)]
pub struct LinkManager {
    base_url: String,
    base_path: String,
}

impl LinkManager {
    /// Creates a link manager. `base_path` is expected without a trailing
    /// slash (empty for the server root).
    pub fn new(base_url: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            base_path: base_path.into(),
        }
    }

    /// Returns the base path.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Returns the absolute URL of a path relative to the server root.
    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Returns the entry point URL.
    pub fn entry_point_url(&self) -> String {
        self.absolute(if self.base_path.is_empty() {
            "/"
        } else {
            &self.base_path
        })
    }

    /// Returns the collection URL of a resource type.
    pub fn collection_url(&self, resource_type: &ResourceType) -> String {
        format!(
            "{}{}/{}/{}",
            self.base_url,
            self.base_path,
            resource_type.entity_type_id(),
            resource_type.bundle()
        )
    }

    /// Returns the URL of an individual resource, or `None` when the type has
    /// no individual route.
    pub fn entity_link(&self, resource_type: &ResourceType, id: &str) -> Option<String> {
        resource_type
            .is_locatable()
            .then(|| format!("{}/{}", self.collection_url(resource_type), id))
    }

    /// Returns the related resource URL of a relationship field.
    pub fn related_link(
        &self,
        resource_type: &ResourceType,
        id: &str,
        public_field: &str,
    ) -> Option<String> {
        self.entity_link(resource_type, id)
            .map(|link| format!("{}/{}", link, public_field))
    }

    /// Returns the relationship URL of a relationship field.
    pub fn relationship_link(
        &self,
        resource_type: &ResourceType,
        id: &str,
        public_field: &str,
    ) -> Option<String> {
        self.entity_link(resource_type, id)
            .map(|link| format!("{}/relationships/{}", link, public_field))
    }

    /// Builds `next`, `last`, `first` and `prev` links for a collection page.
    ///
    /// `next` requires a known next page, `last` additionally a non-zero
    /// total, and `first`/`prev` a non-zero offset. Every other query
    /// parameter of `request_url` is kept.
    ///
    /// # Errors
    ///
    /// Returns a bad request when the page size is not positive.
    pub fn pager_links(
        &self,
        request_url: &Url,
        page: &OffsetPage,
        has_next_page: bool,
        total: Option<usize>,
    ) -> JsonApiResult<Map<String, Value>> {
        let size = page.size();
        let offset = page.offset();
        if size == 0 {
            return Err(JsonApiError::bad_request(
                "The page size needs to be a positive integer.",
            ));
        }

        let mut links = Map::new();
        if has_next_page {
            links.insert(
                "next".to_string(),
                href(pager_url(request_url, offset + size, size)),
            );
            if let Some(total) = total.filter(|t| *t > 0) {
                let last = (total.div_ceil(size) - 1) * size;
                links.insert("last".to_string(), href(pager_url(request_url, last, size)));
            }
        }
        if offset > 0 {
            links.insert("first".to_string(), href(pager_url(request_url, 0, size)));
            links.insert(
                "prev".to_string(),
                href(pager_url(request_url, offset.saturating_sub(size), size)),
            );
        }
        Ok(links)
    }
}

fn href(url: String) -> Value {
    json!({ "href": url })
}

fn pager_url(request_url: &Url, offset: usize, size: usize) -> String {
    let kept: Vec<(String, String)> = request_url
        .query_pairs()
        .filter(|(key, _)| key != OFFSET_PARAM && key != SIZE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = request_url.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(OFFSET_PARAM, &offset.to_string())
        .append_pair(SIZE_PARAM, &size.to_string());
    url.to_string()
}
