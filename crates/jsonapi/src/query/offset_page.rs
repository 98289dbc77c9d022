//! The `page` query parameter.

use helios_entity::query::EntityQuery;
use serde_json::{Value, json};

use crate::error::{JsonApiError, JsonApiResult};

/// Default offset.
pub const DEFAULT_OFFSET: usize = 0;

/// Default and maximum page size.
pub const SIZE_MAX: usize = 50;

/// Query metadata key carrying the requested page size.
pub const PAGER_SIZE_METADATA: &str = "pager_size";

const OFFSET_KEY: &str = "offset";
const SIZE_KEY: &str = "limit";

/// An offset/size page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPage {
    offset: usize,
    size: usize,
}

impl Default for OffsetPage {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            size: SIZE_MAX,
        }
    }
}

impl OffsetPage {
    /// Creates a page.
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// Returns the offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the page size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Parses `page[offset]` and `page[limit]`.
    ///
    /// Missing members take the defaults; sizes above `max_size` are clamped.
    ///
    /// # Errors
    ///
    /// Returns a bad request when the parameter is not keyed, the offset is
    /// not a non-negative integer, or the size is not a positive integer.
    pub fn from_query_parameter(
        parameter: Option<&Value>,
        default_size: usize,
        max_size: usize,
    ) -> JsonApiResult<Self> {
        let Some(parameter) = parameter else {
            return Ok(Self::new(DEFAULT_OFFSET, default_size.min(max_size)));
        };
        let Value::Object(page) = parameter else {
            return Err(JsonApiError::bad_request(
                "The page parameter needs to be an array.",
            ));
        };

        let offset = match page.get(OFFSET_KEY) {
            None => DEFAULT_OFFSET,
            Some(value) => parse_integer(value)
                .and_then(|o| usize::try_from(o).ok())
                .ok_or_else(|| {
                    JsonApiError::bad_request("The page offset needs to be a non-negative integer.")
                })?,
        };

        let size = match page.get(SIZE_KEY) {
            None => default_size,
            Some(value) => parse_integer(value)
                .filter(|s| *s > 0)
                .and_then(|s| usize::try_from(s).ok())
                .ok_or_else(|| {
                    JsonApiError::bad_request("The page size needs to be a positive integer.")
                })?,
        };

        Ok(Self::new(offset, size.min(max_size)))
    }

    /// Requests one row beyond the page so the caller can detect a next page,
    /// and records the page size for pager links.
    pub fn apply_to(&self, query: &mut EntityQuery) {
        query.range(self.offset, self.size + 1);
        query.add_metadata(PAGER_SIZE_METADATA, json!(self.size));
    }
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
