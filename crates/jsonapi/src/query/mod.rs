//! Query parameter value objects.
//!
//! - [`QueryParameters`]: the decoded query string.
//! - [`Filter`]: the `filter` condition tree.
//! - [`Sort`]: the `sort` keys.
//! - [`OffsetPage`]: the `page` window.
//! - [`EntityCollection`]: a loaded page of results.

mod entity_collection;
mod filter;
mod offset_page;
mod parameters;
mod sort;

pub use entity_collection::{CollectionItem, EntityCollection};
pub use filter::{EntityCondition, EntityConditionGroup, Filter, FilterMember, ROOT_ID};
pub use offset_page::{DEFAULT_OFFSET, OffsetPage, PAGER_SIZE_METADATA, SIZE_MAX};
pub use parameters::QueryParameters;
pub use sort::{Sort, SortField};
