//! Request orchestration.
//!
//! [`EntityResource`] turns one routed request into storage calls and a
//! normalized document. Handlers only extract inputs and build it.

pub mod entity_resource;

pub use entity_resource::{
    EntityResource, PageLimits, QUERY_ARGS_CACHE_CONTEXT, RequestContext,
    relationship_arity_is_affected,
};
