//! Cacheability metadata.
//!
//! Every rendered value and every access result carries a
//! [`CacheableMetadata`]: the request contexts the value varies by, the
//! tags that invalidate it and how long it may be cached. Merging is a
//! monoid (union of sets, minimum of max-ages, identity is
//! [`CacheableMetadata::default`]).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// How long a value may be cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxAge {
    /// Cacheable until one of its tags is invalidated.
    #[default]
    Permanent,
    /// Cacheable for at most this many seconds. Zero means uncacheable.
    Seconds(u32),
}

impl MaxAge {
    /// Returns the stricter of the two max-ages.
    pub fn min(self, other: MaxAge) -> MaxAge {
        match (self, other) {
            (MaxAge::Permanent, other) => other,
            (this, MaxAge::Permanent) => this,
            (MaxAge::Seconds(a), MaxAge::Seconds(b)) => MaxAge::Seconds(a.min(b)),
        }
    }

    /// Returns the max-age in seconds, bounded by `ceiling` when permanent.
    pub fn as_seconds(self, ceiling: u32) -> u32 {
        match self {
            MaxAge::Permanent => ceiling,
            MaxAge::Seconds(seconds) => seconds.min(ceiling),
        }
    }
}

/// Cache contexts, cache tags and max-age of a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheableMetadata {
    contexts: BTreeSet<String>,
    tags: BTreeSet<String>,
    max_age: MaxAge,
}

impl CacheableMetadata {
    /// Creates empty, permanently cacheable metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates metadata that must never be cached.
    pub fn uncacheable() -> Self {
        Self {
            max_age: MaxAge::Seconds(0),
            ..Self::default()
        }
    }

    /// Adds cache contexts.
    pub fn with_contexts<I, T>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    /// Adds cache tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Lowers the max-age.
    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = self.max_age.min(max_age);
        self
    }

    /// Adds one cache context in place.
    pub fn add_context(&mut self, context: impl Into<String>) {
        self.contexts.insert(context.into());
    }

    /// Adds one cache tag in place.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Merges another value's metadata into this one.
    pub fn add_dependency(&mut self, other: &CacheableMetadata) {
        self.contexts.extend(other.contexts.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
        self.max_age = self.max_age.min(other.max_age);
    }

    /// Returns the merge of both values.
    pub fn merge(&self, other: &CacheableMetadata) -> CacheableMetadata {
        let mut merged = self.clone();
        merged.add_dependency(other);
        merged
    }

    /// Merges an iterator of metadata into one.
    pub fn merge_all<'a, I>(items: I) -> CacheableMetadata
    where
        I: IntoIterator<Item = &'a CacheableMetadata>,
    {
        items
            .into_iter()
            .fold(CacheableMetadata::default(), |mut acc, item| {
                acc.add_dependency(item);
                acc
            })
    }

    /// Returns the cache contexts.
    pub fn contexts(&self) -> &BTreeSet<String> {
        &self.contexts
    }

    /// Returns the cache tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns the max-age.
    pub fn max_age(&self) -> MaxAge {
        self.max_age
    }

    /// Returns false when the max-age is zero.
    pub fn is_cacheable(&self) -> bool {
        self.max_age != MaxAge::Seconds(0)
    }
}

/// Anything that exposes cacheability metadata.
pub trait Cacheable {
    /// Returns the metadata of this value.
    fn cacheability(&self) -> &CacheableMetadata;
}

impl Cacheable for CacheableMetadata {
    fn cacheability(&self) -> &CacheableMetadata {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_age_min() {
        assert_eq!(MaxAge::Permanent.min(MaxAge::Permanent), MaxAge::Permanent);
        assert_eq!(
            MaxAge::Permanent.min(MaxAge::Seconds(10)),
            MaxAge::Seconds(10)
        );
        assert_eq!(MaxAge::Seconds(5).min(MaxAge::Seconds(10)), MaxAge::Seconds(5));
        assert_eq!(MaxAge::Seconds(5).as_seconds(3), 3);
        assert_eq!(MaxAge::Permanent.as_seconds(60), 60);
    }

    #[test]
    fn test_merge_unions_sets() {
        let a = CacheableMetadata::new()
            .with_tags(["node:1"])
            .with_contexts(["user.permissions"]);
        let b = CacheableMetadata::new()
            .with_tags(["node:2", "node:1"])
            .with_max_age(MaxAge::Seconds(30));

        let merged = a.merge(&b);
        assert_eq!(merged.tags().len(), 2);
        assert!(merged.contexts().contains("user.permissions"));
        assert_eq!(merged.max_age(), MaxAge::Seconds(30));
    }

    #[test]
    fn test_merge_identity() {
        let a = CacheableMetadata::new().with_tags(["x"]);
        assert_eq!(a.merge(&CacheableMetadata::default()), a);
        assert_eq!(CacheableMetadata::default().merge(&a), a);
    }

    #[test]
    fn test_merge_all() {
        let items = vec![
            CacheableMetadata::new().with_tags(["a"]),
            CacheableMetadata::uncacheable(),
            CacheableMetadata::new().with_contexts(["url.query_args"]),
        ];
        let merged = CacheableMetadata::merge_all(&items);
        assert!(!merged.is_cacheable());
        assert!(merged.tags().contains("a"));
        assert!(merged.contexts().contains("url.query_args"));
    }
}
