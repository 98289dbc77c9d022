//! Access results.

use crate::cache::CacheableMetadata;

/// The outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Access is granted.
    Allowed,
    /// No opinion; treated as denied unless another check allows.
    Neutral,
    /// Access is explicitly denied.
    Forbidden,
}

/// An access check result with an optional reason and the cacheability
/// of the decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessResult {
    outcome: AccessOutcome,
    reason: Option<String>,
    cacheability: CacheableMetadata,
}

impl AccessResult {
    fn with_outcome(outcome: AccessOutcome) -> Self {
        Self {
            outcome,
            reason: None,
            cacheability: CacheableMetadata::default(),
        }
    }

    /// An allowed result.
    pub fn allowed() -> Self {
        Self::with_outcome(AccessOutcome::Allowed)
    }

    /// A neutral result.
    pub fn neutral() -> Self {
        Self::with_outcome(AccessOutcome::Neutral)
    }

    /// A forbidden result.
    pub fn forbidden() -> Self {
        Self::with_outcome(AccessOutcome::Forbidden)
    }

    /// Allowed if the condition holds, neutral otherwise.
    pub fn allowed_if(condition: bool) -> Self {
        if condition {
            Self::allowed()
        } else {
            Self::neutral()
        }
    }

    /// Forbidden if the condition holds, neutral otherwise.
    pub fn forbidden_if(condition: bool) -> Self {
        if condition {
            Self::forbidden()
        } else {
            Self::neutral()
        }
    }

    /// Attaches a human-readable reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds a cache context the decision varies by.
    pub fn with_cache_context(mut self, context: impl Into<String>) -> Self {
        self.cacheability.add_context(context);
        self
    }

    /// Merges cacheability the decision depends on.
    pub fn with_cacheability(mut self, cacheability: &CacheableMetadata) -> Self {
        self.cacheability.add_dependency(cacheability);
        self
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> AccessOutcome {
        self.outcome
    }

    /// Returns true if access is allowed.
    pub fn is_allowed(&self) -> bool {
        self.outcome == AccessOutcome::Allowed
    }

    /// Returns true if access is neutral.
    pub fn is_neutral(&self) -> bool {
        self.outcome == AccessOutcome::Neutral
    }

    /// Returns true if access is forbidden.
    pub fn is_forbidden(&self) -> bool {
        self.outcome == AccessOutcome::Forbidden
    }

    /// Returns the reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref().filter(|r| !r.is_empty())
    }

    /// Returns the cacheability of the decision.
    pub fn cacheability(&self) -> &CacheableMetadata {
        &self.cacheability
    }

    /// Combines two results where both must allow.
    ///
    /// Forbidden wins over neutral, which wins over allowed. The reason of
    /// the deciding result is kept; cacheability is always merged.
    pub fn and_if(self, other: AccessResult) -> AccessResult {
        let cacheability = self.cacheability.merge(&other.cacheability);
        let (outcome, reason) = if self.is_forbidden() || (!other.is_forbidden() && self.is_neutral()) {
            (self.outcome, self.reason)
        } else if !other.is_allowed() {
            (other.outcome, other.reason)
        } else {
            (AccessOutcome::Allowed, None)
        };
        AccessResult {
            outcome,
            reason,
            cacheability,
        }
    }

    /// Combines two results where either may allow.
    ///
    /// Forbidden still wins; otherwise allowed wins over neutral.
    pub fn or_if(self, other: AccessResult) -> AccessResult {
        let cacheability = self.cacheability.merge(&other.cacheability);
        let (outcome, reason) = if self.is_forbidden() {
            (self.outcome, self.reason)
        } else if other.is_forbidden() {
            (other.outcome, other.reason)
        } else if self.is_allowed() || other.is_allowed() {
            (AccessOutcome::Allowed, None)
        } else {
            (AccessOutcome::Neutral, self.reason.or(other.reason))
        };
        AccessResult {
            outcome,
            reason,
            cacheability,
        }
    }
}
