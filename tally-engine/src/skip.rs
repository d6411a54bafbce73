//! Skip policies
//!
//! A skip policy is a pure decision over an [`ErrorKind`] and the number of
//! items already skipped in the current step. The [`SkipCounter`] owns that
//! number and never lets it exceed the policy's limit.

use std::collections::HashSet;
use tracing::warn;

use crate::error::{BatchError, ErrorKind, ItemError};

/// What to do with a failed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    Skip,
    NotSkippable,
    LimitExceeded,
}

/// Decides whether a failed item may be dropped
pub trait SkipPolicy: Send + Sync {
    fn is_skippable(&self, kind: ErrorKind) -> bool;

    /// Maximum number of skips per step; reaching it is allowed
    fn skip_limit(&self) -> u32;

    fn decide(&self, kind: ErrorKind, skipped_so_far: u32) -> SkipDecision {
        if !self.is_skippable(kind) {
            SkipDecision::NotSkippable
        } else if skipped_so_far.saturating_add(1) > self.skip_limit() {
            SkipDecision::LimitExceeded
        } else {
            SkipDecision::Skip
        }
    }
}

/// Skips a fixed set of error kinds up to a limit
#[derive(Debug, Clone)]
pub struct LimitCheckingSkipPolicy {
    skippable: HashSet<ErrorKind>,
    limit: u32,
}

impl LimitCheckingSkipPolicy {
    /// Policy that skips nothing until kinds are added with [`skip`](Self::skip)
    pub fn new(limit: u32) -> Self {
        Self {
            skippable: HashSet::new(),
            limit,
        }
    }

    /// Policy skipping only value validation failures
    pub fn validation(limit: u32) -> Self {
        Self::new(limit).skip(ErrorKind::Validation)
    }

    pub fn skip(mut self, kind: ErrorKind) -> Self {
        self.skippable.insert(kind);
        self
    }
}

impl SkipPolicy for LimitCheckingSkipPolicy {
    fn is_skippable(&self, kind: ErrorKind) -> bool {
        self.skippable.contains(&kind)
    }

    fn skip_limit(&self) -> u32 {
        self.limit
    }
}

/// Policy for steps without fault tolerance
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSkipPolicy;

impl SkipPolicy for NeverSkipPolicy {
    fn is_skippable(&self, _kind: ErrorKind) -> bool {
        false
    }

    fn skip_limit(&self) -> u32 {
        0
    }
}

/// Number of items skipped so far in one step execution
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SkipCounter {
    skipped: u32,
}

impl SkipCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.skipped
    }

    /// Records a skip of `error` if the policy allows it
    ///
    /// The counter is left unchanged when the error is fatal.
    pub fn try_skip(&mut self, policy: &dyn SkipPolicy, error: ItemError) -> Result<(), BatchError> {
        match policy.decide(error.kind, self.skipped) {
            SkipDecision::Skip => {
                self.skipped += 1;
                warn!(
                    "Skipping item ({}/{}): {}",
                    self.skipped,
                    policy.skip_limit(),
                    error
                );
                Ok(())
            }
            SkipDecision::NotSkippable => Err(BatchError::NonSkippable(error)),
            SkipDecision::LimitExceeded => Err(BatchError::SkipLimitExceeded {
                limit: policy.skip_limit(),
                cause: error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_policy_only_skips_validation() {
        let policy = LimitCheckingSkipPolicy::validation(3);
        assert!(policy.is_skippable(ErrorKind::Validation));
        assert!(!policy.is_skippable(ErrorKind::MalformedRecord));
        assert!(!policy.is_skippable(ErrorKind::Io));
        assert!(!policy.is_skippable(ErrorKind::Write));
    }

    #[test]
    fn test_decide_allows_reaching_the_limit() {
        let policy = LimitCheckingSkipPolicy::validation(3);
        assert_eq!(policy.decide(ErrorKind::Validation, 0), SkipDecision::Skip);
        assert_eq!(policy.decide(ErrorKind::Validation, 2), SkipDecision::Skip);
        assert_eq!(
            policy.decide(ErrorKind::Validation, 3),
            SkipDecision::LimitExceeded
        );
        assert_eq!(
            policy.decide(ErrorKind::Io, 0),
            SkipDecision::NotSkippable
        );
    }

    #[test]
    fn test_zero_limit_never_skips() {
        let policy = LimitCheckingSkipPolicy::validation(0);
        assert_eq!(
            policy.decide(ErrorKind::Validation, 0),
            SkipDecision::LimitExceeded
        );
    }

    #[test]
    fn test_never_skip_policy() {
        assert_eq!(
            NeverSkipPolicy.decide(ErrorKind::Validation, 0),
            SkipDecision::NotSkippable
        );
    }

    #[test]
    fn test_counter_stops_at_limit() {
        let policy = LimitCheckingSkipPolicy::validation(2);
        let mut counter = SkipCounter::new();

        assert!(counter.try_skip(&policy, ItemError::validation("a")).is_ok());
        assert!(counter.try_skip(&policy, ItemError::validation("b")).is_ok());
        let err = counter
            .try_skip(&policy, ItemError::validation("c"))
            .unwrap_err();

        assert!(matches!(err, BatchError::SkipLimitExceeded { limit: 2, .. }));
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_counter_unchanged_on_non_skippable() {
        let policy = LimitCheckingSkipPolicy::validation(5);
        let mut counter = SkipCounter::new();

        let err = counter
            .try_skip(&policy, ItemError::malformed("expected 5 fields"))
            .unwrap_err();

        assert!(matches!(err, BatchError::NonSkippable(_)));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_custom_kinds() {
        let policy = LimitCheckingSkipPolicy::new(1).skip(ErrorKind::MalformedRecord);
        assert!(policy.is_skippable(ErrorKind::MalformedRecord));
        assert!(!policy.is_skippable(ErrorKind::Validation));
    }
}
