//! Subscription-derived row visibility.
//!
//! Pure and deterministic for a given input, so the "N universities
//! hidden" banner and the materialized row set can never disagree.

use serde::{Deserialize, Serialize};
use uniboard_core::SubscriptionStatus;

/// Rows a lapsed non-premium user may still see.
pub const FREE_ROW_LIMIT: usize = 3;

/// Subscription state relevant to row visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    pub subscription: SubscriptionStatus,
    pub is_premium: bool,
}

impl VisibilityPolicy {
    pub fn new(subscription: SubscriptionStatus, is_premium: bool) -> Self {
        Self {
            subscription,
            is_premium,
        }
    }

    /// Whether the row cap applies.
    pub fn limited(&self) -> bool {
        self.subscription == SubscriptionStatus::Expired && !self.is_premium
    }

    /// Number of visible rows out of `total`.
    pub fn visible_count(&self, total: usize) -> usize {
        if self.limited() {
            total.min(FREE_ROW_LIMIT)
        } else {
            total
        }
    }
}

/// Split an ordered row list into the visible prefix and a hidden count.
pub fn visible_slice<'a, T>(rows: &'a [T], policy: &VisibilityPolicy) -> (&'a [T], usize) {
    let count = policy.visible_count(rows.len());
    (&rows[..count], rows.len() - count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_non_premium_sees_three() {
        let rows = ["a", "b", "c", "d", "e"];
        let policy = VisibilityPolicy::new(SubscriptionStatus::Expired, false);
        let (visible, hidden) = visible_slice(&rows, &policy);
        assert_eq!(visible, &["a", "b", "c"]);
        assert_eq!(hidden, 2);
    }

    #[test]
    fn test_premium_sees_all() {
        let rows = ["a", "b", "c", "d", "e"];
        let policy = VisibilityPolicy::new(SubscriptionStatus::Expired, true);
        let (visible, hidden) = visible_slice(&rows, &policy);
        assert_eq!(visible.len(), 5);
        assert_eq!(hidden, 0);
    }

    #[test]
    fn test_active_subscription_sees_all() {
        let rows = ["a", "b", "c", "d", "e"];
        let policy = VisibilityPolicy::new(SubscriptionStatus::Active, false);
        let (visible, hidden) = visible_slice(&rows, &policy);
        assert_eq!(visible.len(), 5);
        assert_eq!(hidden, 0);
    }

    #[test]
    fn test_fewer_rows_than_limit() {
        let rows = ["a", "b"];
        let policy = VisibilityPolicy::new(SubscriptionStatus::Expired, false);
        let (visible, hidden) = visible_slice(&rows, &policy);
        assert_eq!(visible.len(), 2);
        assert_eq!(hidden, 0);
    }
}
