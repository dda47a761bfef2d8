use serde::{Deserialize, Serialize};

/// Whether the current session is bound by the free-tier entry ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTier {
    #[default]
    Free,
    Premium,
}

impl SessionTier {
    pub fn from_label(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "premium" | "pro" | "paid" => Self::Premium,
            _ => Self::Free,
        }
    }

    pub const fn is_premium(self) -> bool {
        matches!(self, Self::Premium)
    }
}

/// Stateless entry-count ceiling for free sessions. Never consulted on removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaGuard {
    limit: usize,
}

impl QuotaGuard {
    pub const FREE_LIMIT: usize = 20;

    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn can_add(&self, current_count: usize, count_to_add: usize, tier: SessionTier) -> bool {
        tier.is_premium() || current_count.saturating_add(count_to_add) <= self.limit
    }

    /// Slots still open for a free session; `None` means unbounded.
    pub fn remaining(&self, current_count: usize, tier: SessionTier) -> Option<usize> {
        if tier.is_premium() {
            None
        } else {
            Some(self.limit.saturating_sub(current_count))
        }
    }

    /// Classifies a denied request so callers can tell "upgrade" from "pick fewer".
    pub fn check(
        &self,
        current_count: usize,
        count_to_add: usize,
        tier: SessionTier,
    ) -> QuotaDecision {
        if self.can_add(current_count, count_to_add, tier) {
            return QuotaDecision::Allowed;
        }

        match self.limit.saturating_sub(current_count) {
            0 => QuotaDecision::Exhausted { limit: self.limit },
            remaining => QuotaDecision::Partial {
                remaining,
                requested: count_to_add,
            },
        }
    }
}

impl Default for QuotaGuard {
    fn default() -> Self {
        Self::new(Self::FREE_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Exhausted { limit: usize },
    Partial { remaining: usize, requested: usize },
}
