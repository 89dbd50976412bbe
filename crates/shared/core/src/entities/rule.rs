use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::values::{Amount, MemberId, OwnerId, RuleId, Ticker, Timestamp};

/// Kind of alert rule, derived from its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    MemberTrade,
    AmountThreshold,
    TickerTrade,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::MemberTrade => write!(f, "member"),
            RuleKind::AmountThreshold => write!(f, "amount"),
            RuleKind::TickerTrade => write!(f, "ticker"),
        }
    }
}

/// What a rule watches for. Exactly one target per rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleTarget {
    /// Any trade reported by this member
    Member(MemberId),
    /// Any trade in this ticker (compared case-insensitively)
    Ticker(Ticker),
    /// Any trade whose amount is at least this much
    Threshold(Amount),
}

impl RuleTarget {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleTarget::Member(_) => RuleKind::MemberTrade,
            RuleTarget::Ticker(_) => RuleKind::TickerTrade,
            RuleTarget::Threshold(_) => RuleKind::AmountThreshold,
        }
    }
}

impl std::fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleTarget::Member(id) => write!(f, "member {}", id),
            RuleTarget::Ticker(t) => write!(f, "ticker {}", t.to_uppercase()),
            RuleTarget::Threshold(min) => write!(f, "amount >= ${}", min),
        }
    }
}

/// User-defined alert rule
///
/// Only `name` and `active` change after creation. The target is fixed, so a
/// rule that needs new criteria is paused and replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: RuleId,
    pub owner_id: OwnerId,
    pub target: RuleTarget,
    pub name: String,
    pub active: bool,
    pub created_at: Timestamp,
}

impl AlertRule {
    /// Create a new active rule with explicit timestamp
    pub fn new_with_time(
        owner_id: OwnerId,
        name: impl Into<String>,
        target: RuleTarget,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            target,
            name: name.into(),
            active: true,
            created_at,
        }
    }

    /// Create a new active rule using current system time
    pub fn new(owner_id: OwnerId, name: impl Into<String>, target: RuleTarget) -> Self {
        Self::new_with_time(owner_id, name, target, Utc::now())
    }

    pub fn member(owner_id: OwnerId, name: impl Into<String>, member_id: impl Into<MemberId>) -> Self {
        Self::new(owner_id, name, RuleTarget::Member(member_id.into()))
    }

    pub fn ticker(owner_id: OwnerId, name: impl Into<String>, ticker: impl Into<Ticker>) -> Self {
        Self::new(owner_id, name, RuleTarget::Ticker(ticker.into()))
    }

    pub fn threshold(owner_id: OwnerId, name: impl Into<String>, min: Amount) -> Self {
        Self::new(owner_id, name, RuleTarget::Threshold(min))
    }

    pub fn kind(&self) -> RuleKind {
        self.target.kind()
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}
