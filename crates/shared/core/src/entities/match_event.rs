use serde::{Deserialize, Serialize};

use super::rule::{AlertRule, RuleTarget};
use super::trade::TradeRecord;
use crate::values::{OwnerId, RuleId, Timestamp, TradeId};

/// Identity of a match: one rule, one trade
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchKey {
    pub rule_id: RuleId,
    pub trade_id: TradeId,
}

impl MatchKey {
    pub fn new(rule_id: RuleId, trade_id: impl Into<TradeId>) -> Self {
        Self {
            rule_id,
            trade_id: trade_id.into(),
        }
    }
}

impl std::fmt::Display for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.rule_id, self.trade_id)
    }
}

/// The fact that one rule's criteria were satisfied by one trade
///
/// Carries a snapshot of the rule (name and criteria at match time) and of the
/// trade, so rendering and history never depend on later rule edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub rule_id: RuleId,
    pub owner_id: OwnerId,
    pub rule_name: String,
    pub criteria: RuleTarget,
    pub trade: TradeRecord,
    pub matched_at: Timestamp,
}

impl MatchEvent {
    pub fn new(rule: &AlertRule, trade: &TradeRecord, matched_at: Timestamp) -> Self {
        Self {
            rule_id: rule.id,
            owner_id: rule.owner_id,
            rule_name: rule.name.clone(),
            criteria: rule.target.clone(),
            trade: trade.clone(),
            matched_at,
        }
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.rule_id, self.trade.id.clone())
    }

    pub fn trade_id(&self) -> &str {
        &self.trade.id
    }
}

/// High-water mark of processed ingestion timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCursor {
    pub last_ingested_at: Option<Timestamp>,
}

impl MatchCursor {
    pub fn at(ts: Timestamp) -> Self {
        Self {
            last_ingested_at: Some(ts),
        }
    }

    /// True if a trade ingested at `ts` lies strictly below the cursor
    pub fn is_behind(&self, ts: Timestamp) -> bool {
        self.last_ingested_at.is_some_and(|last| ts < last)
    }

    /// Cursor advanced to `ts`; never moves backwards
    pub fn advanced_to(self, ts: Timestamp) -> Self {
        match self.last_ingested_at {
            Some(last) if last >= ts => self,
            _ => Self::at(ts),
        }
    }

    /// The later of two cursors
    pub fn max(self, other: Self) -> Self {
        match other.last_ingested_at {
            Some(ts) => self.advanced_to(ts),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_cursor_is_monotonic() {
        let t0 = Utc::now();
        let cursor = MatchCursor::at(t0);
        assert_eq!(cursor.advanced_to(t0 - Duration::seconds(5)), cursor);
        assert_eq!(
            cursor.advanced_to(t0 + Duration::seconds(5)).last_ingested_at,
            Some(t0 + Duration::seconds(5))
        );
        assert_eq!(MatchCursor::default().max(cursor), cursor);
    }

    #[test]
    fn test_cursor_behind_is_strict() {
        let t0 = Utc::now();
        let cursor = MatchCursor::at(t0);
        assert!(cursor.is_behind(t0 - Duration::milliseconds(1)));
        assert!(!cursor.is_behind(t0));
        assert!(!MatchCursor::default().is_behind(t0));
    }
}
