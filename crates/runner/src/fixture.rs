//! Seed data for local runs
//!
//! A fixture is a JSON document with rules, preferences and trades that the
//! `herald` binary loads into its in-memory stores before the first pass:
//!
//! ```json
//! {
//!   "rules": [
//!     { "owner_id": "…", "name": "Big trades", "target": { "kind": "threshold", "value": "100000" } }
//!   ],
//!   "preferences": [
//!     { "owner_id": "…", "email": "ana@example.com", "frequency": "daily_digest" }
//!   ],
//!   "trades": [
//!     { "id": "T-1", "member_id": "P000197", "member_name": "Nancy Pelosi", "ticker": "NVDA",
//!       "transaction_type": "purchase", "amount": { "exact": "250000" },
//!       "ingested_at": "2024-05-06T14:00:00Z" }
//!   ]
//! }
//! ```

use std::path::Path;

use chrono::Utc;
use herald_core::{AlertRule, NotificationPreference, OwnerId, RuleId, RuleTarget, TradeRecord};
use log::info;
use serde::Deserialize;

use crate::engine::MemoryBackend;
use crate::error::{EngineError, Result};

/// Rule as written in a fixture; id and creation time are optional
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRule {
    #[serde(default)]
    pub id: Option<RuleId>,
    pub owner_id: OwnerId,
    pub name: String,
    pub target: RuleTarget,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl FixtureRule {
    fn into_rule(self) -> AlertRule {
        let mut rule = AlertRule::new_with_time(self.owner_id, self.name, self.target, Utc::now());
        if let Some(id) = self.id {
            rule.id = id;
        }
        rule.set_active(self.active);
        rule
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub rules: Vec<FixtureRule>,
    pub preferences: Vec<NotificationPreference>,
    pub trades: Vec<TradeRecord>,
}

impl Fixture {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Fixture(format!("failed to read '{}': {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Fixture(e.to_string()))
    }

    /// Load everything into `backend`
    pub fn load_into(self, backend: &MemoryBackend) -> Result<()> {
        let (rules, preferences, trades) = (self.rules.len(), self.preferences.len(), self.trades.len());

        for rule in self.rules {
            backend.catalog.create_rule(rule.into_rule())?;
        }
        for preference in self.preferences {
            backend.catalog.upsert_preference(preference);
        }
        backend.trades.ingest_all(self.trades);

        info!(
            "[fixture] loaded {} rules, {} preferences, {} trades",
            rules, preferences, trades
        );
        Ok(())
    }
}
