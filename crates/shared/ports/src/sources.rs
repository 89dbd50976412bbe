//! Ports to the collaborators that feed the engine

use async_trait::async_trait;
use herald_core::{AlertRule, NotificationPreference, OwnerId, Timestamp, TradeRecord};

use crate::error::StoreResult;

/// Ingestion collaborator: newly disclosed trades
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Trades ingested strictly after `since` (all trades if `None`),
    /// ascending by ingestion timestamp, at most `limit` per page
    async fn trades_since(
        &self,
        since: Option<Timestamp>,
        limit: usize,
    ) -> StoreResult<Vec<TradeRecord>>;
}

/// User-management collaborator: rules and notification preferences
#[async_trait]
pub trait RuleCatalog: Send + Sync {
    /// All rules with `active == true`
    async fn active_rules(&self) -> StoreResult<Vec<AlertRule>>;

    /// Preference for an owner, `None` if the owner has not set one up
    async fn preference(&self, owner_id: OwnerId) -> StoreResult<Option<NotificationPreference>>;
}
