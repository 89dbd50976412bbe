//! In-memory trade source

use async_trait::async_trait;
use dashmap::DashMap;
use herald_core::{Timestamp, TradeId, TradeRecord};
use herald_ports::{StoreError, StoreResult, TradeSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory stand-in for the ingestion collaborator
///
/// Trades are keyed by id, so re-ingesting the same disclosure replaces it.
pub struct InMemoryTradeSource {
    trades: Arc<DashMap<TradeId, TradeRecord>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryTradeSource {
    pub fn new() -> Self {
        Self {
            trades: Arc::new(DashMap::new()),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn ingest(&self, trade: TradeRecord) {
        self.trades.insert(trade.id.clone(), trade);
    }

    pub fn ingest_all(&self, trades: impl IntoIterator<Item = TradeRecord>) {
        for trade in trades {
            self.ingest(trade);
        }
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Simulate an outage: every read fails with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for InMemoryTradeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryTradeSource {
    fn clone(&self) -> Self {
        Self {
            trades: Arc::clone(&self.trades),
            unavailable: Arc::clone(&self.unavailable),
        }
    }
}

#[async_trait]
impl TradeSource for InMemoryTradeSource {
    async fn trades_since(
        &self,
        since: Option<Timestamp>,
        limit: usize,
    ) -> StoreResult<Vec<TradeRecord>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("trade source offline".to_string()));
        }

        let mut trades: Vec<TradeRecord> = self
            .trades
            .iter()
            .filter(|t| since.is_none_or(|s| t.ingested_at > s))
            .map(|t| t.value().clone())
            .collect();

        trades.sort_by(|a, b| {
            a.ingested_at
                .cmp(&b.ingested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        trades.truncate(limit);
        Ok(trades)
    }
}
