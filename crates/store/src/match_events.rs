//! In-memory match event store

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use herald_core::{MatchEvent, MatchKey, Timestamp};
use herald_ports::{MatchEventStore, StoreResult};
use std::sync::Arc;

/// Seen index plus the outbox of events awaiting scheduling
///
/// The seen index only grows. Retiring an event removes it from the outbox
/// but its key stays seen, so the matcher never records it again.
pub struct InMemoryMatchEventStore {
    seen: Arc<DashMap<MatchKey, Timestamp>>,
    outbox: Arc<DashMap<MatchKey, MatchEvent>>,
}

impl InMemoryMatchEventStore {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(DashMap::new()),
            outbox: Arc::new(DashMap::new()),
        }
    }

    /// Number of distinct (rule, trade) pairs ever recorded
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn pending_count(&self) -> usize {
        self.outbox.len()
    }
}

impl Default for InMemoryMatchEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryMatchEventStore {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
            outbox: Arc::clone(&self.outbox),
        }
    }
}

#[async_trait]
impl MatchEventStore for InMemoryMatchEventStore {
    async fn record_if_new(&self, event: MatchEvent) -> StoreResult<bool> {
        let key = event.key();
        match self.seen.entry(key.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(event.matched_at);
                self.outbox.insert(key, event);
                Ok(true)
            }
        }
    }

    async fn contains(&self, key: &MatchKey) -> StoreResult<bool> {
        Ok(self.seen.contains_key(key))
    }

    async fn unscheduled(
        &self,
        after: Option<&MatchEvent>,
        limit: usize,
    ) -> StoreResult<Vec<MatchEvent>> {
        let after = after.map(outbox_order);
        let mut events: Vec<MatchEvent> = self
            .outbox
            .iter()
            .filter(|e| after.as_ref().is_none_or(|a| outbox_order(e.value()) > *a))
            .map(|e| e.value().clone())
            .collect();
        events.sort_by_cached_key(outbox_order);
        events.truncate(limit);
        Ok(events)
    }

    async fn retire(&self, keys: &[MatchKey]) -> StoreResult<()> {
        for key in keys {
            self.outbox.remove(key);
        }
        Ok(())
    }
}

fn outbox_order(event: &MatchEvent) -> (Timestamp, MatchKey) {
    (event.trade.ingested_at, event.key())
}
