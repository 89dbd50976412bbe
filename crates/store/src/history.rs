//! In-memory notification history ledger

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use herald_core::{EntryId, HistoryEntry, JobId};
use herald_ports::{HistoryLedger, HistoryQuery, StoreError, StoreResult};
use std::sync::Arc;

/// Append-only history
///
/// `by_job` is the uniqueness index: the first append for a job wins and later
/// ones are dropped, so a crashed worker and the sweeper recovering its job
/// never produce two entries.
pub struct InMemoryHistoryLedger {
    entries: Arc<DashMap<EntryId, HistoryEntry>>,
    by_job: Arc<DashMap<JobId, EntryId>>,
    retried: Arc<DashMap<EntryId, JobId>>,
}

impl InMemoryHistoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            by_job: Arc::new(DashMap::new()),
            retried: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_for_job(&self, job_id: JobId) -> Option<HistoryEntry> {
        let entry_id = *self.by_job.get(&job_id)?.value();
        self.entries.get(&entry_id).map(|e| e.value().clone())
    }

    /// Job created by manually retrying `entry_id`
    pub fn retried_as(&self, entry_id: EntryId) -> Option<JobId> {
        self.retried.get(&entry_id).map(|j| *j.value())
    }
}

impl Default for InMemoryHistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryHistoryLedger {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            by_job: Arc::clone(&self.by_job),
            retried: Arc::clone(&self.retried),
        }
    }
}

#[async_trait]
impl HistoryLedger for InMemoryHistoryLedger {
    async fn append(&self, entry: HistoryEntry) -> StoreResult<bool> {
        match self.by_job.entry(entry.job_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entry.id);
                self.entries.insert(entry.id, entry);
                Ok(true)
            }
        }
    }

    async fn get(&self, entry_id: EntryId) -> StoreResult<Option<HistoryEntry>> {
        Ok(self.entries.get(&entry_id).map(|e| e.value().clone()))
    }

    async fn query(&self, query: &HistoryQuery) -> StoreResult<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .entries
            .iter()
            .filter(|e| query.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| (e.recorded_at, e.id));
        Ok(entries)
    }

    async fn mark_retried(&self, entry_id: EntryId, job_id: JobId) -> StoreResult<bool> {
        if !self.entries.contains_key(&entry_id) {
            return Err(StoreError::EntryNotFound(entry_id));
        }
        match self.retried.entry(entry_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(job_id);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use herald_core::{HistoryOutcome, Timestamp};
    use uuid::Uuid;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
    }

    fn entry(owner: Uuid, outcome: HistoryOutcome, minutes: i64) -> HistoryEntry {
        let mut entry = HistoryEntry::suppressed(owner, "u@example.com", vec![], t0() + Duration::minutes(minutes));
        entry.outcome = outcome;
        entry
    }

    #[tokio::test]
    async fn test_one_entry_per_job() {
        let ledger = InMemoryHistoryLedger::new();
        let first = entry(Uuid::new_v4(), HistoryOutcome::Sent, 0);
        let mut second = entry(first.owner_id, HistoryOutcome::Sent, 1);
        second.job_id = first.job_id;

        assert!(ledger.append(first.clone()).await.unwrap());
        assert!(!ledger.append(second).await.unwrap());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entry_for_job(first.job_id).unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let ledger = InMemoryHistoryLedger::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        ledger.append(entry(owner, HistoryOutcome::Sent, 30)).await.unwrap();
        ledger.append(entry(owner, HistoryOutcome::FailedPermanent, 10)).await.unwrap();
        ledger.append(entry(owner, HistoryOutcome::Sent, 90)).await.unwrap();
        ledger.append(entry(other, HistoryOutcome::Sent, 20)).await.unwrap();

        let all = ledger.query(&HistoryQuery::for_owner(owner)).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));

        let window = ledger
            .query(&HistoryQuery::for_owner(owner).between(t0(), t0() + Duration::minutes(60)))
            .await
            .unwrap();
        assert_eq!(window.len(), 2);

        let failed = ledger
            .query(&HistoryQuery::for_owner(owner).with_outcomes([HistoryOutcome::FailedPermanent]))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].is_retryable());
    }

    #[tokio::test]
    async fn test_mark_retried_once() {
        let ledger = InMemoryHistoryLedger::new();
        let failed = entry(Uuid::new_v4(), HistoryOutcome::FailedExhaustedRetries, 0);
        ledger.append(failed.clone()).await.unwrap();

        let job_id = Uuid::new_v4();
        assert!(ledger.mark_retried(failed.id, job_id).await.unwrap());
        assert!(!ledger.mark_retried(failed.id, Uuid::new_v4()).await.unwrap());
        assert_eq!(ledger.retried_as(failed.id), Some(job_id));

        let missing = Uuid::new_v4();
        assert_eq!(
            ledger.mark_retried(missing, job_id).await.unwrap_err(),
            StoreError::EntryNotFound(missing)
        );
    }
}
