//! In-memory notification job queue
//!
//! Three maps:
//! - `jobs`: every non-archived job
//! - `batches`: batch key → the job currently accumulating that batch
//! - `reservations`: match key → the job that owns the match
//!
//! Writers that touch `batches` or `reservations` (enqueue, reserve, requeue)
//! serialize on `enqueue_lock`. Claiming and completing only take the per-entry
//! lock on `jobs`, so the claim CAS never waits on scheduling.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use herald_core::{
    BatchKey, HistoryOutcome, JobId, JobStatus, MatchKey, NotificationJob, OwnerId, Timestamp,
};
use herald_ports::{EnqueueOutcome, JobStore, StoreError, StoreResult};
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

pub struct InMemoryJobStore {
    jobs: Arc<DashMap<JobId, NotificationJob>>,
    batches: Arc<DashMap<BatchKey, JobId>>,
    reservations: Arc<DashMap<MatchKey, JobId>>,
    enqueue_lock: Arc<Mutex<()>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            batches: Arc::new(DashMap::new()),
            reservations: Arc::new(DashMap::new()),
            enqueue_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Job that owns a match, if any
    pub fn reserved_by(&self, key: &MatchKey) -> Option<JobId> {
        self.reservations.get(key).map(|r| *r.value())
    }

    fn enqueue_locked(&self, mut job: NotificationJob) -> EnqueueOutcome {
        let _guard = self.enqueue_lock.lock();

        job.events.retain(|e| !self.reservations.contains_key(&e.key()));
        if job.events.is_empty() {
            return EnqueueOutcome::Duplicate;
        }

        if let Some(batch_key) = job.batch_key.clone() {
            let existing = self.batches.get(&batch_key).map(|id| *id.value());
            if let Some(existing_id) = existing {
                let merged = match self.jobs.get_mut(&existing_id) {
                    Some(mut pending) if pending.status == JobStatus::Pending => {
                        Some(pending.merge(job.events.clone()))
                    }
                    _ => None,
                };
                if let Some(added) = merged {
                    self.reserve(existing_id, &job.keys());
                    debug!("[jobs] merged {} events into {}", added, existing_id);
                    return EnqueueOutcome::Merged {
                        job_id: existing_id,
                        added,
                    };
                }
            }
            // Previous batch job already left Pending; this one takes over the key
            self.batches.insert(batch_key, job.id);
        }

        let job_id = job.id;
        let events = job.events.len();
        self.reserve(job_id, &job.keys());
        self.jobs.insert(job_id, job);
        EnqueueOutcome::Created { job_id, events }
    }

    fn reserve(&self, job_id: JobId, keys: &[MatchKey]) {
        for key in keys {
            self.reservations.entry(key.clone()).or_insert(job_id);
        }
    }

    fn reserve_locked(&self, job_id: JobId, keys: &[MatchKey]) -> Vec<MatchKey> {
        let _guard = self.enqueue_lock.lock();
        keys.iter()
            .filter(|key| match self.reservations.entry((*key).clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(job_id);
                    true
                }
            })
            .cloned()
            .collect()
    }

    fn requeue_locked(&self, job: NotificationJob) {
        let _guard = self.enqueue_lock.lock();
        for key in job.keys() {
            self.reservations.insert(key, job.id);
        }
        self.jobs.insert(job.id, job);
    }

    /// Run `f` on a claimed job after checking the caller still holds the claim
    fn with_claim<F>(&self, job_id: JobId, token: Uuid, f: F) -> StoreResult<NotificationJob>
    where
        F: FnOnce(&mut NotificationJob) -> StoreResult<()>,
    {
        let mut job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::JobNotFound(job_id))?;

        let held = job.claim.as_ref().is_some_and(|c| c.token == token);
        if !held || job.status != JobStatus::InFlight {
            return Err(StoreError::ClaimLost(job_id));
        }

        f(job.value_mut())?;
        Ok(job.clone())
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryJobStore {
    fn clone(&self) -> Self {
        Self {
            jobs: Arc::clone(&self.jobs),
            batches: Arc::clone(&self.batches),
            reservations: Arc::clone(&self.reservations),
            enqueue_lock: Arc::clone(&self.enqueue_lock),
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: NotificationJob) -> StoreResult<EnqueueOutcome> {
        Ok(self.enqueue_locked(job))
    }

    async fn reserve_matches(&self, job_id: JobId, keys: &[MatchKey]) -> StoreResult<Vec<MatchKey>> {
        Ok(self.reserve_locked(job_id, keys))
    }

    async fn requeue(&self, job: NotificationJob) -> StoreResult<()> {
        if job.status != JobStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "requeued job {} must be pending, is {}",
                job.id, job.status
            )));
        }
        self.requeue_locked(job);
        Ok(())
    }

    async fn due(&self, now: Timestamp, limit: usize) -> StoreResult<Vec<JobId>> {
        let mut due: Vec<(Timestamp, Timestamp, JobId)> = self
            .jobs
            .iter()
            .filter(|j| j.is_due(now))
            .map(|j| (j.scheduled_for, j.created_at, j.id))
            .collect();
        due.sort();
        Ok(due.into_iter().take(limit).map(|(_, _, id)| id).collect())
    }

    async fn try_claim(
        &self,
        job_id: JobId,
        worker: &str,
        now: Timestamp,
    ) -> StoreResult<Option<NotificationJob>> {
        let Some(mut job) = self.jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        if !job.is_due(now) {
            return Ok(None);
        }
        job.claim(worker, now)?;
        Ok(Some(job.clone()))
    }

    async fn schedule_retry(
        &self,
        job_id: JobId,
        token: Uuid,
        at: Timestamp,
        error: String,
    ) -> StoreResult<NotificationJob> {
        self.with_claim(job_id, token, |job| Ok(job.retry_at(at, error)?))
    }

    async fn complete(
        &self,
        job_id: JobId,
        token: Uuid,
        outcome: HistoryOutcome,
        error: Option<String>,
    ) -> StoreResult<NotificationJob> {
        self.with_claim(job_id, token, |job| Ok(job.complete(outcome, error)?))
    }

    async fn archive(&self, job_id: JobId) -> StoreResult<bool> {
        let Some(status) = self.jobs.get(&job_id).map(|j| j.status) else {
            return Ok(false);
        };
        if !status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "job {} is {} and cannot be archived",
                job_id, status
            )));
        }

        match self.jobs.remove_if(&job_id, |_, j| j.status.is_terminal()) {
            Some((_, job)) => {
                if let Some(batch_key) = job.batch_key {
                    self.batches.remove_if(&batch_key, |_, id| *id == job_id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release_stuck(&self, cutoff: Timestamp) -> StoreResult<Vec<JobId>> {
        let candidates: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|j| j.is_stuck(cutoff))
            .map(|j| j.id)
            .collect();

        let mut released = Vec::new();
        for job_id in candidates {
            if let Some(mut job) = self.jobs.get_mut(&job_id) {
                // Re-check under the entry lock; the worker may have finished
                if job.is_stuck(cutoff) {
                    job.release()?;
                    released.push(job_id);
                }
            }
        }
        Ok(released)
    }

    async fn terminal(&self) -> StoreResult<Vec<NotificationJob>> {
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.status.is_terminal())
            .map(|j| j.value().clone())
            .collect())
    }

    async fn get(&self, job_id: JobId) -> StoreResult<Option<NotificationJob>> {
        Ok(self.jobs.get(&job_id).map(|j| j.value().clone()))
    }

    async fn jobs_for_owner(&self, owner_id: OwnerId) -> StoreResult<Vec<NotificationJob>> {
        let mut jobs: Vec<NotificationJob> = self
            .jobs
            .iter()
            .filter(|j| j.owner_id == owner_id)
            .map(|j| j.value().clone())
            .collect();
        jobs.sort_by_key(|j| (j.scheduled_for, j.created_at));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use herald_core::{AlertRule, MatchEvent, TradeAmount, TradeRecord, TransactionType};
    use rust_decimal_macros::dec;

    fn event(rule: &AlertRule, trade_id: &str) -> MatchEvent {
        let trade = TradeRecord::new(
            trade_id,
            "P000197",
            "Nancy Pelosi",
            TransactionType::Purchase,
            TradeAmount::exact(dec!(250000)),
            Utc::now(),
        );
        MatchEvent::new(rule, &trade, Utc::now())
    }

    fn daily_job(rule: &AlertRule, trade_ids: &[&str], now: Timestamp) -> NotificationJob {
        let events = trade_ids.iter().map(|id| event(rule, id)).collect();
        NotificationJob::new(rule.owner_id, "u@example.com", events, now, now).with_batch_key(
            BatchKey::Daily {
                owner_id: rule.owner_id,
                date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn test_batch_key_merges_into_pending_job() {
        let store = InMemoryJobStore::new();
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let now = Utc::now();

        let first = store.enqueue(daily_job(&rule, &["t1", "t2"], now)).await.unwrap();
        let second = store.enqueue(daily_job(&rule, &["t2", "t3"], now)).await.unwrap();

        let job_id = first.job_id().unwrap();
        assert_eq!(second, EnqueueOutcome::Merged { job_id, added: 1 });
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(job_id).await.unwrap().unwrap().events.len(), 3);
    }

    #[tokio::test]
    async fn test_reserved_matches_are_dropped() {
        let store = InMemoryJobStore::new();
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let now = Utc::now();
        let e = event(&rule, "t1");

        let job = NotificationJob::new(rule.owner_id, "u@example.com", vec![e.clone()], now, now);
        assert!(matches!(
            store.enqueue(job).await.unwrap(),
            EnqueueOutcome::Created { events: 1, .. }
        ));

        let again = NotificationJob::new(rule.owner_id, "u@example.com", vec![e.clone()], now, now);
        assert_eq!(store.enqueue(again).await.unwrap(), EnqueueOutcome::Duplicate);

        let fresh = store.reserve_matches(Uuid::new_v4(), &[e.key()]).await.unwrap();
        assert!(fresh.is_empty());
    }

    #[tokio::test]
    async fn test_claimed_batch_is_not_extended() {
        let store = InMemoryJobStore::new();
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let now = Utc::now();

        let first = store.enqueue(daily_job(&rule, &["t1"], now)).await.unwrap();
        let first_id = first.job_id().unwrap();
        store.try_claim(first_id, "worker-0", now).await.unwrap().unwrap();

        let second = store.enqueue(daily_job(&rule, &["t2"], now)).await.unwrap();
        assert!(matches!(second, EnqueueOutcome::Created { events: 1, .. }));
        assert_ne!(second.job_id(), Some(first_id));
    }

    #[tokio::test]
    async fn test_due_respects_schedule() {
        let store = InMemoryJobStore::new();
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let now = Utc::now();
        let later = now + Duration::hours(1);

        store
            .enqueue(NotificationJob::new(rule.owner_id, "u@example.com", vec![event(&rule, "t1")], later, now))
            .await
            .unwrap();
        let due_now = store
            .enqueue(NotificationJob::new(rule.owner_id, "u@example.com", vec![event(&rule, "t2")], now, now))
            .await
            .unwrap();

        assert_eq!(store.due(now, 10).await.unwrap(), vec![due_now.job_id().unwrap()]);
        assert_eq!(store.due(later, 10).await.unwrap().len(), 2);
        assert_eq!(store.due(later, 1).await.unwrap(), vec![due_now.job_id().unwrap()]);
    }

    #[tokio::test]
    async fn test_stale_token_loses_completion() {
        let store = InMemoryJobStore::new();
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let now = Utc::now();
        let job_id = store
            .enqueue(NotificationJob::new(rule.owner_id, "u@example.com", vec![event(&rule, "t1")], now, now))
            .await
            .unwrap()
            .job_id()
            .unwrap();

        let stale = store.try_claim(job_id, "worker-0", now).await.unwrap().unwrap();
        let released = store.release_stuck(now + Duration::minutes(11)).await.unwrap();
        assert_eq!(released, vec![job_id]);

        let later = now + Duration::minutes(12);
        let fresh = store.try_claim(job_id, "worker-1", later).await.unwrap().unwrap();

        let stale_token = stale.claim.unwrap().token;
        assert_eq!(
            store
                .complete(job_id, stale_token, HistoryOutcome::Sent, None)
                .await
                .unwrap_err(),
            StoreError::ClaimLost(job_id)
        );

        let done = store
            .complete(job_id, fresh.claim.unwrap().token, HistoryOutcome::Sent, None)
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Sent);
    }

    #[tokio::test]
    async fn test_archive_only_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let now = Utc::now();
        let job_id = store
            .enqueue(daily_job(&rule, &["t1"], now))
            .await
            .unwrap()
            .job_id()
            .unwrap();

        assert!(matches!(store.archive(job_id).await, Err(StoreError::Conflict(_))));

        let claimed = store.try_claim(job_id, "worker-0", now).await.unwrap().unwrap();
        store
            .complete(job_id, claimed.claim.unwrap().token, HistoryOutcome::Sent, None)
            .await
            .unwrap();
        assert_eq!(store.terminal().await.unwrap().len(), 1);

        assert!(store.archive(job_id).await.unwrap());
        assert!(!store.archive(job_id).await.unwrap());
        assert!(store.is_empty());
        // The match stays reserved after archival
        assert_eq!(store.reserved_by(&event(&rule, "t1").key()), Some(job_id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_are_exclusive() {
        let store = InMemoryJobStore::new();
        let rule = AlertRule::threshold(Uuid::new_v4(), "big", dec!(100000));
        let now = Utc::now();

        let mut ids = Vec::new();
        for i in 0..20 {
            let job = NotificationJob::new(
                rule.owner_id,
                "u@example.com",
                vec![event(&rule, &format!("t{i}"))],
                now,
                now,
            );
            ids.push(store.enqueue(job).await.unwrap().job_id().unwrap());
        }

        let mut handles = Vec::new();
        for w in 0..8 {
            let store = store.clone();
            let ids = ids.clone();
            handles.push(tokio::spawn(async move {
                let worker = format!("worker-{w}");
                let mut won = Vec::new();
                for id in ids {
                    if store.try_claim(id, &worker, now).await.unwrap().is_some() {
                        won.push(id);
                    }
                }
                won
            }));
        }

        let mut claimed = Vec::new();
        for handle in handles {
            claimed.extend(handle.await.unwrap());
        }
        claimed.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(claimed, expected);
    }
}
