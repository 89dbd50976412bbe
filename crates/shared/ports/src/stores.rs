//! Ports to the engine's own persisted state
//!
//! Follows Interface Segregation: one trait per store, so each pipeline
//! stage only sees what it reads and writes.

use async_trait::async_trait;
use herald_core::{
    EntryId, HistoryEntry, HistoryOutcome, JobId, MatchCursor, MatchEvent, MatchKey,
    NotificationJob, OwnerId, Timestamp,
};
use uuid::Uuid;

use crate::error::StoreResult;

/// Seen index and outbox for match events
#[async_trait]
pub trait MatchEventStore: Send + Sync {
    /// Record an event unless its (rule, trade) key was seen before.
    /// Returns `false` for duplicates; never errors on them.
    async fn record_if_new(&self, event: MatchEvent) -> StoreResult<bool>;

    /// Whether the (rule, trade) key has ever been recorded
    async fn contains(&self, key: &MatchKey) -> StoreResult<bool>;

    /// Recorded events not yet handed to the scheduler, oldest first.
    ///
    /// Ordered by trade ingestion time, then match key. With `after` set,
    /// only events strictly past that event in this order are returned, so
    /// callers can page over events they chose to leave in place.
    async fn unscheduled(
        &self,
        after: Option<&MatchEvent>,
        limit: usize,
    ) -> StoreResult<Vec<MatchEvent>>;

    /// Mark events as scheduled so they are not offered again.
    /// The seen index keeps their keys.
    async fn retire(&self, keys: &[MatchKey]) -> StoreResult<()>;
}

/// Persisted matcher high-water mark
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self) -> StoreResult<MatchCursor>;

    /// Move the cursor forward to `cursor`; an older cursor is ignored.
    /// Returns the stored cursor after the update.
    async fn advance(&self, cursor: MatchCursor) -> StoreResult<MatchCursor>;
}

/// What happened to a job handed to [`JobStore::enqueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Stored as a new pending job
    Created { job_id: JobId, events: usize },
    /// Events were folded into an existing pending job with the same batch key
    Merged { job_id: JobId, added: usize },
    /// Every event was already reserved by another job
    Duplicate,
}

impl EnqueueOutcome {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            EnqueueOutcome::Created { job_id, .. } | EnqueueOutcome::Merged { job_id, .. } => {
                Some(*job_id)
            }
            EnqueueOutcome::Duplicate => None,
        }
    }

    /// Events newly accepted into the store
    pub fn accepted(&self) -> usize {
        match self {
            EnqueueOutcome::Created { events, .. } => *events,
            EnqueueOutcome::Merged { added, .. } => *added,
            EnqueueOutcome::Duplicate => 0,
        }
    }
}

/// Notification job queue
///
/// `try_claim` is the only synchronization point between workers: an atomic
/// compare-and-set from `Pending` to `InFlight`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a pending job. Events whose match key is already reserved by
    /// another job are dropped; if a pending job with the same batch key
    /// exists, the remaining events are merged into it.
    async fn enqueue(&self, job: NotificationJob) -> StoreResult<EnqueueOutcome>;

    /// Reserve match keys for `job_id` without storing a job.
    /// Returns the keys that were not reserved before.
    async fn reserve_matches(&self, job_id: JobId, keys: &[MatchKey]) -> StoreResult<Vec<MatchKey>>;

    /// Store a pending job unconditionally, re-pointing its match keys at it.
    /// Used for manual retries of failed notifications.
    async fn requeue(&self, job: NotificationJob) -> StoreResult<()>;

    /// Ids of pending jobs with `scheduled_for <= now`, earliest first
    async fn due(&self, now: Timestamp, limit: usize) -> StoreResult<Vec<JobId>>;

    /// Claim a due job for `worker`. `None` if another worker got there
    /// first or the job is no longer due.
    async fn try_claim(
        &self,
        job_id: JobId,
        worker: &str,
        now: Timestamp,
    ) -> StoreResult<Option<NotificationJob>>;

    /// Return a claimed job to `Pending` at `at` after a transient failure
    async fn schedule_retry(
        &self,
        job_id: JobId,
        token: Uuid,
        at: Timestamp,
        error: String,
    ) -> StoreResult<NotificationJob>;

    /// Move a claimed job to its terminal state. The job stays in the store
    /// until [`JobStore::archive`] so a crash before the history write can be
    /// recovered.
    async fn complete(
        &self,
        job_id: JobId,
        token: Uuid,
        outcome: HistoryOutcome,
        error: Option<String>,
    ) -> StoreResult<NotificationJob>;

    /// Remove a terminal job. Returns `false` if it was already gone.
    async fn archive(&self, job_id: JobId) -> StoreResult<bool>;

    /// Return jobs claimed before `cutoff` to `Pending`
    async fn release_stuck(&self, cutoff: Timestamp) -> StoreResult<Vec<JobId>>;

    /// Terminal jobs not yet archived
    async fn terminal(&self) -> StoreResult<Vec<NotificationJob>>;

    async fn get(&self, job_id: JobId) -> StoreResult<Option<NotificationJob>>;

    /// Non-archived jobs for an owner
    async fn jobs_for_owner(&self, owner_id: OwnerId) -> StoreResult<Vec<NotificationJob>>;
}

/// Filter for history queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub owner_id: Option<OwnerId>,
    /// Inclusive lower bound on `recorded_at`
    pub from: Option<Timestamp>,
    /// Exclusive upper bound on `recorded_at`
    pub to: Option<Timestamp>,
    /// Empty means every outcome
    pub outcomes: Vec<HistoryOutcome>,
}

impl HistoryQuery {
    pub fn for_owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: Timestamp, to: Timestamp) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = HistoryOutcome>) -> Self {
        self.outcomes = outcomes.into_iter().collect();
        self
    }

    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        self.owner_id.is_none_or(|owner| entry.owner_id == owner)
            && self.from.is_none_or(|from| entry.recorded_at >= from)
            && self.to.is_none_or(|to| entry.recorded_at < to)
            && (self.outcomes.is_empty() || self.outcomes.contains(&entry.outcome))
    }
}

/// Append-only notification history
#[async_trait]
pub trait HistoryLedger: Send + Sync {
    /// Append an entry. At most one entry per job id is kept; a second
    /// append for the same job returns `false` and writes nothing.
    async fn append(&self, entry: HistoryEntry) -> StoreResult<bool>;

    async fn get(&self, entry_id: EntryId) -> StoreResult<Option<HistoryEntry>>;

    /// Matching entries ordered by `recorded_at`
    async fn query(&self, query: &HistoryQuery) -> StoreResult<Vec<HistoryEntry>>;

    /// Record that `entry_id` was manually retried. Returns `false` if it
    /// already had been.
    async fn mark_retried(&self, entry_id: EntryId, job_id: JobId) -> StoreResult<bool>;
}
