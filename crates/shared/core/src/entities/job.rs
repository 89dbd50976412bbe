//! Notification job and its delivery state machine
//!
//! ```text
//! Pending ──claim──► InFlight ──► Sent
//!    ▲                  │
//!    └── retry wait ◄───┼──────► Failed
//!    └── stuck sweep ◄──┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use super::history::HistoryOutcome;
use super::match_event::{MatchEvent, MatchKey};
use crate::values::{EntryId, JobId, OwnerId, Timestamp};

/// Delivery channel. Email is the only one today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Email,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for `scheduled_for`, claimable once due
    Pending,
    /// Claimed by exactly one worker
    InFlight,
    Sent,
    Failed,
    /// Owner has notifications disabled
    Suppressed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Sent | JobStatus::Failed | JobStatus::Suppressed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InFlight => write!(f, "in_flight"),
            JobStatus::Sent => write!(f, "sent"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Suppressed => write!(f, "suppressed"),
        }
    }
}

/// Identity of the job that accumulates events for one owner and period
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchKey {
    /// Immediate events held until a quiet-hours window ends
    QuietHours { owner_id: OwnerId, until: Timestamp },
    /// Daily digest for one local calendar day
    Daily { owner_id: OwnerId, date: NaiveDate },
    /// Weekly digest for the week starting on `week_start`
    Weekly { owner_id: OwnerId, week_start: NaiveDate },
}

impl BatchKey {
    pub fn owner_id(&self) -> OwnerId {
        match self {
            BatchKey::QuietHours { owner_id, .. }
            | BatchKey::Daily { owner_id, .. }
            | BatchKey::Weekly { owner_id, .. } => *owner_id,
        }
    }

    pub fn is_digest(&self) -> bool {
        matches!(self, BatchKey::Daily { .. } | BatchKey::Weekly { .. })
    }
}

/// Proof of ownership of an in-flight job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub worker: String,
    pub token: Uuid,
    pub claimed_at: Timestamp,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("job {job_id}: cannot {action} while {status}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub status: JobStatus,
    pub action: &'static str,
}

/// One outbound notification bundling one or more match events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub recipient: String,
    pub channel: Channel,
    pub events: Vec<MatchEvent>,
    pub batch_key: Option<BatchKey>,
    pub scheduled_for: Timestamp,
    pub status: JobStatus,
    /// Transient failures so far
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub claim: Option<Claim>,
    /// Set once the job reaches a terminal state
    pub outcome: Option<HistoryOutcome>,
    pub created_at: Timestamp,
    /// History entry this job re-sends, for manual retries
    pub retry_of: Option<EntryId>,
}

impl NotificationJob {
    pub fn new(
        owner_id: OwnerId,
        recipient: impl Into<String>,
        events: Vec<MatchEvent>,
        scheduled_for: Timestamp,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            recipient: recipient.into(),
            channel: Channel::Email,
            events,
            batch_key: None,
            scheduled_for,
            status: JobStatus::Pending,
            retry_count: 0,
            last_error: None,
            claim: None,
            outcome: None,
            created_at,
            retry_of: None,
        }
    }

    pub fn with_batch_key(mut self, key: BatchKey) -> Self {
        self.batch_key = Some(key);
        self
    }

    pub fn with_retry_of(mut self, entry_id: EntryId) -> Self {
        self.retry_of = Some(entry_id);
        self
    }

    pub fn keys(&self) -> Vec<MatchKey> {
        self.events.iter().map(MatchEvent::key).collect()
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == JobStatus::Pending && self.scheduled_for <= now
    }

    pub fn is_digest(&self) -> bool {
        self.batch_key.as_ref().is_some_and(BatchKey::is_digest)
    }

    /// Append events not already bundled; returns how many were added
    pub fn merge(&mut self, events: impl IntoIterator<Item = MatchEvent>) -> usize {
        let mut seen: HashSet<MatchKey> = self.keys().into_iter().collect();
        let before = self.events.len();
        for event in events {
            if seen.insert(event.key()) {
                self.events.push(event);
            }
        }
        self.events.len() - before
    }

    fn expect_status(&self, status: JobStatus, action: &'static str) -> Result<(), TransitionError> {
        if self.status != status {
            return Err(TransitionError {
                job_id: self.id,
                status: self.status,
                action,
            });
        }
        Ok(())
    }

    /// Pending → InFlight
    pub fn claim(&mut self, worker: impl Into<String>, now: Timestamp) -> Result<Claim, TransitionError> {
        self.expect_status(JobStatus::Pending, "claim")?;
        let claim = Claim {
            worker: worker.into(),
            token: Uuid::new_v4(),
            claimed_at: now,
        };
        self.status = JobStatus::InFlight;
        self.claim = Some(claim.clone());
        Ok(claim)
    }

    /// InFlight → Pending after a transient failure
    pub fn retry_at(&mut self, at: Timestamp, error: impl Into<String>) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::InFlight, "schedule retry")?;
        self.retry_count += 1;
        self.last_error = Some(error.into());
        self.scheduled_for = at;
        self.status = JobStatus::Pending;
        self.claim = None;
        Ok(())
    }

    /// InFlight → Sent / Failed / Suppressed, depending on `outcome`
    pub fn complete(
        &mut self,
        outcome: HistoryOutcome,
        error: Option<String>,
    ) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::InFlight, "complete")?;
        self.status = outcome.job_status();
        self.outcome = Some(outcome);
        if error.is_some() {
            self.last_error = error;
        }
        self.claim = None;
        Ok(())
    }

    /// Delivery attempts made so far, counting the one in flight
    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// InFlight → Pending, for jobs abandoned by a crashed worker
    pub fn release(&mut self) -> Result<(), TransitionError> {
        self.expect_status(JobStatus::InFlight, "release")?;
        self.status = JobStatus::Pending;
        self.claim = None;
        Ok(())
    }

    /// True if the job is in flight under a claim older than `cutoff`
    pub fn is_stuck(&self, cutoff: Timestamp) -> bool {
        self.status == JobStatus::InFlight
            && self.claim.as_ref().is_some_and(|c| c.claimed_at < cutoff)
    }
}
