use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{JobStatus, NotificationJob};
use super::match_event::MatchEvent;
use crate::values::{EntryId, JobId, OwnerId, Timestamp};

/// Terminal outcome of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Sent,
    FailedPermanent,
    FailedExhaustedRetries,
    Suppressed,
}

impl HistoryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            HistoryOutcome::FailedPermanent | HistoryOutcome::FailedExhaustedRetries
        )
    }

    /// Job status matching this outcome
    pub fn job_status(&self) -> JobStatus {
        match self {
            HistoryOutcome::Sent => JobStatus::Sent,
            HistoryOutcome::FailedPermanent | HistoryOutcome::FailedExhaustedRetries => {
                JobStatus::Failed
            }
            HistoryOutcome::Suppressed => JobStatus::Suppressed,
        }
    }
}

impl std::fmt::Display for HistoryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryOutcome::Sent => write!(f, "sent"),
            HistoryOutcome::FailedPermanent => write!(f, "failed-permanent"),
            HistoryOutcome::FailedExhaustedRetries => write!(f, "failed-exhausted-retries"),
            HistoryOutcome::Suppressed => write!(f, "suppressed"),
        }
    }
}

/// Immutable record of one job's terminal outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub job_id: JobId,
    pub owner_id: OwnerId,
    pub recipient: String,
    pub outcome: HistoryOutcome,
    pub events: Vec<MatchEvent>,
    /// Delivery attempts made (0 for suppressed)
    pub attempts: u32,
    pub error: Option<String>,
    pub recorded_at: Timestamp,
}

impl HistoryEntry {
    /// Entry for a job that reached a terminal state after `attempts` sends
    pub fn for_job(
        job: &NotificationJob,
        outcome: HistoryOutcome,
        attempts: u32,
        error: Option<String>,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            owner_id: job.owner_id,
            recipient: job.recipient.clone(),
            outcome,
            events: job.events.clone(),
            attempts,
            error,
            recorded_at,
        }
    }

    /// Entry for events that were matched while notifications were disabled
    pub fn suppressed(
        owner_id: OwnerId,
        recipient: impl Into<String>,
        events: Vec<MatchEvent>,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            owner_id,
            recipient: recipient.into(),
            outcome: HistoryOutcome::Suppressed,
            events,
            attempts: 0,
            error: None,
            recorded_at,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.outcome.is_failure()
    }

    /// One-line summary for the alert-history screen
    pub fn summary(&self) -> String {
        let n = self.events.len();
        let plural = if n == 1 { "" } else { "es" };
        match &self.error {
            Some(err) => format!("{} ({} match{}): {}", self.outcome, n, plural, err),
            None => format!("{} ({} match{})", self.outcome, n, plural),
        }
    }
}
