use herald_core::{EntryId, JobId, RuleId, TransitionError};
use thiserror::Error;

/// Infrastructure-level errors raised by stores and collaborators
///
/// These abort the current run; the next trigger retries the whole batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    #[error("History entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Claim on job {0} is no longer held")]
    ClaimLost(JobId),

    #[error("Invalid job transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
