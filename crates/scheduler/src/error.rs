//! Scheduler errors

use herald_core::OwnerId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Owner {owner_id} has an out-of-range UTC offset: {minutes} minutes")]
    InvalidOffset { owner_id: OwnerId, minutes: i32 },

    #[error("Owner {owner_id} has no email address")]
    MissingRecipient { owner_id: OwnerId },

    #[error("Local time {local} is out of range")]
    OutOfRange { local: String },
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
