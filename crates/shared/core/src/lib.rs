//! Herald Core Domain
//!
//! Pure domain types for the Herald trade alert engine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Rules and their inputs
    AlertRule,
    // Delivery
    BatchKey,
    Channel,
    Claim,
    Frequency,
    // History
    HistoryEntry,
    HistoryOutcome,
    JobStatus,
    // Matching
    MatchCursor,
    MatchEvent,
    MatchKey,
    NotificationJob,
    NotificationPreference,
    QuietHours,
    RuleKind,
    RuleTarget,
    TradeAmount,
    TradeRecord,
    TransactionType,
    TransitionError,
};
pub use values::{Amount, EntryId, JobId, MemberId, OwnerId, RuleId, Ticker, Timestamp, TradeId};
