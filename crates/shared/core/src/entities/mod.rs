mod history;
mod job;
mod match_event;
mod preference;
mod rule;
mod trade;

pub use history::{HistoryEntry, HistoryOutcome};
pub use job::{BatchKey, Channel, Claim, JobStatus, NotificationJob, TransitionError};
pub use match_event::{MatchCursor, MatchEvent, MatchKey};
pub use preference::{Frequency, NotificationPreference, QuietHours};
pub use rule::{AlertRule, RuleKind, RuleTarget};
pub use trade::{TradeAmount, TradeRecord, TransactionType};
