use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Dollar amount - uses Decimal for precision
pub type Amount = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Identifier of the user who owns rules, preferences and notifications
pub type OwnerId = Uuid;

/// Identifier of an alert rule
pub type RuleId = Uuid;

/// Identifier of a notification job
pub type JobId = Uuid;

/// Identifier of a history entry
pub type EntryId = Uuid;

/// Identifier assigned to a trade by the ingestion collaborator
pub type TradeId = String;

/// Identifier of the reporting member (e.g. a bioguide id)
pub type MemberId = String;

/// Ticker symbol
pub type Ticker = String;
