//! Herald Store
//!
//! In-memory implementations of every Herald storage port:
//!
//! - [`InMemoryTradeSource`]: ingested trades, paginated by ingestion time
//! - [`InMemoryRuleCatalog`]: alert rules and notification preferences
//! - [`InMemoryMatchEventStore`]: the matcher's seen index and outbox
//! - [`InMemoryCursorStore`]: the matcher's high-water mark
//! - [`InMemoryJobStore`]: the notification job queue
//! - [`InMemoryHistoryLedger`]: append-only delivery history
//!
//! All stores are thread-safe (DashMap per-entry locking) and cheap to clone;
//! clones share state.

mod catalog;
mod cursor;
mod history;
mod jobs;
mod match_events;
mod trades;

pub use catalog::InMemoryRuleCatalog;
pub use cursor::InMemoryCursorStore;
pub use history::InMemoryHistoryLedger;
pub use jobs::InMemoryJobStore;
pub use match_events::InMemoryMatchEventStore;
pub use trades::InMemoryTradeSource;
