//! Herald Ports
//!
//! Port definitions (traits) for the Herald trade alert engine.
//! These define the boundaries between pipeline logic and infrastructure:
//! the collaborators that feed the engine, the stores it persists to, and
//! the provider it delivers through.

mod clock;
mod delivery;
mod error;
mod sources;
mod stores;

pub use clock::Clock;
pub use delivery::{DeliveryOutcome, DeliveryProvider, RenderedNotification};
pub use error::{StoreError, StoreResult};
pub use sources::{RuleCatalog, TradeSource};
pub use stores::{
    CursorStore, EnqueueOutcome, HistoryLedger, HistoryQuery, JobStore, MatchEventStore,
};
