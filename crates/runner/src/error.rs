//! Error types for the engine entry points

use herald_core::{EntryId, HistoryOutcome};
use herald_delivery::DeliveryError;
use herald_gateway::GatewayError;
use herald_ports::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Infrastructure failure; the next trigger retries the pass
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("History entry {0} not found")]
    EntryNotFound(EntryId),

    #[error("History entry {entry_id} is {outcome} and cannot be retried")]
    NotRetryable {
        entry_id: EntryId,
        outcome: HistoryOutcome,
    },

    #[error("History entry {0} was already retried")]
    AlreadyRetried(EntryId),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
