//! Herald Delivery Worker Pool
//!
//! Moves notification jobs through their state machine:
//!
//! ```text
//! Pending ──claim (CAS)──► InFlight ──send──┬─ Delivered ─────────► Sent
//!    ▲                                      ├─ Permanent ─────────► Failed
//!    │                                      └─ Transient / timeout
//!    │                                            ├ retries left ─► Pending (backoff)
//!    └──────────── stuck sweep ◄────────          └ exhausted ────► Failed
//! ```
//!
//! Every terminal job gets exactly one history entry and is then archived.
//! The sweeper recovers both halves of a crash: jobs stuck in flight, and
//! terminal jobs whose history write never happened.

pub mod config;
pub mod error;

mod pool;
mod sweeper;
mod worker;

pub use config::{PoolConfig, RetryPolicy};
pub use error::{DeliveryError, Result};
pub use pool::{DeliveryContext, WorkerPool};
pub use sweeper::{SweepReport, Sweeper};
pub use worker::{Attempt, DeliveryWorker, WorkerStats};
