//! Herald Runner - Trade Alert Engine
//!
//! Orchestrates the full alert pipeline:
//!
//! - **Engine**: the match-and-schedule and delivery entry points
//! - **Trigger**: periodic, deadline-bounded match-and-schedule passes
//! - **Config**: JSON engine configuration
//! - **Fixture**: seed rules, preferences and trades for local runs
//!
//! ## Architecture
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │     Trigger     │  every 30 min
//!                  └────────┬────────┘
//!                           │ run_match_and_schedule
//!                           ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ TradeSource  │──▶│ Rule Matcher │──▶│ MatchEvents  │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                    ┌──────────────┐          ▼
//!                    │ Preferences  │──▶ Delivery Scheduler
//!                    └──────────────┘          │ jobs
//!                                              ▼
//!                                       ┌──────────────┐
//!                                       │   JobStore   │
//!                                       └──────┬───────┘
//!                                              │ claim (CAS)
//!                              ┌───────────────┼───────────────┐
//!                              ▼               ▼               ▼
//!                          worker-0        worker-1   ...  worker-N
//!                              └───────────────┼───────────────┘
//!                                              │ rate limiter
//!                                              ▼
//!                                    DeliveryProvider ──▶ History
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod trigger;

// Re-export main types
pub use config::{ConfigError, EngineConfig, MatcherSettings};
pub use engine::{AlertEngine, DeliveryReport, EnginePorts, MemoryBackend, PassReport};
pub use error::{EngineError, Result};
pub use fixture::{Fixture, FixtureRule};
pub use trigger::Trigger;
