//! Herald Delivery Scheduler
//!
//! Turns match events into notification jobs according to each owner's
//! preferences. Planning is a pure function of the events, the preferences
//! and `now`: it never sleeps, never reads the clock and never touches a store.
//!
//! ```text
//!  MatchEvents ──► group by owner ──┬─ disabled ──────────► suppressed history
//!                                   ├─ no preference ─────► left unscheduled
//!                                   ├─ immediate ─────────► one job per event
//!                                   │     └ in quiet hours ► one job at window end
//!                                   ├─ daily digest ──────► one job per local day
//!                                   └─ weekly digest ─────► one job per ISO week
//! ```

pub mod config;
pub mod error;
pub mod windows;

mod scheduler;

pub use config::SchedulerConfig;
pub use error::{Result, ScheduleError};
pub use scheduler::{DeliveryScheduler, SchedulePlan};
