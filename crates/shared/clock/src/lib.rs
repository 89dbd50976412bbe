//! Herald Clock
//!
//! Time sources for the engine:
//!
//! - [`SystemClock`]: wall-clock UTC, used by the `herald` binary
//! - [`ManualClock`]: frozen time advanced by hand, used by tests to step
//!   through quiet hours, digest periods and retry backoff
//!
//! ```ignore
//! use herald_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(start);
//! engine.run_match_and_schedule().await?;
//! clock.advance(Duration::hours(9)); // past quiet hours
//! engine.run_delivery().await?;
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use herald_ports::Clock;
