use chrono::Utc;
use herald_core::Timestamp;
use herald_ports::Clock;

/// Wall-clock UTC, for production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}
