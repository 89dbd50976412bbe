//! Scheduler configuration

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// When digests go out, in the owner's local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Local time of day daily and weekly digests are dispatched ("08:00:00")
    pub daily_dispatch_time: NaiveTime,
    /// Weekday weekly digests are dispatched on ("Mon")
    pub weekly_dispatch_day: Weekday,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_dispatch_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            weekly_dispatch_day: Weekday::Mon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"weekly_dispatch_day": "Fri"}"#).unwrap();
        assert_eq!(config.weekly_dispatch_day, Weekday::Fri);
        assert_eq!(config.daily_dispatch_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }
}
