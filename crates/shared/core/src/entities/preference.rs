use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::values::OwnerId;

/// How often an owner wants to hear about matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Immediate,
    DailyDigest,
    WeeklyDigest,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Immediate => write!(f, "immediate"),
            Frequency::DailyDigest => write!(f, "daily_digest"),
            Frequency::WeeklyDigest => write!(f, "weekly_digest"),
        }
    }
}

/// Local-time window during which notifications are held back
///
/// `start < end` is a same-day window `[start, end)`. `start > end` wraps
/// past midnight. `start == end` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether a local wall-clock time falls inside the window
    pub fn contains(&self, local: NaiveTime) -> bool {
        if self.is_empty() {
            false
        } else if self.wraps_midnight() {
            local >= self.start || local < self.end
        } else {
            local >= self.start && local < self.end
        }
    }
}

/// Per-owner notification settings, owned by the user-management collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub owner_id: OwnerId,
    pub email: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    /// Owner's timezone as minutes east of UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_enabled() -> bool {
    true
}

impl NotificationPreference {
    pub fn new(owner_id: OwnerId, email: impl Into<String>) -> Self {
        Self {
            owner_id,
            email: email.into(),
            enabled: true,
            frequency: Frequency::Immediate,
            quiet_hours: None,
            utc_offset_minutes: 0,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_quiet_hours(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.quiet_hours = Some(QuietHours::new(start, end));
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The owner's timezone, `None` if the stored offset is out of range
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }
}
