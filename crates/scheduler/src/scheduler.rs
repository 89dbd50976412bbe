use std::collections::{BTreeMap, HashMap};

use herald_core::{
    BatchKey, Frequency, HistoryEntry, MatchEvent, NotificationJob, NotificationPreference, OwnerId,
    Timestamp,
};
use log::{debug, warn};

use crate::config::SchedulerConfig;
use crate::error::{Result, ScheduleError};
use crate::windows;

/// Everything one scheduling pass decided
#[derive(Debug, Clone, Default)]
pub struct SchedulePlan {
    /// Pending jobs to enqueue
    pub jobs: Vec<NotificationJob>,
    /// History entries for owners with notifications disabled
    pub suppressed: Vec<HistoryEntry>,
    /// Events left for a later run (no preference, or an invalid one)
    pub unscheduled: Vec<MatchEvent>,
    /// Owners whose preference could not be applied
    pub errors: Vec<ScheduleError>,
}

impl SchedulePlan {
    /// Events that ended up in a job or a suppressed entry
    pub fn scheduled_events(&self) -> usize {
        self.jobs.iter().map(|j| j.events.len()).sum::<usize>()
            + self.suppressed.iter().map(|e| e.events.len()).sum::<usize>()
    }
}

/// Applies frequency, quiet hours and digest windows to match events
#[derive(Debug, Clone, Default)]
pub struct DeliveryScheduler {
    config: SchedulerConfig,
}

impl DeliveryScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Plan jobs for `events` as of `now`
    pub fn schedule(
        &self,
        events: Vec<MatchEvent>,
        preferences: &HashMap<OwnerId, NotificationPreference>,
        now: Timestamp,
    ) -> SchedulePlan {
        let mut by_owner: BTreeMap<OwnerId, Vec<MatchEvent>> = BTreeMap::new();
        for event in events {
            by_owner.entry(event.owner_id).or_default().push(event);
        }

        let mut plan = SchedulePlan::default();
        for (owner_id, events) in by_owner {
            let Some(preference) = preferences.get(&owner_id) else {
                debug!(
                    "[scheduler] owner {} has no preference, holding {} events",
                    owner_id,
                    events.len()
                );
                plan.unscheduled.extend(events);
                continue;
            };

            if !preference.enabled {
                debug!("[scheduler] owner {} disabled, suppressing {} events", owner_id, events.len());
                plan.suppressed
                    .push(HistoryEntry::suppressed(owner_id, preference.email.clone(), events, now));
                continue;
            }

            match self.plan_owner(preference, events.clone(), now) {
                Ok(jobs) => plan.jobs.extend(jobs),
                Err(err) => {
                    warn!("[scheduler] {}", err);
                    plan.errors.push(err);
                    plan.unscheduled.extend(events);
                }
            }
        }
        plan
    }

    fn plan_owner(
        &self,
        preference: &NotificationPreference,
        events: Vec<MatchEvent>,
        now: Timestamp,
    ) -> Result<Vec<NotificationJob>> {
        let owner_id = preference.owner_id;
        if preference.email.trim().is_empty() {
            return Err(ScheduleError::MissingRecipient { owner_id });
        }
        let offset = preference.offset().ok_or(ScheduleError::InvalidOffset {
            owner_id,
            minutes: preference.utc_offset_minutes,
        })?;
        let local_now = windows::local_time(now, offset);
        let quiet = preference.quiet_hours.as_ref();
        let recipient = &preference.email;

        let jobs = match preference.frequency {
            Frequency::Immediate => {
                match quiet.map(|q| windows::quiet_window_end(q, local_now)).transpose()?.flatten() {
                    Some(window_end) => {
                        let until = windows::to_utc(window_end, offset);
                        vec![
                            NotificationJob::new(owner_id, recipient, events, until, now)
                                .with_batch_key(BatchKey::QuietHours { owner_id, until }),
                        ]
                    }
                    None => events
                        .into_iter()
                        .map(|event| NotificationJob::new(owner_id, recipient, vec![event], now, now))
                        .collect(),
                }
            }
            Frequency::DailyDigest => {
                let date = local_now.date();
                let dispatch = windows::daily_dispatch(date, self.config.daily_dispatch_time)?;
                let dispatch = windows::outside_quiet_hours(quiet, dispatch)?;
                vec![
                    NotificationJob::new(owner_id, recipient, events, windows::to_utc(dispatch, offset), now)
                        .with_batch_key(BatchKey::Daily { owner_id, date }),
                ]
            }
            Frequency::WeeklyDigest => {
                let week_start = windows::week_start(local_now.date())?;
                let dispatch = windows::weekly_dispatch(
                    week_start,
                    self.config.weekly_dispatch_day,
                    self.config.daily_dispatch_time,
                )?;
                let dispatch = windows::outside_quiet_hours(quiet, dispatch)?;
                vec![
                    NotificationJob::new(owner_id, recipient, events, windows::to_utc(dispatch, offset), now)
                        .with_batch_key(BatchKey::Weekly { owner_id, week_start }),
                ]
            }
        };
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
    use herald_core::{AlertRule, HistoryOutcome, TradeAmount, TradeRecord, TransactionType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn events(owner: OwnerId, n: usize, now: Timestamp) -> Vec<MatchEvent> {
        let rule = AlertRule::threshold(owner, "big", dec!(100000));
        (0..n)
            .map(|i| {
                let trade = TradeRecord::new(
                    format!("T-{i}"),
                    "P000197",
                    "Nancy Pelosi",
                    TransactionType::Purchase,
                    TradeAmount::exact(dec!(250000)),
                    now,
                )
                .with_ticker("NVDA");
                MatchEvent::new(&rule, &trade, now)
            })
            .collect()
    }

    fn prefs(pref: NotificationPreference) -> HashMap<OwnerId, NotificationPreference> {
        HashMap::from([(pref.owner_id, pref)])
    }

    #[test]
    fn test_immediate_one_job_per_event() {
        let owner = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap();
        let plan = DeliveryScheduler::default().schedule(
            events(owner, 3, now),
            &prefs(NotificationPreference::new(owner, "u@example.com")),
            now,
        );

        assert_eq!(plan.jobs.len(), 3);
        assert!(plan.jobs.iter().all(|j| j.scheduled_for == now && j.batch_key.is_none()));
        assert!(plan.jobs.iter().all(|j| j.events.len() == 1));
    }

    #[test]
    fn test_quiet_hours_defer_to_window_end() {
        let owner = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 23, 0, 0).unwrap();
        let pref = NotificationPreference::new(owner, "u@example.com").with_quiet_hours(hm(22, 0), hm(8, 0));

        let plan = DeliveryScheduler::default().schedule(events(owner, 2, now), &prefs(pref), now);

        let expected = Utc.with_ymd_and_hms(2024, 5, 7, 8, 0, 0).unwrap();
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].events.len(), 2);
        assert_eq!(plan.jobs[0].scheduled_for, expected);
        assert_eq!(
            plan.jobs[0].batch_key,
            Some(BatchKey::QuietHours { owner_id: owner, until: expected })
        );
    }

    #[test]
    fn test_quiet_hours_in_owner_timezone() {
        let owner = Uuid::new_v4();
        // 04:00 UTC is 23:00 at UTC-5
        let now = Utc.with_ymd_and_hms(2024, 5, 7, 4, 0, 0).unwrap();
        let pref = NotificationPreference::new(owner, "u@example.com")
            .with_quiet_hours(hm(22, 0), hm(8, 0))
            .with_utc_offset_minutes(-300);

        let plan = DeliveryScheduler::default().schedule(events(owner, 1, now), &prefs(pref), now);

        // 08:00 local on 2024-05-07 is 13:00 UTC
        assert_eq!(
            plan.jobs[0].scheduled_for,
            Utc.with_ymd_and_hms(2024, 5, 7, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_digest_bucket() {
        let owner = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap();
        let pref = NotificationPreference::new(owner, "u@example.com").with_frequency(Frequency::DailyDigest);

        let plan = DeliveryScheduler::default().schedule(events(owner, 4, now), &prefs(pref), now);

        assert_eq!(plan.jobs.len(), 1);
        let job = &plan.jobs[0];
        assert_eq!(job.events.len(), 4);
        assert_eq!(job.scheduled_for, Utc.with_ymd_and_hms(2024, 5, 7, 8, 0, 0).unwrap());
        assert_eq!(
            job.batch_key,
            Some(BatchKey::Daily {
                owner_id: owner,
                date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
            })
        );
    }

    #[test]
    fn test_same_day_runs_share_batch_key() {
        let owner = Uuid::new_v4();
        let morning = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let evening = morning + Duration::hours(12);
        let pref = NotificationPreference::new(owner, "u@example.com").with_frequency(Frequency::DailyDigest);
        let prefs = prefs(pref);
        let scheduler = DeliveryScheduler::default();

        let first = scheduler.schedule(events(owner, 1, morning), &prefs, morning);
        let second = scheduler.schedule(events(owner, 1, evening), &prefs, evening);
        assert_eq!(first.jobs[0].batch_key, second.jobs[0].batch_key);
    }

    #[test]
    fn test_weekly_digest_dispatch_day() {
        let owner = Uuid::new_v4();
        // Thursday
        let now = Utc.with_ymd_and_hms(2024, 5, 9, 14, 0, 0).unwrap();
        let pref = NotificationPreference::new(owner, "u@example.com").with_frequency(Frequency::WeeklyDigest);
        let scheduler = DeliveryScheduler::new(SchedulerConfig {
            daily_dispatch_time: hm(7, 30),
            weekly_dispatch_day: Weekday::Tue,
        });

        let plan = scheduler.schedule(events(owner, 2, now), &prefs(pref), now);

        let job = &plan.jobs[0];
        assert_eq!(job.scheduled_for, Utc.with_ymd_and_hms(2024, 5, 14, 7, 30, 0).unwrap());
        assert_eq!(
            job.batch_key,
            Some(BatchKey::Weekly {
                owner_id: owner,
                week_start: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
            })
        );
    }

    #[test]
    fn test_digest_dispatch_respects_quiet_hours() {
        let owner = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap();
        let pref = NotificationPreference::new(owner, "u@example.com")
            .with_frequency(Frequency::DailyDigest)
            .with_quiet_hours(hm(22, 0), hm(9, 0));

        let plan = DeliveryScheduler::default().schedule(events(owner, 1, now), &prefs(pref), now);
        assert_eq!(
            plan.jobs[0].scheduled_for,
            Utc.with_ymd_and_hms(2024, 5, 7, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_disabled_owner_is_suppressed() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let pref = NotificationPreference::new(owner, "u@example.com").disabled();

        let plan = DeliveryScheduler::default().schedule(events(owner, 2, now), &prefs(pref), now);

        assert!(plan.jobs.is_empty());
        assert_eq!(plan.suppressed.len(), 1);
        assert_eq!(plan.suppressed[0].outcome, HistoryOutcome::Suppressed);
        assert_eq!(plan.suppressed[0].events.len(), 2);
        assert_eq!(plan.scheduled_events(), 2);
    }

    #[test]
    fn test_missing_preference_leaves_events() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let plan = DeliveryScheduler::default().schedule(events(owner, 2, now), &HashMap::new(), now);

        assert!(plan.jobs.is_empty());
        assert_eq!(plan.unscheduled.len(), 2);
    }

    #[test]
    fn test_invalid_offset_is_reported() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let pref = NotificationPreference::new(owner, "u@example.com").with_utc_offset_minutes(100_000);

        let plan = DeliveryScheduler::default().schedule(events(owner, 1, now), &prefs(pref), now);

        assert_eq!(plan.unscheduled.len(), 1);
        assert_eq!(
            plan.errors,
            vec![ScheduleError::InvalidOffset { owner_id: owner, minutes: 100_000 }]
        );
    }
}
