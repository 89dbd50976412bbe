//! Trigger Source - periodic match-and-schedule passes

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;

use crate::engine::{AlertEngine, PassReport};

/// Fires [`AlertEngine::run_match_and_schedule`] on a fixed interval
///
/// Each pass gets a deadline; a pass that overruns is dropped and the next
/// tick starts over from the persisted cursor. Failed passes are logged and
/// retried on the next tick.
pub struct Trigger {
    engine: Arc<AlertEngine>,
    interval: Duration,
    deadline: Duration,
}

impl Trigger {
    pub fn new(engine: Arc<AlertEngine>) -> Self {
        let settings = engine.config().matcher;
        Self {
            engine,
            interval: settings.interval(),
            deadline: settings.deadline(),
        }
    }

    /// Run one pass now. `None` if it failed or missed its deadline.
    pub async fn fire(&self) -> Option<PassReport> {
        match tokio::time::timeout(self.deadline, self.engine.run_match_and_schedule()).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                error!("[trigger] pass failed, will retry next tick: {}", e);
                None
            }
            Err(_) => {
                warn!("[trigger] pass exceeded deadline of {:?}", self.deadline);
                None
            }
        }
    }

    /// Fire immediately, then every interval until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("[trigger] started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.fire().await;
                }
            }
        }
        info!("[trigger] stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::MemoryBackend;
    use chrono::{TimeZone, Utc};
    use herald_clock::ManualClock;
    use herald_core::{AlertRule, NotificationPreference, TradeAmount, TradeRecord, TransactionType};
    use herald_gateway::ScriptedProvider;
    use rust_decimal_macros::dec;

    fn engine(backend: &MemoryBackend) -> Arc<AlertEngine> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap());
        let ports = backend.ports(Arc::new(ScriptedProvider::delivering()), clock);
        Arc::new(AlertEngine::new(EngineConfig::default(), ports).unwrap())
    }

    #[tokio::test]
    async fn test_failed_pass_is_retried_next_fire() {
        let backend = MemoryBackend::new();
        let owner = uuid::Uuid::new_v4();
        backend
            .catalog
            .create_rule(AlertRule::member(owner, "pelosi", "P000197"))
            .unwrap();
        backend
            .catalog
            .upsert_preference(NotificationPreference::new(owner, "u@example.com"));
        backend.trades.ingest(TradeRecord::new(
            "T-1",
            "P000197",
            "Nancy Pelosi",
            TransactionType::Sale,
            TradeAmount::exact(dec!(5000)),
            Utc.with_ymd_and_hms(2024, 5, 6, 13, 0, 0).unwrap(),
        ));
        let trigger = Trigger::new(engine(&backend));

        backend.trades.set_unavailable(true);
        assert!(trigger.fire().await.is_none());
        assert!(backend.jobs.is_empty());

        backend.trades.set_unavailable(false);
        let report = trigger.fire().await.unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.jobs_created, 1);

        // Re-firing is harmless
        let again = trigger.fire().await.unwrap();
        assert_eq!(again.matched, 0);
        assert_eq!(backend.jobs.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fires_until_shutdown() {
        let backend = MemoryBackend::new();
        let trigger = Trigger::new(engine(&backend));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(trigger.run(rx));
        tokio::time::sleep(Duration::from_secs(3 * 30 * 60 + 1)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
