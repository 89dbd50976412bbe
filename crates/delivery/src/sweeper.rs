//! Crash recovery for the job queue

use chrono::TimeDelta;
use herald_core::{HistoryEntry, HistoryOutcome, JobStatus, NotificationJob};
use log::{error, info, warn};
use std::time::Duration;
use tokio::sync::watch;

use crate::error::Result;
use crate::pool::DeliveryContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// In-flight jobs returned to pending
    pub released: usize,
    /// Terminal jobs whose missing history entry was written here
    pub recovered: usize,
    /// Terminal jobs removed from the queue
    pub archived: usize,
}

/// Periodically releases stuck jobs and finishes half-completed ones
pub struct Sweeper {
    ctx: DeliveryContext,
    stuck_timeout: Duration,
}

impl Sweeper {
    pub fn new(ctx: DeliveryContext, stuck_timeout: Duration) -> Self {
        Self { ctx, stuck_timeout }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let now = self.ctx.clock.now();
        let stuck_for = TimeDelta::from_std(self.stuck_timeout).unwrap_or_else(|_| TimeDelta::days(1));

        let released = self.ctx.jobs.release_stuck(now - stuck_for).await?;
        for job_id in &released {
            warn!("[sweeper] job {} was stuck in flight, released", job_id);
        }
        report.released = released.len();

        // A worker that crashed between completing a job and archiving it
        // leaves a terminal job behind, possibly without history.
        for job in self.ctx.jobs.terminal().await? {
            let outcome = job.outcome.unwrap_or_else(|| fallback_outcome(&job));
            let entry = HistoryEntry::for_job(&job, outcome, attempts(&job, outcome), job.last_error.clone(), now);
            if self.ctx.history.append(entry).await? {
                info!("[sweeper] recovered history for job {} ({})", job.id, outcome);
                report.recovered += 1;
            }
            if self.ctx.jobs.archive(job.id).await? {
                report.archived += 1;
            }
        }

        Ok(report)
    }

    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("[sweeper] started, stuck timeout {:?}", self.stuck_timeout);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

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
                    if let Err(e) = self.sweep().await {
                        error!("[sweeper] sweep failed: {}", e);
                    }
                }
            }
        }
        info!("[sweeper] stopped");
    }
}

fn fallback_outcome(job: &NotificationJob) -> HistoryOutcome {
    match job.status {
        JobStatus::Sent => HistoryOutcome::Sent,
        JobStatus::Suppressed => HistoryOutcome::Suppressed,
        _ => HistoryOutcome::FailedPermanent,
    }
}

fn attempts(job: &NotificationJob, outcome: HistoryOutcome) -> u32 {
    if outcome == HistoryOutcome::Suppressed {
        0
    } else {
        job.attempts()
    }
}
