//! Delivery worker
//!
//! A worker repeatedly fetches due jobs, claims each with the store's CAS and
//! sends it. Losing a claim race is normal and silent.

use chrono::TimeDelta;
use herald_core::{HistoryEntry, HistoryOutcome, JobId, NotificationJob};
use herald_gateway::render;
use herald_ports::{DeliveryOutcome, StoreError};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::{PoolConfig, RetryPolicy};
use crate::error::Result;
use crate::pool::DeliveryContext;

/// What happened to one claimed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Sent,
    /// Transient failure, back to pending after `delay`
    Retrying { retry: u32, delay: Duration },
    Failed(HistoryOutcome),
    /// The sweep reclaimed the job while we were sending
    ClaimLost,
}

/// Counters for one pass over the due queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    pub lost: usize,
}

impl WorkerStats {
    fn record(&mut self, attempt: &Attempt) {
        self.claimed += 1;
        match attempt {
            Attempt::Sent => self.sent += 1,
            Attempt::Retrying { .. } => self.retried += 1,
            Attempt::Failed(_) => self.failed += 1,
            Attempt::ClaimLost => self.lost += 1,
        }
    }

    pub fn merge(&mut self, other: WorkerStats) {
        self.claimed += other.claimed;
        self.sent += other.sent;
        self.retried += other.retried;
        self.failed += other.failed;
        self.lost += other.lost;
    }
}

pub struct DeliveryWorker {
    id: String,
    ctx: DeliveryContext,
    policy: RetryPolicy,
    send_timeout: Duration,
    claim_batch: usize,
    poll_interval: Duration,
}

impl DeliveryWorker {
    pub fn new(id: impl Into<String>, ctx: DeliveryContext, config: &PoolConfig, policy: RetryPolicy) -> Self {
        Self {
            id: id.into(),
            ctx,
            policy,
            send_timeout: config.send_timeout(),
            claim_batch: config.claim_batch.max(1),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// One pass over the jobs due now
    pub async fn run_once(&self) -> Result<WorkerStats> {
        self.drain(|| false).await
    }

    async fn drain(&self, stopping: impl Fn() -> bool) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        let now = self.ctx.clock.now();
        let due = self.ctx.jobs.due(now, self.claim_batch).await?;

        for job_id in due {
            if stopping() {
                break;
            }
            let now = self.ctx.clock.now();
            let Some(job) = self.ctx.jobs.try_claim(job_id, &self.id, now).await? else {
                debug!("[{}] lost claim race for {}", self.id, job_id);
                continue;
            };
            let attempt = self.deliver(job).await?;
            stats.record(&attempt);
        }
        Ok(stats)
    }

    /// Send a claimed job and record the result
    pub async fn deliver(&self, job: NotificationJob) -> Result<Attempt> {
        let Some(token) = job.claim.as_ref().map(|c| c.token) else {
            return Err(StoreError::ClaimLost(job.id).into());
        };

        let rendered = render(&job);
        // Rate limiting waits here, outside the send timeout
        self.ctx.provider.reserve().await;
        let outcome = match tokio::time::timeout(
            self.send_timeout,
            self.ctx.provider.send(&job.recipient, &rendered),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => DeliveryOutcome::Transient(format!(
                "{} timed out after {:?}",
                self.ctx.provider.name(),
                self.send_timeout
            )),
        };

        match outcome {
            DeliveryOutcome::Delivered => self.finish(&job, token, HistoryOutcome::Sent, None).await,
            DeliveryOutcome::Permanent(reason) => {
                warn!("[{}] job {} failed permanently: {}", self.id, job.id, reason);
                self.finish(&job, token, HistoryOutcome::FailedPermanent, Some(reason))
                    .await
            }
            DeliveryOutcome::Transient(reason) if self.policy.should_retry(job.retry_count) => {
                let retry = job.retry_count + 1;
                let delay = self.policy.backoff(retry);
                let at = self.ctx.clock.now()
                    + TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::days(1));
                match self.ctx.jobs.schedule_retry(job.id, token, at, reason.clone()).await {
                    Ok(_) => {
                        info!(
                            "[{}] job {} transient failure ({}), retry {} in {:?}",
                            self.id, job.id, reason, retry, delay
                        );
                        Ok(Attempt::Retrying { retry, delay })
                    }
                    Err(StoreError::ClaimLost(id)) => Ok(self.lost(id)),
                    Err(e) => Err(e.into()),
                }
            }
            DeliveryOutcome::Transient(reason) => {
                warn!(
                    "[{}] job {} gave up after {} attempts: {}",
                    self.id,
                    job.id,
                    job.attempts(),
                    reason
                );
                self.finish(&job, token, HistoryOutcome::FailedExhaustedRetries, Some(reason))
                    .await
            }
        }
    }

    async fn finish(
        &self,
        job: &NotificationJob,
        token: Uuid,
        outcome: HistoryOutcome,
        error: Option<String>,
    ) -> Result<Attempt> {
        let done = match self.ctx.jobs.complete(job.id, token, outcome, error.clone()).await {
            Ok(done) => done,
            Err(StoreError::ClaimLost(id)) => return Ok(self.lost(id)),
            Err(e) => return Err(e.into()),
        };

        let entry = HistoryEntry::for_job(&done, outcome, done.attempts(), error, self.ctx.clock.now());
        if !self.ctx.history.append(entry).await? {
            debug!("[{}] history for job {} already recorded", self.id, done.id);
        }
        self.ctx.jobs.archive(done.id).await?;

        if outcome == HistoryOutcome::Sent {
            info!("[{}] job {} sent to {}", self.id, done.id, done.recipient);
            Ok(Attempt::Sent)
        } else {
            Ok(Attempt::Failed(outcome))
        }
    }

    fn lost(&self, job_id: JobId) -> Attempt {
        warn!("[{}] claim on job {} was reclaimed, dropping result", self.id, job_id);
        Attempt::ClaimLost
    }

    /// Poll until `shutdown` flips to true. The send in progress when the
    /// signal arrives is finished; no new job is claimed after it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("[{}] Worker started", self.id);
        let mut ticker = tokio::time::interval(self.poll_interval);
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
                    let stop = shutdown.clone();
                    match self.drain(move || *stop.borrow()).await {
                        Ok(stats) if stats.claimed > 0 => {
                            debug!("[{}] pass: {:?}", self.id, stats);
                        }
                        Ok(_) => {}
                        Err(e) => error!("[{}] delivery pass failed: {}", self.id, e),
                    }
                }
            }
        }

        info!("[{}] Worker stopped", self.id);
    }
}
