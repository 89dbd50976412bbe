//! Alert engine - the pipeline entry points
//!
//! Wires the stores, the matcher, the scheduler and the delivery worker into
//! the two passes the trigger drives:
//!
//! 1. [`AlertEngine::run_match_and_schedule`]: pull new trades page by page,
//!    record match events, advance the cursor, then turn pending events into
//!    notification jobs.
//! 2. [`AlertEngine::run_delivery`]: one sweep plus one pass over due jobs.
//!    Long-running deployments use [`AlertEngine::spawn_workers`] instead.
//!
//! Both passes are safe to run concurrently with themselves: duplicates are
//! absorbed by the seen index, match-key reservations and the claim CAS.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use herald_core::{
    EntryId, HistoryEntry, JobId, MatchCursor, MatchEvent, MatchKey, NotificationJob, OwnerId, TradeRecord,
};
use herald_delivery::{DeliveryContext, DeliveryWorker, SweepReport, Sweeper, WorkerPool, WorkerStats};
use herald_gateway::RateLimitedProvider;
use herald_matching::RuleMatcher;
use herald_ports::{
    Clock, CursorStore, DeliveryProvider, EnqueueOutcome, HistoryLedger, HistoryQuery, JobStore,
    MatchEventStore, RuleCatalog, TradeSource,
};
use herald_scheduler::DeliveryScheduler;
use herald_store::{
    InMemoryCursorStore, InMemoryHistoryLedger, InMemoryJobStore, InMemoryMatchEventStore,
    InMemoryRuleCatalog, InMemoryTradeSource,
};
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Everything the engine reads from and writes to
#[derive(Clone)]
pub struct EnginePorts {
    pub trades: Arc<dyn TradeSource>,
    pub catalog: Arc<dyn RuleCatalog>,
    pub match_events: Arc<dyn MatchEventStore>,
    pub cursor: Arc<dyn CursorStore>,
    pub jobs: Arc<dyn JobStore>,
    pub history: Arc<dyn HistoryLedger>,
    pub provider: Arc<dyn DeliveryProvider>,
    pub clock: Arc<dyn Clock>,
}

/// In-memory backing for every store port
///
/// Holds the concrete stores so callers can seed trades and rules, and
/// inspect state, while the engine works through the ports.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub trades: InMemoryTradeSource,
    pub catalog: InMemoryRuleCatalog,
    pub match_events: InMemoryMatchEventStore,
    pub cursor: InMemoryCursorStore,
    pub jobs: InMemoryJobStore,
    pub history: InMemoryHistoryLedger,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(&self, provider: Arc<dyn DeliveryProvider>, clock: Arc<dyn Clock>) -> EnginePorts {
        EnginePorts {
            trades: Arc::new(self.trades.clone()),
            catalog: Arc::new(self.catalog.clone()),
            match_events: Arc::new(self.match_events.clone()),
            cursor: Arc::new(self.cursor.clone()),
            jobs: Arc::new(self.jobs.clone()),
            history: Arc::new(self.history.clone()),
            provider,
            clock,
        }
    }
}

/// Counters for one match-and-schedule pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pages: usize,
    pub trades: usize,
    /// Match events recorded for the first time
    pub matched: usize,
    /// Matches already recorded by an earlier or overlapping pass
    pub duplicates: usize,
    /// Rule/trade pairings that could not be evaluated
    pub skipped: usize,
    pub cursor: MatchCursor,
    pub jobs_created: usize,
    /// Events folded into an existing pending job
    pub events_merged: usize,
    /// Events already reserved by another job
    pub events_dropped: usize,
    /// Events recorded as suppressed because the owner disabled notifications
    pub suppressed: usize,
    /// Events left pending (owner without a usable preference)
    pub held: usize,
}

/// Counters for one delivery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sweep: SweepReport,
    pub stats: WorkerStats,
}

pub struct AlertEngine {
    config: EngineConfig,
    trades: Arc<dyn TradeSource>,
    catalog: Arc<dyn RuleCatalog>,
    match_events: Arc<dyn MatchEventStore>,
    cursor: Arc<dyn CursorStore>,
    matcher: RuleMatcher,
    scheduler: DeliveryScheduler,
    delivery: DeliveryContext,
    worker: DeliveryWorker,
    sweeper: Sweeper,
}

impl AlertEngine {
    /// Build an engine over `ports`. The provider is wrapped in the
    /// configured rate limiter.
    pub fn new(config: EngineConfig, ports: EnginePorts) -> Result<Self> {
        config.validate()?;

        let provider: Arc<dyn DeliveryProvider> =
            Arc::new(RateLimitedProvider::new(ports.provider, config.rate_limit)?);
        let delivery = DeliveryContext {
            jobs: ports.jobs,
            history: ports.history,
            provider,
            clock: ports.clock,
        };

        Ok(Self {
            matcher: RuleMatcher::new(ports.match_events.clone()),
            scheduler: DeliveryScheduler::new(config.scheduler),
            worker: DeliveryWorker::new("engine", delivery.clone(), &config.pool, config.retry),
            sweeper: Sweeper::new(delivery.clone(), config.pool.stuck_timeout()),
            trades: ports.trades,
            catalog: ports.catalog,
            match_events: ports.match_events,
            cursor: ports.cursor,
            delivery,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Match every trade ingested since the cursor, then schedule pending
    /// match events. A store failure aborts the pass; whatever was recorded
    /// before it is kept and the next pass picks up from there.
    pub async fn run_match_and_schedule(&self) -> Result<PassReport> {
        let mut report = PassReport::default();
        self.match_new_trades(&mut report).await?;
        self.schedule_pending(&mut report).await?;

        info!(
            "[engine] pass: {} trades in {} pages, {} matched, {} duplicate, {} jobs created, {} merged, {} suppressed, {} held",
            report.trades,
            report.pages,
            report.matched,
            report.duplicates,
            report.jobs_created,
            report.events_merged,
            report.suppressed,
            report.held
        );
        Ok(report)
    }

    async fn match_new_trades(&self, report: &mut PassReport) -> Result<()> {
        let rules = self.catalog.active_rules().await?;
        let mut cursor = self.cursor.load().await?;
        let page_size = self.config.matcher.page_size;
        let mut limit = page_size;

        loop {
            let page = self.trades.trades_since(cursor.last_ingested_at, limit).await?;
            let full = page.len() >= limit;
            let page = if full {
                match complete_timestamps(page) {
                    Some(page) => page,
                    None => {
                        // Every trade in the page shares one timestamp; widen
                        // the page until the run of equal timestamps fits.
                        limit = limit.saturating_mul(2);
                        debug!("[engine] page of equal timestamps, widening to {}", limit);
                        continue;
                    }
                }
            } else {
                page
            };

            let batch = self
                .matcher
                .match_batch(&page, &rules, cursor, self.delivery.clock.now())
                .await?;
            cursor = self.cursor.advance(batch.cursor).await?;

            report.pages += 1;
            report.trades += page.len();
            report.matched += batch.events.len();
            report.duplicates += batch.duplicates;
            report.skipped += batch.skipped.len();

            if !full {
                break;
            }
            limit = page_size;
        }

        report.cursor = cursor;
        Ok(())
    }

    /// Walk the whole outbox in `schedule_batch` pages. Held events stay in
    /// place, so each page starts after the last event offered, not at the
    /// front of the outbox.
    async fn schedule_pending(&self, report: &mut PassReport) -> Result<()> {
        let limit = self.config.matcher.schedule_batch;
        let mut after = None;

        loop {
            let events = self.match_events.unscheduled(after.as_ref(), limit).await?;
            let full = events.len() >= limit;
            after = match events.last() {
                Some(last) => Some(last.clone()),
                None => break,
            };
            self.schedule_page(events, report).await?;
            if !full {
                break;
            }
        }
        Ok(())
    }

    async fn schedule_page(&self, events: Vec<MatchEvent>, report: &mut PassReport) -> Result<()> {
        let owners: BTreeSet<OwnerId> = events.iter().map(|e| e.owner_id).collect();
        let mut preferences = HashMap::new();
        for owner_id in owners {
            if let Some(preference) = self.catalog.preference(owner_id).await? {
                preferences.insert(owner_id, preference);
            }
        }

        let plan = self
            .scheduler
            .schedule(events, &preferences, self.delivery.clock.now());
        report.held += plan.unscheduled.len();

        let mut retired: Vec<MatchKey> = Vec::new();
        for job in plan.jobs {
            let keys = job.keys();
            let offered = keys.len();
            match self.delivery.jobs.enqueue(job).await? {
                EnqueueOutcome::Created { job_id, events } => {
                    debug!("[engine] job {} created with {} events", job_id, events);
                    report.jobs_created += 1;
                    report.events_dropped += offered - events;
                }
                EnqueueOutcome::Merged { job_id, added } => {
                    debug!("[engine] {} events merged into job {}", added, job_id);
                    report.events_merged += added;
                    report.events_dropped += offered - added;
                }
                EnqueueOutcome::Duplicate => report.events_dropped += offered,
            }
            retired.extend(keys);
        }

        for mut entry in plan.suppressed {
            let keys: Vec<MatchKey> = entry.events.iter().map(|e| e.key()).collect();
            let fresh: HashSet<MatchKey> = self
                .delivery
                .jobs
                .reserve_matches(entry.job_id, &keys)
                .await?
                .into_iter()
                .collect();
            retired.extend(keys);

            entry.events.retain(|e| fresh.contains(&e.key()));
            if entry.events.is_empty() {
                continue;
            }
            report.suppressed += entry.events.len();
            self.delivery.history.append(entry).await?;
        }

        self.match_events.retire(&retired).await?;
        Ok(())
    }

    /// Release stuck jobs, recover half-finished ones, then deliver every
    /// job due now
    pub async fn run_delivery(&self) -> Result<DeliveryReport> {
        let sweep = self.sweeper.sweep().await?;
        let stats = self.worker.run_once().await?;
        Ok(DeliveryReport { sweep, stats })
    }

    /// Start the long-running worker pool and sweeper
    pub fn spawn_workers(&self) -> WorkerPool {
        WorkerPool::spawn(self.delivery.clone(), self.config.pool, self.config.retry)
    }

    /// History entries matching `query`, oldest first
    pub async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        Ok(self.delivery.history.query(query).await?)
    }

    /// Re-send the events of a failed history entry as a new pending job.
    /// Each entry can be retried once.
    pub async fn retry(&self, entry_id: EntryId) -> Result<JobId> {
        let entry = self
            .delivery
            .history
            .get(entry_id)
            .await?
            .ok_or(EngineError::EntryNotFound(entry_id))?;
        if !entry.is_retryable() {
            return Err(EngineError::NotRetryable {
                entry_id,
                outcome: entry.outcome,
            });
        }

        let now = self.delivery.clock.now();
        let job = NotificationJob::new(entry.owner_id, entry.recipient, entry.events, now, now)
            .with_retry_of(entry_id);
        let job_id = job.id;

        if !self.delivery.history.mark_retried(entry_id, job_id).await? {
            return Err(EngineError::AlreadyRetried(entry_id));
        }
        self.delivery.jobs.requeue(job).await?;

        info!("[engine] history entry {} retried as job {}", entry_id, job_id);
        Ok(job_id)
    }
}

/// Drop the trailing run of trades sharing the page's last timestamp, so the
/// cursor never lands inside a group that continues on the next page.
/// `None` if the whole page is one such run.
fn complete_timestamps(mut page: Vec<TradeRecord>) -> Option<Vec<TradeRecord>> {
    let last = page.last()?.ingested_at;
    let keep = page.iter().take_while(|t| t.ingested_at < last).count();
    if keep == 0 {
        warn!("[engine] {} trades share ingestion time {}", page.len(), last);
        return None;
    }
    page.truncate(keep);
    Some(page)
}
