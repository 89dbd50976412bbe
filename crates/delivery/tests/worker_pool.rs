//! Integration test: several workers draining one queue
//!
//! Workers race on the same due jobs through the store's claim CAS. Every
//! job must be sent exactly once and leave exactly one history entry, even
//! with transient failures and retries mixed in.

use chrono::{TimeDelta, TimeZone, Utc};
use herald_clock::ManualClock;
use herald_core::{
    AlertRule, HistoryOutcome, MatchEvent, NotificationJob, TradeAmount, TradeRecord,
    TransactionType,
};
use herald_delivery::{DeliveryContext, PoolConfig, RetryPolicy, WorkerPool, WorkerStats, DeliveryWorker};
use herald_gateway::ScriptedProvider;
use herald_ports::{Clock, DeliveryOutcome, HistoryLedger, HistoryQuery, JobStore};
use herald_store::{InMemoryHistoryLedger, InMemoryJobStore};
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn seed(jobs: &InMemoryJobStore, clock: &ManualClock, n: usize) {
    let rule = AlertRule::ticker(Uuid::new_v4(), "Chip stocks", "NVDA");
    let now = clock.now();
    for i in 0..n {
        let trade = TradeRecord::new(
            format!("T-{i}"),
            "P000197",
            "Nancy Pelosi",
            TransactionType::Purchase,
            TradeAmount::range(dec!(1001), dec!(15000)),
            now,
        )
        .with_ticker("NVDA");
        let job = NotificationJob::new(
            rule.owner_id,
            format!("user{i}@example.com"),
            vec![MatchEvent::new(&rule, &trade, now)],
            now,
            now,
        );
        jobs.enqueue(job).await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_workers_send_each_job_once() {
    let _ = env_logger::builder().is_test(true).try_init();

    let jobs = InMemoryJobStore::new();
    let history = InMemoryHistoryLedger::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap());
    let provider = Arc::new(ScriptedProvider::delivering().with_delay(Duration::from_millis(2)));
    seed(&jobs, &clock, 40).await;

    let ctx = DeliveryContext {
        jobs: Arc::new(jobs.clone()),
        history: Arc::new(history.clone()),
        provider: provider.clone(),
        clock: clock.clone(),
    };

    // All workers see the same due list and fight over it
    let config = PoolConfig {
        claim_batch: 100,
        ..Default::default()
    };
    let mut handles = Vec::new();
    for i in 0..8 {
        let worker = DeliveryWorker::new(format!("worker-{i}"), ctx.clone(), &config, RetryPolicy::default());
        handles.push(tokio::spawn(async move { worker.run_once().await.unwrap() }));
    }
    let mut total = WorkerStats::default();
    for handle in handles {
        total.merge(handle.await.unwrap());
    }

    assert_eq!(total.sent, 40);
    assert_eq!(total.claimed, 40);
    assert_eq!(provider.call_count(), 40);

    let recipients: HashSet<_> = provider.calls().into_iter().map(|c| c.recipient).collect();
    assert_eq!(recipients.len(), 40);

    let entries = history.query(&HistoryQuery::default()).await.unwrap();
    assert_eq!(entries.len(), 40);
    assert!(entries.iter().all(|e| e.outcome == HistoryOutcome::Sent));
    assert!(jobs.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_retries_transient_failures_to_completion() {
    let _ = env_logger::builder().is_test(true).try_init();

    let jobs = InMemoryJobStore::new();
    let history = InMemoryHistoryLedger::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap());
    let provider = Arc::new(ScriptedProvider::delivering().with_script([
        DeliveryOutcome::Transient("503".into()),
        DeliveryOutcome::Transient("503".into()),
        DeliveryOutcome::Permanent("invalid address".into()),
    ]));
    seed(&jobs, &clock, 10).await;

    let ctx = DeliveryContext {
        jobs: Arc::new(jobs.clone()),
        history: Arc::new(history.clone()),
        provider: provider.clone(),
        clock: clock.clone(),
    };
    let config = PoolConfig {
        workers: 3,
        poll_interval_ms: 5,
        ..Default::default()
    };
    let pool = WorkerPool::spawn(ctx, config, RetryPolicy::default());

    for _ in 0..400 {
        if history.len() == 10 {
            break;
        }
        // Jump past any backoff
        clock.advance(TimeDelta::minutes(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    pool.shutdown().await.unwrap();

    let entries = history.query(&HistoryQuery::default()).await.unwrap();
    assert_eq!(entries.len(), 10);
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.outcome == HistoryOutcome::FailedPermanent)
            .count(),
        1
    );
    assert_eq!(provider.call_count(), 12);
    assert!(jobs.is_empty());
}
