//! Worker pool lifecycle

use herald_ports::{Clock, DeliveryProvider, HistoryLedger, JobStore};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{PoolConfig, RetryPolicy};
use crate::error::{DeliveryError, Result};
use crate::sweeper::Sweeper;
use crate::worker::DeliveryWorker;

/// Ports shared by every worker and the sweeper
#[derive(Clone)]
pub struct DeliveryContext {
    pub jobs: Arc<dyn JobStore>,
    pub history: Arc<dyn HistoryLedger>,
    pub provider: Arc<dyn DeliveryProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Running workers plus the sweeper, stopped together via a watch channel
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.workers` workers and one sweeper on the current runtime
    pub fn spawn(ctx: DeliveryContext, config: PoolConfig, policy: RetryPolicy) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(config.workers + 1);

        for i in 0..config.workers {
            let worker = DeliveryWorker::new(format!("worker-{}", i), ctx.clone(), &config, policy);
            handles.push(tokio::spawn(worker.run(rx.clone())));
        }

        let sweeper = Sweeper::new(ctx, config.stuck_timeout());
        handles.push(tokio::spawn(sweeper.run(config.sweep_interval(), rx)));

        info!("[pool] started {} workers", config.workers);
        Self { shutdown, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len().saturating_sub(1)
    }

    /// Signal every task to stop and wait for in-progress sends to finish
    pub async fn shutdown(self) -> Result<()> {
        info!("[pool] shutting down");
        // Receivers may already be gone if every task exited
        let _ = self.shutdown.send(true);

        let mut failure = None;
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("[pool] task ended abnormally: {}", e);
                failure = Some(DeliveryError::Task(e.to_string()));
            }
        }
        info!("[pool] stopped");
        failure.map_or(Ok(()), Err)
    }
}
