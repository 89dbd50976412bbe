//! Scripted provider for tests and dry runs
//!
//! Plays back a queue of outcomes, then falls back to a default. Every call
//! is recorded, including ones that fail.

use async_trait::async_trait;
use herald_ports::{DeliveryOutcome, DeliveryProvider, RenderedNotification};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// One recorded call to [`ScriptedProvider::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub notification: RenderedNotification,
    pub outcome: DeliveryOutcome,
}

pub struct ScriptedProvider {
    script: Mutex<VecDeque<DeliveryOutcome>>,
    fallback: DeliveryOutcome,
    delay: Option<Duration>,
    calls: Mutex<Vec<SentMessage>>,
}

impl ScriptedProvider {
    /// Provider that always returns `fallback`
    pub fn always(fallback: DeliveryOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider that delivers everything
    pub fn delivering() -> Self {
        Self::always(DeliveryOutcome::Delivered)
    }

    /// Play `outcomes` in order, then `fallback`
    pub fn with_script(mut self, outcomes: impl IntoIterator<Item = DeliveryOutcome>) -> Self {
        self.script = Mutex::new(outcomes.into_iter().collect());
        self
    }

    /// Sleep before answering, to exercise send timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<SentMessage> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls that ended in `Delivered`
    pub fn delivered(&self) -> Vec<SentMessage> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.outcome.is_delivered())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DeliveryProvider for ScriptedProvider {
    async fn send(&self, recipient: &str, notification: &RenderedNotification) -> DeliveryOutcome {
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.calls.lock().push(SentMessage {
            recipient: recipient.to_string(),
            notification: notification.clone(),
            outcome: outcome.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn name(&self) -> &str {
        "ScriptedProvider"
    }
}
