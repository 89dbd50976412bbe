//! Provider that writes notifications to the log instead of sending them

use async_trait::async_trait;
use herald_ports::{DeliveryOutcome, DeliveryProvider, RenderedNotification};
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::validate_recipient;

/// Logs every notification at `info`. Used by the `herald` binary when no
/// real email provider is configured.
#[derive(Default)]
pub struct LogProvider {
    sent: AtomicU64,
}

impl LogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeliveryProvider for LogProvider {
    async fn send(&self, recipient: &str, notification: &RenderedNotification) -> DeliveryOutcome {
        if let Err(err) = validate_recipient(recipient) {
            return DeliveryOutcome::Permanent(err.to_string());
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(
            "[mail] to={} subject={:?}\n{}",
            recipient, notification.subject, notification.body
        );
        DeliveryOutcome::Delivered
    }

    fn name(&self) -> &str {
        "LogProvider"
    }
}
