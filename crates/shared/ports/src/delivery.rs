use async_trait::async_trait;

/// Human-readable notification, ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub subject: String,
    pub body: String,
}

/// Tri-state result of a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Network, timeout, provider 5xx: worth retrying
    Transient(String),
    /// Invalid recipient, explicit rejection: never retried
    Permanent(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Port for the outbound delivery provider (SMTP relay, email API, ...)
///
/// The engine only relies on the tri-state result; transport details stay
/// inside the implementation.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    async fn send(&self, recipient: &str, notification: &RenderedNotification) -> DeliveryOutcome;

    /// Wait until the provider has capacity for one send. The next `send`
    /// uses the reserved capacity instead of waiting again.
    async fn reserve(&self) {}

    /// Provider name for logging
    fn name(&self) -> &str {
        "DeliveryProvider"
    }
}
