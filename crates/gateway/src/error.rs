//! Error types for the gateway crate

use thiserror::Error;

/// Gateway-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    #[error("Invalid recipient address: {0:?}")]
    InvalidRecipient(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Minimal address sanity check applied before handing mail to a provider
pub fn validate_recipient(recipient: &str) -> Result<()> {
    let trimmed = recipient.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => {
            Ok(())
        }
        _ => Err(GatewayError::InvalidRecipient(recipient.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_validation() {
        assert!(validate_recipient("user@example.com").is_ok());
        assert!(validate_recipient("user@localhost").is_err());
        assert!(validate_recipient("@example.com").is_err());
        assert!(validate_recipient("no-at-sign").is_err());
    }
}
