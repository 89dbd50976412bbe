//! Herald Gateway
//!
//! Outbound side of the Herald trade alert engine. Provides:
//! - Rendering of notification jobs into email subject and body
//! - Token-bucket rate limiting in front of any delivery provider
//! - Provider adapters (logging provider for local runs, scripted provider
//!   for tests)
//!
//! ## Architecture
//!
//! ```text
//!  Delivery worker
//!         │ RenderedNotification
//!    ┌────▼──────────────┐
//!    │ RateLimitedProvider│  token bucket, waits on denial
//!    └────┬──────────────┘
//!         │
//!    ┌────▼────┐
//!    │Provider │  LogProvider, ScriptedProvider, real email API
//!    └─────────┘
//! ```

pub mod adapters;
pub mod error;
pub mod messages;
pub mod rate_limit;

// Re-export commonly used types
pub use adapters::{LogProvider, ScriptedProvider, SentMessage};
pub use error::GatewayError;
pub use messages::{format_amount, render};
pub use rate_limit::{RateLimitConfig, RateLimitedProvider, TokenBucket};
