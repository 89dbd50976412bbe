//! Delivery provider adapters
//!
//! Adapters implement [`DeliveryProvider`](herald_ports::DeliveryProvider)
//! on top of a concrete transport.

pub mod log_provider;
pub mod scripted;

pub use log_provider::LogProvider;
pub use scripted::{ScriptedProvider, SentMessage};
