//! DialDesk - a call-center dialer backend
//!
//! Orchestrates a telephony provider's call-control primitives (call legs,
//! conference bridges, status webhooks) together with a real-time WebSocket
//! channel to agent clients. The call-session orchestrator owns the
//! authoritative lifecycle of every in-flight call.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::{DomainError, Result};
