//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - The call session state machine and active call registry
//! - Conference bridge naming and join policy
//! - Agent presence tracking
//! - The Call Log store interface

pub mod bridge;
pub mod call_history;
pub mod call_registry;
pub mod call_session;
pub mod presence;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
