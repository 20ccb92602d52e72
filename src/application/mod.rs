//! Application layer - Use-case orchestration
//!
//! Coordinates the domain registries, the telephony provider and the
//! real-time fanout behind a single owning service.

pub mod events;
pub mod orchestrator;

pub use events::{AgentEvent, EventBroadcaster, EventEnvelope};
pub use orchestrator::{CallOrchestrator, OrchestratorConfig};
