//! API interface implementations

pub mod call_handler;
pub mod dto;
pub mod metrics_handler;
pub mod router;
pub mod ws_handler;

use crate::application::{CallOrchestrator, EventBroadcaster};
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CallOrchestrator>,
    pub broadcaster: Arc<EventBroadcaster>,
}

pub use metrics_handler::{init_metrics, update_active_calls, update_connected_agents};
pub use router::build_router;
