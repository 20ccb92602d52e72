//! API Router configuration

use super::call_handler::{
    accept_call, agent_twiml, conference_status_webhook, customer_twiml, end_call,
    fallback_twiml, get_active_calls, health_check, initiate_call, join_conference,
    recording_status_webhook, reject_call, status_webhook, voice_webhook,
};
use super::metrics_handler::metrics_handler;
use super::ws_handler::ws_handler;
use super::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    // Health check route
    let health_routes = Router::new().route("/health", get(health_check));

    // Agent control API
    let call_routes = Router::new()
        .route("/api/calls", get(get_active_calls))
        .route("/api/calls/initiate", post(initiate_call))
        .route("/api/calls/accept", post(accept_call))
        .route("/api/calls/reject", post(reject_call))
        .route("/api/calls/end", post(end_call));

    // Provider webhooks and signaling-markup endpoints
    let webhook_routes = Router::new()
        .route("/voice", post(voice_webhook))
        .route("/api/calls/status", post(status_webhook))
        .route("/conference-status", post(conference_status_webhook))
        .route("/api/recording/status", post(recording_status_webhook))
        .route("/api/twiml/customer", post(customer_twiml))
        .route("/api/twiml/agent", post(agent_twiml))
        .route("/api/twiml/fallback", post(fallback_twiml))
        .route("/join-conference", post(join_conference));

    // Agent real-time channel
    let ws_routes = Router::new().route("/ws", get(ws_handler));

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    Router::new()
        .merge(health_routes)
        .merge(call_routes)
        .merge(webhook_routes)
        .merge(ws_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
