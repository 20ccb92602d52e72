use dialdesk::application::{CallOrchestrator, EventBroadcaster, OrchestratorConfig};
use dialdesk::config::Config;
use dialdesk::domain::call_history::{CallHistoryRepository, InMemoryCallHistoryRepository};
use dialdesk::infrastructure::telephony::HttpCallControlClient;
use dialdesk::interface::api::{
    build_router, init_metrics, update_active_calls, update_connected_agents, AppState,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting DialDesk");

    let config = Config::load()?;
    info!(
        "Configuration loaded, listening on {}:{}",
        config.server.host, config.server.port
    );

    let prometheus_handle = init_metrics()?;

    let provider = Arc::new(HttpCallControlClient::new(
        config.telephony.base_url.clone(),
        config.telephony.account_sid.clone(),
        config.telephony.auth_token.clone(),
    ));

    let broadcaster = Arc::new(EventBroadcaster::default());
    let history: Arc<dyn CallHistoryRepository> = Arc::new(InMemoryCallHistoryRepository::new());

    let orchestrator = Arc::new(
        CallOrchestrator::new(
            provider,
            broadcaster.clone(),
            OrchestratorConfig {
                public_base_url: config.public_base_url(),
                hold_music_url: config.telephony.hold_music_url.clone(),
                caller_id: config.telephony.caller_id.clone(),
            },
        )
        .with_history(history),
    );

    // Gauge updater
    {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            loop {
                update_active_calls(orchestrator.active_call_count().await);
                update_connected_agents(orchestrator.connected_agents().await.len());
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        });
    }

    let state = AppState {
        orchestrator,
        broadcaster,
    };
    let app = build_router(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;
    info!("DialDesk API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}
