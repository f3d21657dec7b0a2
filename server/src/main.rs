use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use leadflow::{
    build_router, AppState, EnrichmentService, ExpirySweeper, JobStore, ServerConfig,
    WebhookRunner,
};

/// `json` switches log output to one JSON object per line.
const LOG_FORMAT_ENV_VAR: &str = "LEADFLOW_LOG_FORMAT";

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                log::warn!("Failed to register signal handlers, falling back to Ctrl-C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    // Route `log` records from the library into tracing.
    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json()),
        )?;
    } else {
        tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer()),
        )?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    info!("Starting leadflow-server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;
    if config.webhook_url.is_none() {
        log::warn!("N8N_WEBHOOK_URL is not set; every submission will fail");
    }

    let free_tier_keys = config.free_tier.resolve().map_err(leadflow::LeadflowError::from)?;
    let runner = WebhookRunner::new(
        config.webhook_url.clone(),
        config.connect_timeout(),
        config.trigger_timeout(),
    )
    .map_err(leadflow::LeadflowError::from)?;

    let store = Arc::new(JobStore::new());
    let service = Arc::new(EnrichmentService::new(
        Arc::clone(&store),
        Arc::new(runner),
        free_tier_keys,
    ));
    let app = build_router(AppState::new(service));

    let sweeper = ExpirySweeper::new(Arc::clone(&store), config.job_ttl(), config.sweep_interval());
    let sweeper_handle = sweeper.start();

    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(leadflow::LeadflowError::Server)?;
    info!("leadflow-server listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(leadflow::LeadflowError::Server)?;

    info!("Shutting down");
    sweeper.stop();
    if let Err(e) = sweeper_handle.await {
        log::warn!("Expiry sweeper task failed: {}", e);
    }
    Ok(())
}
