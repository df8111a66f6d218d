mod handlers;
mod routes;

use anyhow::Context;
use codesphere_engine::{DockerSandbox, Engine, EngineConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

const ADDR_ENV: &str = "CODESPHERE_ADDR";
const DEFAULT_ADDR: &str = "0.0.0.0:8000";

pub struct AppState {
    pub engine: Engine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("CodeSphere API booting...");

    let config = EngineConfig::load_default().context("Failed to load engine configuration")?;
    info!(
        image = %config.image,
        workspace_root = %config.workspace_root.display(),
        max_concurrent_jobs = config.max_concurrent_jobs,
        "Engine configuration loaded"
    );

    let sandbox = DockerSandbox::connect(config.clone()).context("Failed to connect to Docker")?;

    // A missing image is pulled again on first use, so boot anyway
    if let Err(e) = sandbox.prepare().await {
        warn!(error = %e, "Sandbox not ready; jobs will fail until Docker and the images are available");
    }

    let state = Arc::new(AppState {
        engine: Engine::new(Arc::new(sandbox), &config),
    });

    let app = routes::routes().with_state(state);

    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining in-flight jobs");
}
