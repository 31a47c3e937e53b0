mod grading;
mod http;
mod worker;

use cscore_engine::ExecutionOrchestrator;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Grading worker booting...");

    let orchestrator = Arc::new(ExecutionOrchestrator::from_env().map_err(|e| {
        error!("Failed to build execution orchestrator: {:#}", e);
        error!("Make sure config/languages.json exists or LANGUAGES_CONFIG is set");
        e
    })?);

    let config = orchestrator.config();
    info!(
        strategy = %config.strategy,
        remote_enabled = config.remote_enabled,
        "Execution strategy configured"
    );

    // Connect to Redis
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = redis::Client::open(redis_url.as_str())?;
    let mut redis_conn = redis::aio::ConnectionManager::new(client).await?;

    info!("Connected to Redis: {}", redis_url);

    let addr = std::env::var("WORKER_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    let app = http::router(orchestrator.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "HTTP server stopped");
        }
    });

    // Setup graceful shutdown; the loop finishes the job in flight before stopping
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received shutdown signal, finishing current job...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "Failed to install CTRL+C signal handler"),
        }
    });

    worker::run(&mut redis_conn, &orchestrator, shutdown_rx).await;

    info!("Worker shutdown complete");
    Ok(())
}
