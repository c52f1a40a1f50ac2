use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uia_webdriver::api::{routes::create_router, state::AppState};
use uia_webdriver::config::Config;
use uia_webdriver::desktop::create_platform;
use uia_webdriver::session::cleanup::spawn_cleanup_task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let addr = config.socket_addr()?;
    let platform = create_platform(config.backend)?;
    tracing::info!("Using {:?} automation backend", config.backend);

    let state = Arc::new(AppState::new(config, platform));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = spawn_cleanup_task(
        state.sessions.clone(),
        state.config.cleanup_interval,
        shutdown_rx,
    );

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("WebDriver server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;

    shutdown_tx.send(true).ok();
    if let Err(e) = cleanup.await {
        tracing::warn!("Session cleanup task ended abnormally: {}", e);
    }

    for session in state.sessions.find_all() {
        if let Some(session) = state.sessions.delete(&session.id) {
            session.dispose().await;
        }
    }

    Ok(())
}
