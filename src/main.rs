//! Pulse Analytics server binary

use std::sync::Arc;

use pulse_analytics::api::http::create_router;
use pulse_analytics::api::state::AppState;
use pulse_analytics::cache::CacheStore;
use pulse_analytics::config::AppConfig;
use pulse_analytics::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();

    let state = Arc::new(AppState::new(config)?);
    state.logger.info(&format!(
        "{} v{} starting on {}",
        pulse_analytics::NAME,
        pulse_analytics::VERSION,
        bind_addr
    ));

    CacheStore::spawn_sweeper(state.cache.clone());
    RateLimiter::spawn_sweeper(state.limiter.clone());

    let app = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.logger.info("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("[Server] Failed to install Ctrl+C handler: {}", e);
        // Without a signal handler there is nothing to wait for
        std::future::pending::<()>().await;
    }
    eprintln!("[Server] Shutdown signal received");
}
