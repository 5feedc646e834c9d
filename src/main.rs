//! HerokuGate binary entry point

use herokugate::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration; missing credentials abort startup here
    let config = match config::AppConfig::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("herokugate: {error}");
            std::process::exit(1);
        }
    };

    // 2. Initialize tracing/logging
    let default_filter = format!("herokugate={},tower_http=info", config.logging.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting HerokuGate...");
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        session_backend = ?config.session.backend,
        "Configuration loaded"
    );

    herokugate::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 4. Build Axum router
    let app = herokugate::build_router(state);

    // 5. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Callback URL: {}{}", config.oauth.redirect_base.trim_end_matches('/'), config::CALLBACK_PATH);

    axum::serve(listener, app).await?;

    Ok(())
}
