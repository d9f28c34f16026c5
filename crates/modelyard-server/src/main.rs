//! Modelyard API server binary.

use clap::Parser;
use modelyard_server::{build_control_plane, create_router, AppState, Args, ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let args = Args::parse();
    let config = ServerConfig::from(&args);

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!(
        listen = %config.listen_addr,
        database = %config.database.url,
        storage = ?config.storage,
        s3_endpoint = %config.s3.endpoint,
        "Starting Modelyard server"
    );
    if config.signing_key.is_none() {
        info!("no signing key configured, part-upload URLs will not survive a restart");
    }

    let cp = build_control_plane(&config).await?;
    let state = AppState::new(cp, config.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
