use std::net::SocketAddr;
use tracing::{error, info};

mod api;
mod config;
mod models;
mod services;
mod validation;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        clickhouse = %format!("{}:{}/{}", config.clickhouse.host, config.clickhouse.port, config.clickhouse.database),
        table = %config.clickhouse.table,
        use_real_database = config.query.use_real_database,
        "Starting analytics backend"
    );

    let addr: SocketAddr = config.server_address().parse()?;
    let app = api::routes::create_router(config).map_err(|e| {
        error!("Failed to build application state: {}", e);
        e
    })?;

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
