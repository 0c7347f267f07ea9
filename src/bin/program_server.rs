//! program_server - REST server for program listings, statistics and the
//! reinsurer hierarchy.
//!
//! Configuration comes from flags or env vars (see `ServerConfig`); a `.env`
//! file in the working directory is loaded first.

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use program_core::ProgramService;
use program_desk::api::build_router;
use program_desk::ServerConfig;
use program_postgres::{mask_database_url, DatabaseManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,program_desk=debug,program_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    config.validate()?;

    tracing::info!(
        database = %mask_database_url(&config.database_url),
        pool_size = config.pool_size,
        query_timeout_ms = config.query_timeout_ms,
        "Starting program desk server"
    );

    let manager = DatabaseManager::new(config.database_config())
        .await
        .context("failed to connect to database")?;

    manager
        .test_connection()
        .await
        .context("database connection check failed")?;

    if config.apply_schema {
        manager
            .apply_schema()
            .await
            .context("failed to apply schema")?;
        tracing::info!("Schema applied");
    }
    manager.verify_schema().await?;

    let service = ProgramService::new(manager.record_store(), config.query_timeout());
    let app = build_router(service);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("program_server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    manager.close().await;
    tracing::info!("program_server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
