//! Server configuration: command-line flags with environment fallbacks.
//! A `.env` file is loaded by the binary before parsing.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use program_postgres::DatabaseConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database pool size must be at least 1")]
    EmptyPool,

    #[error("query timeout must be greater than zero")]
    ZeroQueryTimeout,
}

/// Program desk REST server
#[derive(Parser, Debug, Clone)]
#[command(name = "program_server")]
#[command(about = "Serve filtered program listings, statistics and hierarchy roll-ups")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "PROGRAM_DESK_BIND_ADDR", default_value = "0.0.0.0:4200")]
    pub bind_addr: SocketAddr,

    /// Postgres connection string
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgresql://localhost:5432/program_desk",
        hide_env_values = true
    )]
    pub database_url: String,

    /// Maximum pooled connections
    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 10)]
    pub pool_size: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "PROGRAM_DESK_ACQUIRE_TIMEOUT_SECS", default_value_t = 30)]
    pub acquire_timeout_secs: u64,

    /// Per-request query deadline in milliseconds
    #[arg(long, env = "PROGRAM_DESK_QUERY_TIMEOUT_MS", default_value_t = 10_000)]
    pub query_timeout_ms: u64,

    /// Create missing tables from sql/schema.sql before serving
    #[arg(long)]
    pub apply_schema: bool,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::ZeroQueryTimeout);
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Pool settings; idle and lifetime limits keep the library defaults.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            database_url: self.database_url.clone(),
            max_connections: self.pool_size,
            connection_timeout: Duration::from_secs(self.acquire_timeout_secs),
            ..DatabaseConfig::default()
        }
    }
}
