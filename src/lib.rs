//! Program Desk - REST surface and process wiring for the program engine
//!
//! The engine itself lives in `program_core` (no database driver) and the
//! Postgres store in `program_postgres`. This crate adds:
//!
//! - `config`: command-line / environment configuration for the server
//! - `api` (feature `server`): the axum router, response envelope and
//!   error-to-HTTP mapping
//!
//! The `program_server` binary owns the pool, builds a `ProgramService` over
//! it and serves the router until Ctrl+C.

pub mod config;

#[cfg(feature = "server")]
pub mod api;

pub use config::{ConfigError, ServerConfig};
