//! PostgreSQL adapter for `program_core`.
//!
//! `PgRecordStore` implements the `RecordStore` port over a `sqlx::PgPool`;
//! `DatabaseManager` owns the pool and its lifecycle. Driver errors are
//! translated to `ProgramError` here, at the store boundary.

pub mod pool;
pub mod store;

pub use pool::{mask_database_url, DatabaseConfig, DatabaseManager, REQUIRED_TABLES, SCHEMA_SQL};
pub use store::{classify_sqlstate, translate, PgRecordStore};
