//! Program Core - filtered queries, statistics and roll-ups over reinsurance programs
//!
//! Pure engine crate: no database driver. Every component talks to storage
//! through the [`RecordStore`] port and is handed an `Arc<dyn RecordStore>`
//! at construction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  FilterParams (query string) ──► FilterSpecification         │
//! └──────────────────────────────────────────────────────────────┘
//!                               │ compile()
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  CompiledPredicateSet  ($1..=k, one parameter per predicate) │
//! └──────────────────────────────────────────────────────────────┘
//!                               │ StatementBuilder
//!                               ▼
//! ┌──────────────┬──────────────────────┬───────────────────────┐
//! │ Executor     │ StatisticsAggregator │ Repository            │
//! │ (data+count) │ (one grouped query)  │ (get/create/update/…) │
//! └──────────────┴──────────────────────┴───────────────────────┘
//!                               │ RecordStore (port)
//!                               ▼
//!                 program_postgres::PgRecordStore
//! ```
//!
//! The hierarchy roll-up (`hierarchy`) loads four entity levels through the
//! same port and aggregates them in memory.
//!
//! # Usage
//!
//! ```ignore
//! use program_core::{FilterSpecification, ProgramService, ProgramStatus};
//!
//! let service = ProgramService::new(store, Duration::from_secs(10));
//! let spec = FilterSpecification {
//!     statuses: Some(vec![ProgramStatus::Active]),
//!     limit: Some(50),
//!     ..Default::default()
//! };
//! let page = service.list(&spec).await?;
//! ```

pub mod error;
pub mod executor;
pub mod filter;
pub mod hierarchy;
pub mod ports;
pub mod predicate;
pub mod repository;
pub mod schema;
pub mod service;
pub mod sql;
pub mod statistics;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export main types
pub use error::{ErrorKind, ProgramError, Result};
pub use executor::ProgramQueryExecutor;
pub use filter::{FilterParams, FilterSpecification, PageWindow, RangeFilter};
pub use hierarchy::{build_hierarchy, HierarchyInput, HierarchyTree, Metrics};
pub use ports::{Deadline, RecordStore};
pub use predicate::{compile, CompiledPredicateSet};
pub use repository::ProgramRepository;
pub use service::{ProgramService, DEFAULT_QUERY_TIMEOUT};
pub use sql::{Row, RowSet, SqlStatement, SqlValue, StatementBuilder, StatementKind};
pub use statistics::{StatisticsAggregator, StatisticsSummary};
pub use types::{NewProgram, PaginatedResult, Program, ProgramStatus, ProgramUpdate};
