//! Program service: every engine operation over one injected store handle.
//!
//! Each call starts its own deadline from the configured query timeout. The
//! service holds no state between calls and is cheap to clone.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::Result;
use crate::executor::ProgramQueryExecutor;
use crate::filter::FilterSpecification;
use crate::hierarchy::{build_hierarchy, HierarchySource, HierarchyTree};
use crate::ports::{Deadline, RecordStore};
use crate::repository::ProgramRepository;
use crate::statistics::{StatisticsAggregator, StatisticsSummary};
use crate::types::{NewProgram, PaginatedResult, Program, ProgramUpdate};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ProgramService {
    executor: Arc<ProgramQueryExecutor>,
    statistics: Arc<StatisticsAggregator>,
    repository: Arc<ProgramRepository>,
    hierarchy: Arc<HierarchySource>,
    query_timeout: Duration,
}

impl ProgramService {
    pub fn new(store: Arc<dyn RecordStore>, query_timeout: Duration) -> Self {
        Self {
            executor: Arc::new(ProgramQueryExecutor::new(store.clone())),
            statistics: Arc::new(StatisticsAggregator::new(store.clone())),
            repository: Arc::new(ProgramRepository::new(store.clone())),
            hierarchy: Arc::new(HierarchySource::new(store)),
            query_timeout,
        }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.query_timeout)
    }

    pub async fn list(&self, spec: &FilterSpecification) -> Result<PaginatedResult<Program>> {
        self.executor.list(spec, self.deadline()).await
    }

    pub async fn summarize(
        &self,
        filter: Option<&FilterSpecification>,
    ) -> Result<StatisticsSummary> {
        self.statistics.summarize(filter, self.deadline()).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Program> {
        self.repository.get(id, self.deadline()).await
    }

    pub async fn create(&self, new: &NewProgram) -> Result<Program> {
        self.repository.create(new, self.deadline()).await
    }

    pub async fn update(&self, id: Uuid, update: &ProgramUpdate) -> Result<Program> {
        self.repository.update(id, update, self.deadline()).await
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<Program> {
        self.repository.soft_delete(id, self.deadline()).await
    }

    pub async fn hard_delete(&self, id: Uuid) -> Result<()> {
        self.repository.hard_delete(id, self.deadline()).await
    }

    /// Load all four levels and roll them up.
    pub async fn hierarchy(&self) -> Result<HierarchyTree> {
        let input = self.hierarchy.load(self.deadline()).await?;
        Ok(build_hierarchy(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ProgramError;
    use crate::testing::{program_row, ScriptedStore};
    use crate::sql::RowSet;
    use crate::types::ProgramStatus;

    #[tokio::test]
    async fn service_routes_calls_to_one_store() {
        let store = Arc::new(ScriptedStore::new());
        store
            .push_rows(vec![RowSet::from_rows(vec![program_row(
                "Atlas Marine",
                ProgramStatus::Active,
            )])])
            .push_rows(vec![RowSet::affected(1)]);
        let service = ProgramService::new(store.clone(), DEFAULT_QUERY_TIMEOUT);

        let program = service.get(Uuid::new_v4()).await.unwrap();
        assert_eq!(program.name, "Atlas Marine");
        service.hard_delete(program.id).await.unwrap();
        assert_eq!(store.statements().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_timeout_bounds_each_call() {
        let store = Arc::new(ScriptedStore::new().with_latency(Duration::from_secs(2)));
        store.push_rows(vec![RowSet::default()]);
        let service = ProgramService::new(store, Duration::from_millis(500));

        let err = service.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProgramError::Timeout(_)));
        assert!(err.is_retryable());
    }
}
