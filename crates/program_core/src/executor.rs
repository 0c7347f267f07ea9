//! Paginated query executor.
//!
//! One compiled predicate set feeds two statements: the page of joined rows
//! and the total count. Both carry the identical predicate parameters in
//! `$1..=k`; the data statement appends `LIMIT $k+1 OFFSET $k+2`. They are
//! sent together through `execute_snapshot`, so `total` and `rows` describe
//! the same snapshot.

use std::sync::Arc;

use tracing::debug;

use crate::error::{ProgramError, Result};
use crate::filter::{FilterSpecification, PageWindow};
use crate::ports::{with_deadline, Deadline, RecordStore};
use crate::predicate::{compile, CompiledPredicateSet};
use crate::schema::{PROGRAM_GROUP_BY, PROGRAM_ORDER, PROGRAM_SELECT};
use crate::sql::{RowSet, SqlStatement, StatementBuilder};
use crate::types::{PaginatedResult, Program};

/// The statements a single `list` call sends to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ListStatements {
    pub window: PageWindow,
    pub data: SqlStatement,
    pub count: SqlStatement,
}

/// Compile `spec` into its data and count statements without executing them.
pub fn list_statements(spec: &FilterSpecification) -> Result<ListStatements> {
    let window = spec.page_window()?;
    let predicates = compile(spec)?;
    Ok(ListStatements {
        window,
        data: data_statement(&predicates, window),
        count: count_statement(&predicates),
    })
}

fn data_statement(predicates: &CompiledPredicateSet, window: PageWindow) -> SqlStatement {
    let mut b = StatementBuilder::filtered(predicates);
    b.push(PROGRAM_SELECT)
        .push(" WHERE ")
        .push_predicates()
        .push(PROGRAM_GROUP_BY)
        .push(PROGRAM_ORDER)
        .push(" LIMIT ")
        .push_bind(window.limit)
        .push(" OFFSET ")
        .push_bind(window.offset);
    b.build()
}

fn count_statement(predicates: &CompiledPredicateSet) -> SqlStatement {
    let mut b = StatementBuilder::filtered(predicates);
    b.push("SELECT COUNT(*) AS total FROM programs p WHERE ")
        .push_predicates();
    b.build()
}

pub struct ProgramQueryExecutor {
    store: Arc<dyn RecordStore>,
}

impl ProgramQueryExecutor {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// One page of programs matching `spec`, ordered by name then id.
    pub async fn list(
        &self,
        spec: &FilterSpecification,
        deadline: Deadline,
    ) -> Result<PaginatedResult<Program>> {
        let ListStatements {
            window,
            data,
            count,
        } = list_statements(spec)?;

        debug!(
            params = data.params().len(),
            limit = window.limit,
            offset = window.offset,
            "executing program listing"
        );

        let statements = [data, count];
        let sets = with_deadline(
            deadline,
            "list programs",
            self.store.execute_snapshot(&statements, deadline),
        )
        .await?;

        let [data_set, count_set]: [RowSet; 2] = sets.try_into().map_err(|sets: Vec<RowSet>| {
            ProgramError::internal(format!(
                "store returned {} result sets for 2 statements",
                sets.len()
            ))
        })?;

        let rows = data_set
            .rows
            .iter()
            .map(Program::from_row)
            .collect::<Result<Vec<_>>>()?;
        let total = read_total(&count_set)?;

        PaginatedResult::assemble(rows, window, total)
    }
}

pub(crate) fn read_total(set: &RowSet) -> Result<i64> {
    set.first()
        .ok_or_else(|| ProgramError::internal("count query returned no row"))?
        .int("total")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use proptest::prelude::*;
    use regex::Regex;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::filter::RangeFilter;
    use crate::sql::{Row, SqlValue};
    use crate::testing::{count_rows, program_row, ScriptedStore};
    use crate::types::ProgramStatus;

    fn placeholders(text: &str) -> BTreeSet<usize> {
        let re = Regex::new(r"\$(\d+)").unwrap();
        re.captures_iter(text)
            .map(|c| c[1].parse::<usize>().unwrap())
            .collect()
    }

    fn far() -> Deadline {
        Deadline::after(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn list_decodes_rows_and_totals() {
        let store = Arc::new(ScriptedStore::new());
        store.push_rows(vec![
            RowSet::from_rows(vec![
                program_row("Atlas Marine", ProgramStatus::Active),
                program_row("Boreal Cat", ProgramStatus::Pending),
            ]),
            count_rows(42),
        ]);
        let executor = ProgramQueryExecutor::new(store.clone());

        let spec = FilterSpecification {
            limit: Some(2),
            page: Some(3),
            ..Default::default()
        };
        let page = executor.list(&spec, far()).await.unwrap();

        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].name, "Atlas Marine");
        assert_eq!(page.total, 42);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 21);

        let sent = store.statements();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            &sent[0].params()[sent[0].params().len() - 2..],
            &[SqlValue::Int(2), SqlValue::Int(4)]
        );
        assert!(sent[1].text().starts_with("SELECT COUNT(*)"));
    }

    #[test]
    fn empty_filter_renders_true_with_only_paging_params() {
        let statements = list_statements(&FilterSpecification::default()).unwrap();
        assert!(statements.data.text().contains("WHERE TRUE GROUP BY"));
        assert_eq!(
            statements.data.params(),
            &[SqlValue::Int(20), SqlValue::Int(0)]
        );
        assert!(statements.count.text().ends_with("WHERE TRUE"));
        assert!(statements.count.params().is_empty());
    }

    #[test]
    fn data_statement_groups_and_orders_stably() {
        let statements = list_statements(&FilterSpecification {
            search: Some("marine".into()),
            ..Default::default()
        })
        .unwrap();
        let text = statements.data.text();
        assert!(text.contains("LEFT JOIN program_reinsurers pr"));
        assert!(text.contains(
            "GROUP BY p.id, c.name ORDER BY p.name ASC, p.id ASC LIMIT $2 OFFSET $3"
        ));
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_page_not_an_error() {
        let store = Arc::new(ScriptedStore::new());
        store.push_rows(vec![RowSet::default(), count_rows(0)]);
        let executor = ProgramQueryExecutor::new(store);

        let page = executor
            .list(&FilterSpecification::default(), far())
            .await
            .unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
    }

    #[tokio::test]
    async fn invalid_filter_never_reaches_the_store() {
        let store = Arc::new(ScriptedStore::new());
        let executor = ProgramQueryExecutor::new(store.clone());
        let spec = FilterSpecification {
            offset: Some(0),
            page: Some(1),
            ..Default::default()
        };
        let err = executor.list(&spec, far()).await.unwrap_err();
        assert!(matches!(err, ProgramError::InvalidFilterValue(_)));
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn store_errors_pass_through() {
        let store = Arc::new(ScriptedStore::new());
        store.push_error(ProgramError::StoreUnavailable("connection refused".into()));
        let executor = ProgramQueryExecutor::new(store);
        let err = executor
            .list(&FilterSpecification::default(), far())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgramError::StoreUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let store = Arc::new(ScriptedStore::new().with_latency(Duration::from_secs(5)));
        store.push_rows(vec![RowSet::default(), count_rows(0)]);
        let executor = ProgramQueryExecutor::new(store);

        let err = executor
            .list(
                &FilterSpecification::default(),
                Deadline::after(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProgramError::Timeout(_)));
    }

    #[tokio::test]
    async fn overfull_page_is_internal() {
        let store = Arc::new(ScriptedStore::new());
        store.push_rows(vec![
            RowSet::from_rows(vec![
                program_row("A", ProgramStatus::Active),
                program_row("B", ProgramStatus::Active),
            ]),
            count_rows(2),
        ]);
        let executor = ProgramQueryExecutor::new(store);
        let spec = FilterSpecification {
            limit: Some(1),
            ..Default::default()
        };
        let err = executor.list(&spec, far()).await.unwrap_err();
        assert!(matches!(err, ProgramError::Internal(_)));
    }

    /// Serves `LIMIT/OFFSET` slices of `total` synthetic rows, reading the
    /// window from the trailing parameters of the data statement.
    struct PagingStore {
        total: i64,
    }

    #[async_trait]
    impl RecordStore for PagingStore {
        async fn execute(&self, _statement: &SqlStatement, _deadline: Deadline) -> Result<RowSet> {
            Err(ProgramError::internal("paging store only serves snapshots"))
        }

        async fn execute_snapshot(
            &self,
            statements: &[SqlStatement],
            _deadline: Deadline,
        ) -> Result<Vec<RowSet>> {
            let params = statements[0].params();
            let (limit, offset) = match &params[params.len() - 2..] {
                [SqlValue::Int(limit), SqlValue::Int(offset)] => (*limit, *offset),
                other => return Err(ProgramError::internal(format!("bad window {other:?}"))),
            };
            let end = (offset + limit).min(self.total);
            let rows = (offset..end)
                .map(|i| program_row(&format!("P{i:05}"), ProgramStatus::Active))
                .collect();
            Ok(vec![RowSet::from_rows(rows), count_rows(self.total)])
        }
    }

    fn arb_spec() -> impl Strategy<Value = FilterSpecification> {
        // The `zq` prefix never occurs in generated SQL, so any hit is a leak.
        let text = prop::option::of("zq[a-zA-Z %_']{0,10}");
        let bound = prop::option::of((0i64..100_000).prop_map(Decimal::from));
        let statuses = prop::option::of(prop::sample::subsequence(
            ProgramStatus::ALL.to_vec(),
            1..=4,
        ));
        (
            text.clone(),
            prop::option::of(any::<u128>().prop_map(Uuid::from_u128)),
            statuses,
            (bound.clone(), bound.clone()),
            (bound.clone(), bound),
            text,
            prop::option::of(-5i64..200),
            prop::option::of(0i64..1_000),
        )
            .prop_map(
                |(search, category_id, statuses, loss_ratio, premium, underwriter, limit, offset)| {
                    FilterSpecification {
                        search,
                        category_id,
                        statuses,
                        loss_ratio: RangeFilter {
                            min: loss_ratio.0,
                            max: loss_ratio.1,
                        },
                        gross_premium: RangeFilter {
                            min: premium.0,
                            max: premium.1,
                        },
                        underwriter,
                        limit,
                        offset,
                        page: None,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn placeholders_match_parameters(spec in arb_spec()) {
            let statements = list_statements(&spec).unwrap();

            let data_params = statements.data.params().len();
            let expected: BTreeSet<usize> = (1..=data_params).collect();
            prop_assert_eq!(placeholders(statements.data.text()), expected);

            let count_params = statements.count.params().len();
            let expected: BTreeSet<usize> = (1..=count_params).collect();
            prop_assert_eq!(placeholders(statements.count.text()), expected);

            prop_assert_eq!(data_params, count_params + 2);
            prop_assert_eq!(
                &statements.data.params()[..count_params],
                statements.count.params()
            );
        }

        #[test]
        fn user_text_never_enters_sql(spec in arb_spec()) {
            let statements = list_statements(&spec).unwrap();
            for needle in [&spec.search, &spec.underwriter].into_iter().flatten() {
                prop_assert!(!statements.data.text().contains(needle.as_str()));
                prop_assert!(!statements.count.text().contains(needle.as_str()));
            }
        }

        #[test]
        fn pages_follow_window_arithmetic(
            total in 0i64..500,
            limit in prop::option::of(-3i64..150),
            offset in 0i64..600,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let executor = ProgramQueryExecutor::new(Arc::new(PagingStore { total }));
            let spec = FilterSpecification { limit, offset: Some(offset), ..Default::default() };
            let page = rt.block_on(executor.list(&spec, far())).unwrap();

            let effective = limit.unwrap_or(20).clamp(1, 100);
            prop_assert_eq!(page.limit, effective);
            prop_assert_eq!(page.total, total);
            prop_assert_eq!(page.page, offset / effective + 1);
            prop_assert_eq!(page.total_pages, (total + effective - 1) / effective);
            prop_assert!(page.rows.len() as i64 <= effective);
            let expected_rows = (total - offset).clamp(0, effective);
            prop_assert_eq!(page.rows.len() as i64, expected_rows);
        }
    }

    #[test]
    fn read_total_requires_a_row() {
        assert!(read_total(&RowSet::default()).is_err());
        let set = RowSet::from_rows(vec![Row::new().with("total", 7i64)]);
        assert_eq!(read_total(&set).unwrap(), 7);
    }
}
