//! Program desk against a real Postgres.
//!
//! Each test creates its own schema, applies `sql/schema.sql` into it and
//! drops it afterwards, so tests can run in parallel against one database.
//!
//! Run with:
//! ```sh
//! TEST_DATABASE_URL="postgresql:///program_desk_test" \
//!   cargo test -p program_postgres --test pg_integration -- --ignored --nocapture
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool, Row as _};
use uuid::Uuid;

use program_core::{
    FilterSpecification, NewProgram, ProgramError, ProgramService, ProgramStatus, ProgramUpdate,
    RangeFilter, RecordStore, StatementBuilder, StatementKind,
};
use program_core::ports::Deadline;
use program_postgres::DatabaseManager;

// ── Test Infrastructure ──────────────────────────────────────────────────

struct TestDb {
    admin: PgPool,
    schema: String,
    manager: DatabaseManager,
}

impl TestDb {
    async fn new() -> Result<Self> {
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "postgresql:///program_desk_test".into());
        let admin = PgPool::connect(&url).await?;
        let schema = format!("pd_test_{}", &Uuid::new_v4().simple().to_string()[..12]);
        admin
            .execute(format!("CREATE SCHEMA {schema}").as_str())
            .await?;

        let hook_schema = schema.clone();
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let sql = format!("SET search_path TO {hook_schema}");
                Box::pin(async move {
                    conn.execute(sql.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await?;

        let manager = DatabaseManager::from_pool(pool);
        manager.apply_schema().await?;
        manager.verify_schema().await?;
        Ok(Self {
            admin,
            schema,
            manager,
        })
    }

    fn service(&self) -> ProgramService {
        ProgramService::new(self.manager.record_store(), Duration::from_secs(10))
    }

    fn store(&self) -> Arc<dyn RecordStore> {
        self.manager.record_store()
    }

    async fn category(&self, name: &str) -> Result<Uuid> {
        let row = sqlx::query("INSERT INTO program_categories (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(self.manager.pool())
            .await?;
        Ok(row.try_get("id")?)
    }

    async fn reinsurer(&self, name: &str) -> Result<Uuid> {
        let row = sqlx::query("INSERT INTO reinsurers (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(self.manager.pool())
            .await?;
        Ok(row.try_get("id")?)
    }

    async fn intermediary(&self, reinsurer_id: Uuid, name: &str) -> Result<Uuid> {
        let row = sqlx::query(
            "INSERT INTO intermediaries (reinsurer_id, name) VALUES ($1, $2) RETURNING id",
        )
        .bind(reinsurer_id)
        .bind(name)
        .fetch_one(self.manager.pool())
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn link_reinsurer(&self, program_id: Uuid, reinsurer_id: Uuid) -> Result<()> {
        sqlx::query("INSERT INTO program_reinsurers (program_id, reinsurer_id) VALUES ($1, $2)")
            .bind(program_id)
            .bind(reinsurer_id)
            .execute(self.manager.pool())
            .await?;
        Ok(())
    }

    async fn transaction(&self, program_id: Uuid, premium: i64, claims: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO program_transactions (program_id, premium, claims) VALUES ($1, $2, $3)",
        )
        .bind(program_id)
        .bind(Decimal::from(premium))
        .bind(Decimal::from(claims))
        .execute(self.manager.pool())
        .await?;
        Ok(())
    }

    async fn program(
        &self,
        name: &str,
        category_id: Uuid,
        loss_ratio: i64,
        status: ProgramStatus,
    ) -> Result<Uuid> {
        let mut new = NewProgram::new(name, category_id);
        new.loss_ratio = Some(Decimal::from(loss_ratio));
        new.gross_premium = Some(Decimal::from(loss_ratio * 1_000));
        new.status = Some(status);
        Ok(self.service().create(&new).await?.id)
    }

    async fn cleanup(self) {
        self.manager.close().await;
        let _ = self
            .admin
            .execute(format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema).as_str())
            .await;
        self.admin.close().await;
    }
}

// ── Filtering and pagination ────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn empty_filter_returns_every_program() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Property").await?;
    for (i, name) in ["Atlas", "Boreal", "Cirrus"].iter().enumerate() {
        db.program(name, cat, 10 * (i as i64 + 1), ProgramStatus::Active)
            .await?;
    }

    let page = db.service().list(&FilterSpecification::default()).await?;
    assert_eq!(page.total, 3);
    assert_eq!(
        page.rows.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["Atlas", "Boreal", "Cirrus"]
    );
    assert_eq!(page.rows[0].category_name.as_deref(), Some("Property"));

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn inverted_range_matches_nothing_without_error() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Casualty").await?;
    db.program("Delta", cat, 7, ProgramStatus::Active).await?;

    let spec = FilterSpecification {
        loss_ratio: RangeFilter::between(Decimal::from(10), Decimal::from(5)),
        ..Default::default()
    };
    let page = db.service().list(&spec).await?;
    assert!(page.rows.is_empty());
    assert_eq!(page.total, 0);

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn filters_combine_and_match_case_insensitively() -> Result<()> {
    let db = TestDb::new().await?;
    let marine = db.category("Marine").await?;
    let aviation = db.category("Aviation").await?;
    db.program("North Sea Marine", marine, 40, ProgramStatus::Active)
        .await?;
    db.program("Baltic Marine", marine, 90, ProgramStatus::Pending)
        .await?;
    db.program("Marine Hull", aviation, 50, ProgramStatus::Active)
        .await?;

    let spec = FilterSpecification {
        search: Some("MARINE".into()),
        category_id: Some(marine),
        statuses: Some(vec![ProgramStatus::Active, ProgramStatus::Pending]),
        loss_ratio: RangeFilter::at_most(Decimal::from(60)),
        ..Default::default()
    };
    let page = db.service().list(&spec).await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].name, "North Sea Marine");

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn pages_and_totals_agree() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Specialty").await?;
    for i in 0..25 {
        db.program(&format!("Program {i:02}"), cat, i, ProgramStatus::Active)
            .await?;
    }

    let spec = FilterSpecification {
        limit: Some(10),
        offset: Some(20),
        ..Default::default()
    };
    let page = db.service().list(&spec).await?;
    assert_eq!(page.rows.len(), 5);
    assert_eq!(page.total, 25);
    assert_eq!(page.page, 3);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.rows[0].name, "Program 20");

    let past_end = FilterSpecification {
        limit: Some(10),
        offset: Some(100),
        ..Default::default()
    };
    let page = db.service().list(&past_end).await?;
    assert!(page.rows.is_empty());
    assert_eq!(page.total, 25);

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn reinsurer_join_does_not_duplicate_rows() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Property").await?;
    let shared = db.program("Shared Cat", cat, 20, ProgramStatus::Active).await?;
    db.program("Solo Cat", cat, 30, ProgramStatus::Active).await?;
    for name in ["Re A", "Re B", "Re C"] {
        let re = db.reinsurer(name).await?;
        db.link_reinsurer(shared, re).await?;
    }

    let page = db.service().list(&FilterSpecification::default()).await?;
    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 2);
    let shared_row = page.rows.iter().find(|p| p.id == shared).unwrap();
    assert_eq!(shared_row.reinsurer_count, 3);

    db.cleanup().await;
    Ok(())
}

// ── Statistics ──────────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn status_groups_sum_to_total() -> Result<()> {
    let db = TestDb::new().await?;
    let property = db.category("Property").await?;
    let marine = db.category("Marine").await?;
    db.program("A", property, 10, ProgramStatus::Active).await?;
    db.program("B", property, 20, ProgramStatus::Active).await?;
    db.program("C", marine, 30, ProgramStatus::Pending).await?;
    db.program("D", marine, 45, ProgramStatus::Inactive).await?;

    let summary = db.service().summarize(None).await?;
    assert_eq!(summary.total, 4);
    assert_eq!(summary.by_status.values().sum::<i64>(), summary.total);
    assert_eq!(summary.by_status[&ProgramStatus::Active], 2);
    assert!(!summary.by_status.contains_key(&ProgramStatus::Cancelled));
    assert_eq!(summary.by_category["Marine"], 2);
    assert_eq!(summary.avg_loss_ratio, Decimal::new(2625, 2));
    assert_eq!(summary.total_gross_premium, Decimal::from(105_000));

    let filtered = FilterSpecification {
        category_id: Some(marine),
        ..Default::default()
    };
    let summary = db.service().summarize(Some(&filtered)).await?;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.by_category.len(), 1);

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn empty_table_statistics_are_zero() -> Result<()> {
    let db = TestDb::new().await?;
    let summary = db.service().summarize(None).await?;
    assert_eq!(summary.total, 0);
    assert_eq!(summary.avg_loss_ratio, Decimal::ZERO);
    assert_eq!(summary.total_gross_premium, Decimal::ZERO);
    assert!(summary.by_status.is_empty());

    db.cleanup().await;
    Ok(())
}

// ── Lifecycle ───────────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn partial_update_changes_only_supplied_fields() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Energy").await?;
    let id = db.program("Offshore", cat, 35, ProgramStatus::Active).await?;
    let service = db.service();
    let before = service.get(id).await?;

    let update = ProgramUpdate {
        underwriter: Some("M. Haddad".into()),
        ..Default::default()
    };
    let after = service.update(id, &update).await?;
    assert_eq!(after.underwriter.as_deref(), Some("M. Haddad"));
    assert_eq!(after.loss_ratio, before.loss_ratio);
    assert_eq!(after.name, before.name);
    assert!(after.updated_at >= before.updated_at);

    let err = service
        .update(id, &ProgramUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProgramError::NoUpdatableFields));

    let err = service
        .update(Uuid::new_v4(), &update)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgramError::NotFound(_)));

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn soft_delete_keeps_row_and_hard_delete_removes_it() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Motor").await?;
    let id = db.program("Fleet", cat, 60, ProgramStatus::Active).await?;
    let re = db.reinsurer("Re Motor").await?;
    db.link_reinsurer(id, re).await?;
    let service = db.service();

    let cancelled = service.soft_delete(id).await?;
    assert_eq!(cancelled.status, ProgramStatus::Cancelled);
    assert_eq!(service.get(id).await?.status, ProgramStatus::Cancelled);

    // A cancelled program frees its name.
    db.program("Fleet", cat, 10, ProgramStatus::Active).await?;

    service.hard_delete(id).await?;
    assert!(matches!(
        service.get(id).await,
        Err(ProgramError::NotFound(_))
    ));
    assert!(matches!(
        service.hard_delete(id).await,
        Err(ProgramError::NotFound(_))
    ));

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM program_reinsurers")
        .fetch_one(db.manager.pool())
        .await?;
    assert_eq!(links, 0);

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn constraint_violations_are_translated() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Agriculture").await?;
    db.program("Harvest", cat, 15, ProgramStatus::Active).await?;
    let service = db.service();

    let err = service
        .create(&NewProgram::new("Harvest", cat))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgramError::UniquenessConflict(_)));

    let err = service
        .create(&NewProgram::new("Orphan", Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgramError::ForeignKeyViolation(_)));
    assert_eq!(err.http_status(), 400);

    let mut negative = NewProgram::new("Negative", cat);
    negative.gross_premium = Some(Decimal::from(-1));
    let err = service.create(&negative).await.unwrap_err();
    assert!(matches!(err, ProgramError::InvalidPayload(_)));

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn create_applies_table_defaults() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Cyber").await?;
    let created = db
        .service()
        .create(&NewProgram::new("Firewall", cat))
        .await?;
    assert_eq!(created.status, ProgramStatus::Active);
    assert_eq!(created.loss_ratio, Decimal::ZERO);
    assert_eq!(created.reinsurer_count, 0);
    assert_eq!(created.category_name.as_deref(), Some("Cyber"));

    db.cleanup().await;
    Ok(())
}

// ── Hierarchy ───────────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn hierarchy_rolls_up_and_skips_cancelled_programs() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Property").await?;
    let re = db.reinsurer("Nordic Re").await?;
    let broker = db.intermediary(re, "Harbor Brokers").await?;
    let service = db.service();

    let mut live = NewProgram::new("Live", cat);
    live.intermediary_id = Some(broker);
    let live = service.create(&live).await?;
    db.transaction(live.id, 400, 100).await?;
    db.transaction(live.id, 100, 75).await?;

    let mut dead = NewProgram::new("Dead", cat);
    dead.intermediary_id = Some(broker);
    let dead = service.create(&dead).await?;
    db.transaction(dead.id, 1_000, 1_000).await?;
    service.soft_delete(dead.id).await?;

    let tree = service.hierarchy().await?;
    assert_eq!(tree.reinsurers().len(), 1);
    assert_eq!(tree.metrics().transaction_count, 2);
    assert_eq!(tree.metrics().premium, Decimal::from(500));
    // mean of 25 and 75
    assert_eq!(tree.metrics().loss_ratio, Decimal::from(50));
    assert!(tree.detached().is_empty());

    db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn unbrokered_program_transactions_are_not_detached() -> Result<()> {
    let db = TestDb::new().await?;
    let cat = db.category("Casualty").await?;
    let re = db.reinsurer("Nordic Re").await?;
    let broker = db.intermediary(re, "Harbor Brokers").await?;
    let service = db.service();

    let mut brokered = NewProgram::new("Brokered", cat);
    brokered.intermediary_id = Some(broker);
    let brokered = service.create(&brokered).await?;
    db.transaction(brokered.id, 200, 50).await?;

    let direct = service.create(&NewProgram::new("Direct", cat)).await?;
    assert_eq!(direct.intermediary_id, None);
    db.transaction(direct.id, 300, 90).await?;
    db.transaction(direct.id, 100, 10).await?;

    let tree = service.hierarchy().await?;
    assert!(tree.detached().is_empty());
    assert_eq!(tree.metrics().transaction_count, 1);
    assert_eq!(tree.metrics().premium, Decimal::from(200));

    db.cleanup().await;
    Ok(())
}

// ── Deadlines ───────────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn statement_timeout_surfaces_as_timeout() -> Result<()> {
    let db = TestDb::new().await?;
    let mut b = StatementBuilder::new(StatementKind::Command);
    b.push("SELECT pg_sleep(2)");
    let statement = b.build();

    let err = db
        .store()
        .execute(&statement, Deadline::after(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgramError::Timeout(_)), "got {err:?}");

    db.cleanup().await;
    Ok(())
}
