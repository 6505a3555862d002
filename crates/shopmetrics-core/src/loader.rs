//! The batch loader: merges external record sets into the store in
//! dependency order with fixed-size commit batches, then builds indexes.
//!
//! There is no global transaction around the whole load. Commit batching
//! bounds the size of any single transaction; a failure partway through a
//! step rolls back only the open batch and leaves everything previously
//! committed in place.

use std::path::PathBuf;

use serde::Serialize;
use sqlx::AnyPool;
use tracing::{error, info, warn};

use crate::dialect::SqlDialect;
use crate::entities::{Category, Customer, Entity, Inventory, Order, OrderItem, Product, WriteMode};
use crate::error::Result;
use crate::record::RecordSources;

const INDEX_FILE: &str = "create_indexes.sql";

/// Outcome of one entity load step.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub entity: &'static str,
    pub mode: WriteMode,
    pub records: usize,
    /// Number of commits issued, including the unconditional final one.
    pub batches: usize,
}

/// Outcome of the best-effort index build.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IndexSummary {
    pub attempted: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub steps: Vec<StepSummary>,
    pub skipped: Vec<&'static str>,
    pub indexes: Option<IndexSummary>,
}

impl LoadReport {
    pub fn total_records(&self) -> usize {
        self.steps.iter().map(|step| step.records).sum()
    }

    pub fn step(&self, entity: &str) -> Option<&StepSummary> {
        self.steps.iter().find(|step| step.entity == entity)
    }
}

pub struct BatchLoader<S: RecordSources> {
    pool: AnyPool,
    sources: S,
    query_dir: PathBuf,
    dialect: SqlDialect,
}

impl<S: RecordSources> BatchLoader<S> {
    pub fn new(
        pool: AnyPool,
        sources: S,
        query_dir: impl Into<PathBuf>,
        dialect: SqlDialect,
    ) -> Self {
        Self {
            pool,
            sources,
            query_dir: query_dir.into(),
            dialect,
        }
    }

    /// Load every dataset in dependency order (parents before children), then
    /// build indexes. A missing dataset is skipped with a warning; a bad
    /// record aborts the load with prior committed batches left in place.
    pub async fn load_all(&self) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        self.run_step::<Category>(&mut report).await?;
        self.run_step::<Product>(&mut report).await?;
        self.run_step::<Customer>(&mut report).await?;
        self.run_step::<Order>(&mut report).await?;
        self.run_step::<OrderItem>(&mut report).await?;
        self.run_step::<Inventory>(&mut report).await?;

        match self.build_indexes().await {
            Ok(summary) => report.indexes = Some(summary),
            // Index creation is best-effort; the load itself has succeeded.
            Err(err) => error!("index build failed: {err}"),
        }

        info!(records = report.total_records(), "data load finished");
        Ok(report)
    }

    async fn run_step<E: Entity>(&self, report: &mut LoadReport) -> Result<()> {
        let Some(mut source) = self.sources.open(E::NAME)? else {
            warn!(entity = E::NAME, "record source not found, skipping");
            report.skipped.push(E::NAME);
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        let mut records = 0usize;
        let mut batches = 0usize;

        while let Some(record) = source.next_record()? {
            let entity = E::from_record(&record)?;
            entity.apply(&mut tx, self.dialect).await?;
            records += 1;

            if records % E::BATCH_SIZE == 0 {
                tx.commit().await?;
                batches += 1;
                tx = self.pool.begin().await?;
            }
        }

        // The final commit is unconditional so a zero-record or
        // partial-final-batch source still commits.
        tx.commit().await?;
        batches += 1;

        info!(entity = E::NAME, records, batches, "loaded records");
        report.steps.push(StepSummary {
            entity: E::NAME,
            mode: E::WRITE_MODE,
            records,
            batches,
        });
        Ok(())
    }

    /// Execute each statement of the index definition file independently.
    /// An individual failure (typically "already exists") is logged and the
    /// remaining statements still run, so the build is safe to re-run.
    pub async fn build_indexes(&self) -> Result<IndexSummary> {
        let path = self.query_dir.join(INDEX_FILE);
        let sql = std::fs::read_to_string(&path)?;

        let mut summary = IndexSummary::default();
        for statement in sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            summary.attempted += 1;
            if let Err(err) = sqlx::query(statement).execute(&self.pool).await {
                warn!("index creation warning: {err}");
                summary.failed += 1;
            }
        }

        info!(
            attempted = summary.attempted,
            failed = summary.failed,
            "index build finished"
        );
        Ok(summary)
    }
}
