//! Load Service - Persists the star schema into PostgreSQL
//!
//! Responsibilities:
//! - Read each transformed Parquet file
//! - Drop and recreate its target table (full replace on every run)
//! - Bulk insert rows in batches
//! - Skip, with a warning, any expected file that is missing
//!
//! No rollback: a failure midway leaves the tables loaded so far in place.

mod tables;

use anyhow::{Context, Result};
use common::columnar::read_parquet;
use common::config::load_config;
use common::db;
use common::layout::{ProjectLayout, StarTable, TransformedFiles};
use common::model::{CustomerDim, DateDim, FactOrder, ProductDim};
use common::telemetry::{self, LogConfig};
use sqlx::PgPool;
use std::path::Path;
use tables::{create_table_sql, drop_table_sql, insert_batches, LoadTable};
use tracing::{info, warn};

/// Destination for a fully replaced table
trait TableSink {
    async fn replace_table<T: LoadTable>(&mut self, rows: &[T]) -> Result<u64>;
}

struct PgSink {
    pool: PgPool,
}

impl TableSink for PgSink {
    async fn replace_table<T: LoadTable>(&mut self, rows: &[T]) -> Result<u64> {
        sqlx::query(&drop_table_sql::<T>())
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_table_sql::<T>())
            .execute(&self.pool)
            .await?;

        let mut inserted = 0;
        for mut qb in insert_batches(rows) {
            inserted += qb.build().execute(&self.pool).await?.rows_affected();
        }
        Ok(inserted)
    }
}

#[derive(Debug, Default)]
struct LoadReport {
    loaded: Vec<(StarTable, u64)>,
    skipped: Vec<StarTable>,
}

async fn load_file<T: LoadTable, S: TableSink>(sink: &mut S, path: &Path) -> Result<Option<u64>> {
    let table = T::TARGET.table_name();
    if !path.exists() {
        warn!("Skipping missing file: {}", path.display());
        return Ok(None);
    }

    info!("Reading {}", path.display());
    let rows: Vec<T> = read_parquet(path)?;

    info!("Writing {} rows to table `{}` (replace)", rows.len(), table);
    let inserted = sink
        .replace_table(&rows)
        .await
        .with_context(|| format!("Failed to load table `{}`", table))?;
    info!("✔ Finished loading `{}`", table);

    Ok(Some(inserted))
}

/// Load stage: transformed files in, database tables out
async fn run<S: TableSink>(files: &TransformedFiles, sink: &mut S) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for table in StarTable::ALL {
        let path = files.path(table);
        let outcome = match table {
            StarTable::Customers => load_file::<CustomerDim, _>(sink, &path).await?,
            StarTable::Products => load_file::<ProductDim, _>(sink, &path).await?,
            StarTable::Dates => load_file::<DateDim, _>(sink, &path).await?,
            StarTable::Facts => load_file::<FactOrder, _>(sink, &path).await?,
        };
        match outcome {
            Some(rows) => report.loaded.push((table, rows)),
            None => report.skipped.push(table),
        }
    }

    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init(&LogConfig::default());

    let layout = ProjectLayout::from_env();
    let settings = load_config(&layout.config_file())?;
    let pool = db::connect(&settings.db)
        .await
        .context("Failed to connect to database")?;

    let mut sink = PgSink { pool };
    let report = run(&layout.transformed(), &mut sink).await?;

    if report.skipped.is_empty() {
        info!("🎉 All tables loaded into the database!");
    } else {
        warn!(
            "Loaded {} tables, skipped {}: {:?}",
            report.loaded.len(),
            report.skipped.len(),
            report.skipped.iter().map(|t| t.table_name()).collect::<Vec<_>>()
        );
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
