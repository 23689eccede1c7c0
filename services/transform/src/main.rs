//! Transform Service - Builds the star schema from the staging file
//!
//! Responsibilities:
//! - Load the staged orders
//! - Derive dim_customers, dim_products and dim_date with surrogate keys
//! - Join the keys back onto every line item to produce fact_orders
//! - Write the four tables as Parquet files for the load stage
//!
//! Every run rebuilds all four files from scratch.

mod star;

use anyhow::{Context, Result};
use common::columnar::{read_parquet, write_parquet, Columnar};
use common::layout::{ProjectLayout, StagingFile, StarTable, TransformedFiles};
use common::model::OrderRow;
use common::telemetry::{self, LogConfig};
use star::{build_star_schema, StarSchema};
use std::path::Path;
use tracing::info;

fn load_staging(staging: &StagingFile) -> Result<Vec<OrderRow>> {
    info!("Loading staging data from {}", staging.path().display());
    let rows: Vec<OrderRow> = read_parquet(staging.path())
        .with_context(|| format!("Failed to read staging file {}", staging.path().display()))?;
    info!("Staging contains {} rows", rows.len());
    Ok(rows)
}

fn save_table<T: Columnar>(rows: &[T], path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("Saving {} ({} rows)", name, rows.len());
    write_parquet(path, rows).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn save_star_schema(star: &StarSchema, out: &TransformedFiles) -> Result<()> {
    save_table(&star.customers, &out.path(StarTable::Customers))?;
    save_table(&star.products, &out.path(StarTable::Products))?;
    save_table(&star.dates, &out.path(StarTable::Dates))?;
    save_table(&star.facts, &out.path(StarTable::Facts))?;
    Ok(())
}

/// Transform stage: staging file in, four star-schema files out
fn run(staging: &StagingFile, out: TransformedFiles) -> Result<TransformedFiles> {
    let rows = load_staging(staging)?;
    let star = build_star_schema(&rows);
    save_star_schema(&star, &out)?;
    Ok(out)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init(&LogConfig::default());

    let layout = ProjectLayout::from_env();
    let out = run(&layout.staging(), layout.transformed())?;

    info!("🎉 Transform complete! Output in {}", out.dir().display());
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::model::{CustomerDim, DateDim, FactOrder, ProductDim};
    use common::EtlError;

    fn order(invoice: &str, stock: &str, customer: Option<i64>, day: u32) -> OrderRow {
        OrderRow {
            invoice_no: invoice.to_string(),
            stock_code: stock.to_string(),
            description: None,
            quantity: 2,
            invoice_date: NaiveDate::from_ymd_opt(2011, 1, day)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            unit_price: 4.25,
            customer_id: customer,
            country: "Germany".to_string(),
        }
    }

    #[test]
    fn test_run_writes_four_tables() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let rows = vec![
            order("540001", "22423", Some(12662), 5),
            order("540001", "21731", Some(12662), 5),
            order("540002", "22423", None, 4),
        ];
        write_parquet(layout.staging().path(), &rows).unwrap();

        let out = run(&layout.staging(), layout.transformed()).unwrap();

        let customers: Vec<CustomerDim> = read_parquet(&out.path(StarTable::Customers)).unwrap();
        let products: Vec<ProductDim> = read_parquet(&out.path(StarTable::Products)).unwrap();
        let dates: Vec<DateDim> = read_parquet(&out.path(StarTable::Dates)).unwrap();
        let facts: Vec<FactOrder> = read_parquet(&out.path(StarTable::Facts)).unwrap();

        assert_eq!(customers.len(), 1);
        assert_eq!(products.len(), 2);
        assert_eq!(dates.len(), 2);
        assert_eq!(facts.len(), rows.len());
        assert_eq!(facts[2].customer_key, None);
        // 2011-01-04 sorts before 2011-01-05
        assert_eq!(facts[2].date_key, Some(1));
        assert_eq!(facts[0].date_key, Some(2));
    }

    #[test]
    fn test_missing_staging_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());

        let err = run(&layout.staging(), layout.transformed()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::InputNotFound(_))
        ));
    }
}
