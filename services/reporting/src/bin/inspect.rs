//! Inspect - Lists the database tables and previews each star-schema table

use anyhow::{Context, Result};
use clap::Parser;
use common::config::load_config;
use common::db;
use common::layout::{ProjectLayout, StarTable};
use common::telemetry::{self, LogConfig};
use reporting::inspect::{list_tables, preview, DEFAULT_PREVIEW_ROWS};

#[derive(Parser, Debug)]
#[command(name = "inspect", about = "Shows the loaded tables and a few rows of each")]
struct Args {
    /// Rows to preview per table
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS, value_parser = clap::value_parser!(i64).range(1..))]
    rows: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    telemetry::init(&LogConfig::default());

    let layout = ProjectLayout::from_env();
    let settings = load_config(&layout.config_file())?;
    let pool = db::connect(&settings.db)
        .await
        .context("Failed to connect to database")?;

    let tables = list_tables(&pool).await?;
    println!("Tables in {}: {:?}", settings.db.database, tables);

    for table in StarTable::ALL {
        let name = table.table_name();
        let rows = preview(&pool, table, args.rows)
            .await
            .with_context(|| format!("Failed to preview `{}`", name))?;
        println!("\n{} (first {} rows)", name, rows.len());
        for row in rows {
            println!("  {}", row);
        }
    }

    Ok(())
}
