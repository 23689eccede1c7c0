//! Analytics - Prints monthly revenue and the top products by revenue
//!
//! Usage:
//!   cargo run --bin analytics
//!   cargo run --bin analytics -- --top-n 20

use anyhow::{Context, Result};
use clap::Parser;
use common::config::load_config;
use common::db;
use common::layout::ProjectLayout;
use common::telemetry::{self, LogConfig};
use reporting::queries::{
    format_monthly_revenue, format_top_products, monthly_revenue, top_products, DEFAULT_TOP_N,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "analytics", about = "Runs the revenue queries against the star schema")]
struct Args {
    /// Number of products in the top-products ranking
    #[arg(long, default_value_t = DEFAULT_TOP_N, value_parser = clap::value_parser!(i64).range(1..))]
    top_n: i64,
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

    let monthly = monthly_revenue(&pool)
        .await
        .context("Monthly revenue query failed")?;
    info!("Monthly revenue: {} months", monthly.len());
    println!("Monthly Revenue:\n{}", format_monthly_revenue(&monthly));

    let top = top_products(&pool, args.top_n)
        .await
        .context("Top products query failed")?;
    println!("Top {} Products:\n{}", args.top_n, format_top_products(&top));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_n_defaults() {
        let args = Args::try_parse_from(["analytics"]).unwrap();
        assert_eq!(args.top_n, DEFAULT_TOP_N);
    }

    #[test]
    fn test_top_n_rejects_non_positive() {
        assert!(Args::try_parse_from(["analytics", "--top-n", "0"]).is_err());
        assert!(Args::try_parse_from(["analytics", "--top-n=-3"]).is_err());
        let args = Args::try_parse_from(["analytics", "--top-n", "20"]).unwrap();
        assert_eq!(args.top_n, 20);
    }
}
