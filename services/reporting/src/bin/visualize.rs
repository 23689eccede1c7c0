//! Visualize - Renders the revenue charts to PNG
//!
//! Writes `output/monthly_revenue.png` and `output/top_products.png`.

use anyhow::{Context, Result};
use clap::Parser;
use common::config::load_config;
use common::db;
use common::layout::ProjectLayout;
use common::telemetry::{self, LogConfig};
use reporting::charts::{load_font, plot_monthly_revenue, plot_top_products};
use reporting::queries::{monthly_revenue, top_products, DEFAULT_TOP_N};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "visualize", about = "Renders revenue bar charts from the star schema")]
struct Args {
    /// Number of products in the top-products chart
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

    let out_dir = layout.output_dir();
    let font = load_font();

    let monthly = monthly_revenue(&pool)
        .await
        .context("Monthly revenue query failed")?;
    plot_monthly_revenue(&monthly, &out_dir, font.as_ref())?;

    let top = top_products(&pool, args.top_n)
        .await
        .context("Top products query failed")?;
    plot_top_products(&top, &out_dir, font.as_ref())?;

    info!("🎉 Charts written to {}", out_dir.display());
    Ok(())
}
