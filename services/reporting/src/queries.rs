//! Analytic queries against the star schema

use sqlx::PgPool;

/// Number of products returned by `top_products` unless overridden
pub const DEFAULT_TOP_N: i64 = 10;

pub const MONTHLY_REVENUE_SQL: &str = r#"
    SELECT d.year, d.month, SUM(f.line_total) AS revenue
    FROM fact_orders f
    JOIN dim_date d ON f.date_key = d.date_key
    GROUP BY d.year, d.month
    ORDER BY d.year, d.month
"#;

pub const TOP_PRODUCTS_SQL: &str = r#"
    SELECT p.description, SUM(f.line_total) AS revenue
    FROM fact_orders f
    JOIN dim_products p ON f.product_key = p.product_key
    GROUP BY p.description
    ORDER BY revenue DESC
    LIMIT $1
"#;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: i32,
    pub revenue: f64,
}

impl MonthlyRevenue {
    /// `YYYY-MM` label
    pub fn period(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductRevenue {
    pub description: Option<String>,
    pub revenue: f64,
}

impl ProductRevenue {
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or("(no description)")
    }
}

/// Total revenue per calendar month, oldest first
pub async fn monthly_revenue(pool: &PgPool) -> Result<Vec<MonthlyRevenue>, sqlx::Error> {
    sqlx::query_as(MONTHLY_REVENUE_SQL).fetch_all(pool).await
}

/// The `n` best-selling product descriptions by revenue
pub async fn top_products(pool: &PgPool, n: i64) -> Result<Vec<ProductRevenue>, sqlx::Error> {
    sqlx::query_as(TOP_PRODUCTS_SQL)
        .bind(n)
        .fetch_all(pool)
        .await
}

pub fn format_monthly_revenue(rows: &[MonthlyRevenue]) -> String {
    let mut out = format!("{:<8} {:>16}\n", "period", "revenue");
    for row in rows {
        out.push_str(&format!("{:<8} {:>16.2}\n", row.period(), row.revenue));
    }
    out
}

pub fn format_top_products(rows: &[ProductRevenue]) -> String {
    let width = rows
        .iter()
        .map(|r| r.label().chars().count())
        .max()
        .unwrap_or(0)
        .max("description".len());

    let mut out = format!("{:<width$} {:>16}\n", "description", "revenue", width = width);
    for row in rows {
        out.push_str(&format!(
            "{:<width$} {:>16.2}\n",
            row.label(),
            row.revenue,
            width = width
        ));
    }
    out
}
