//! Quick look at what the load stage left in the database

use common::layout::StarTable;
use sqlx::PgPool;

/// Rows shown per table by the `inspect` binary
pub const DEFAULT_PREVIEW_ROWS: i64 = 5;

const LIST_TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

/// Table names in the `public` schema
pub async fn list_tables(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(LIST_TABLES_SQL).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

fn preview_sql(table: StarTable) -> String {
    // table names come from the enum, never from input
    format!(
        "SELECT row_to_json(t)::text FROM (SELECT * FROM {} LIMIT $1) t",
        table.table_name()
    )
}

/// First `n` rows of a star-schema table, one JSON object per row
pub async fn preview(pool: &PgPool, table: StarTable, n: i64) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(&preview_sql(table))
        .bind(n)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(json,)| json).collect())
}
