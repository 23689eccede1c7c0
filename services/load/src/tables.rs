//! SQL shape of each star-schema table

use common::columnar::Columnar;
use common::layout::StarTable;
use common::model::{CustomerDim, DateDim, FactOrder, ProductDim};
use sqlx::query_builder::Separated;
use sqlx::{Postgres, QueryBuilder};

/// Rows per multi-row INSERT
pub const BATCH_SIZE: usize = 1000;

/// A row model that can be bulk-inserted into its own table.
pub trait LoadTable: Columnar {
    const TARGET: StarTable;

    /// Column name and SQL type, in insert order
    const COLUMNS: &'static [(&'static str, &'static str)];

    fn push_row<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

pub fn create_table_sql<T: LoadTable>() -> String {
    let columns: Vec<String> = T::COLUMNS
        .iter()
        .map(|(name, ty)| format!("{} {}", name, ty))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        T::TARGET.table_name(),
        columns.join(", ")
    )
}

pub fn drop_table_sql<T: LoadTable>() -> String {
    format!("DROP TABLE IF EXISTS {}", T::TARGET.table_name())
}

/// Prefix for a multi-row insert; values are appended with `push_values`
pub fn insert_prefix<T: LoadTable>() -> String {
    let names: Vec<&str> = T::COLUMNS.iter().map(|(name, _)| *name).collect();
    format!(
        "INSERT INTO {} ({}) ",
        T::TARGET.table_name(),
        names.join(", ")
    )
}

/// One multi-row INSERT per `BATCH_SIZE` rows, in row order
pub fn insert_batches<T: LoadTable>(rows: &[T]) -> Vec<QueryBuilder<'static, Postgres>> {
    rows.chunks(BATCH_SIZE)
        .map(|chunk| {
            let mut qb = QueryBuilder::<Postgres>::new(insert_prefix::<T>());
            qb.push_values(chunk, |mut b, row| row.push_row(&mut b));
            qb
        })
        .collect()
}

impl LoadTable for CustomerDim {
    const TARGET: StarTable = StarTable::Customers;
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("customer_key", "BIGINT PRIMARY KEY"),
        ("customer_id", "BIGINT NOT NULL"),
        ("country", "TEXT NOT NULL"),
    ];

    fn push_row<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.customer_key)
            .push_bind(self.customer_id)
            .push_bind(self.country.clone());
    }
}

impl LoadTable for ProductDim {
    const TARGET: StarTable = StarTable::Products;
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("product_key", "BIGINT PRIMARY KEY"),
        ("stock_code", "TEXT NOT NULL"),
        ("description", "TEXT"),
    ];

    fn push_row<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.product_key)
            .push_bind(self.stock_code.clone())
            .push_bind(self.description.clone());
    }
}

impl LoadTable for DateDim {
    const TARGET: StarTable = StarTable::Dates;
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("date_key", "BIGINT PRIMARY KEY"),
        ("invoice_date", "DATE NOT NULL"),
        ("year", "INTEGER NOT NULL"),
        ("month", "INTEGER NOT NULL"),
        ("day", "INTEGER NOT NULL"),
        ("weekday", "INTEGER NOT NULL"),
        ("month_name", "TEXT NOT NULL"),
    ];

    fn push_row<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.date_key)
            .push_bind(self.invoice_date)
            .push_bind(self.year)
            .push_bind(self.month)
            .push_bind(self.day)
            .push_bind(self.weekday)
            .push_bind(self.month_name.clone());
    }
}

impl LoadTable for FactOrder {
    const TARGET: StarTable = StarTable::Facts;
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("invoice_date", "DATE NOT NULL"),
        ("date_key", "BIGINT"),
        ("customer_key", "BIGINT"),
        ("product_key", "BIGINT"),
        ("invoice_no", "TEXT NOT NULL"),
        ("quantity", "BIGINT NOT NULL"),
        ("unit_price", "DOUBLE PRECISION NOT NULL"),
        ("line_total", "DOUBLE PRECISION NOT NULL"),
    ];

    fn push_row<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.invoice_date)
            .push_bind(self.date_key)
            .push_bind(self.customer_key)
            .push_bind(self.product_key)
            .push_bind(self.invoice_no.clone())
            .push_bind(self.quantity)
            .push_bind(self.unit_price)
            .push_bind(self.line_total);
    }
}
