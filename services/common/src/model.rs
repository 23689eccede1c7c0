//! Row models for the staging table and the star schema

use chrono::{NaiveDate, NaiveDateTime};

/// Staging column names, kept exactly as they appear in the source workbook
pub mod staging_columns {
    pub const INVOICE_NO: &str = "InvoiceNo";
    pub const STOCK_CODE: &str = "StockCode";
    pub const DESCRIPTION: &str = "Description";
    pub const QUANTITY: &str = "Quantity";
    pub const INVOICE_DATE: &str = "InvoiceDate";
    pub const UNIT_PRICE: &str = "UnitPrice";
    pub const CUSTOMER_ID: &str = "CustomerID";
    pub const COUNTRY: &str = "Country";

    pub const ALL: [&str; 8] = [
        INVOICE_NO,
        STOCK_CODE,
        DESCRIPTION,
        QUANTITY,
        INVOICE_DATE,
        UNIT_PRICE,
        CUSTOMER_ID,
        COUNTRY,
    ];
}

/// One line item of one invoice, as extracted from the workbook.
///
/// `invoice_no` is text because a letter prefix (e.g. `C536379`) marks a cancellation.
/// `customer_id` is `None` for guest orders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub invoice_no: String,
    pub stock_code: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub invoice_date: NaiveDateTime,
    pub unit_price: f64,
    pub customer_id: Option<i64>,
    pub country: String,
}

impl OrderRow {
    pub fn is_cancellation(&self) -> bool {
        self.invoice_no
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerDim {
    pub customer_key: i64,
    pub customer_id: i64,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDim {
    pub product_key: i64,
    pub stock_code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateDim {
    pub date_key: i64,
    pub invoice_date: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    /// Monday = 0
    pub weekday: i32,
    pub month_name: String,
}

/// One fact row per staged line item. Dimension keys come from a left join,
/// so a key is `None` when its lookup found nothing (guest orders for `customer_key`).
#[derive(Debug, Clone, PartialEq)]
pub struct FactOrder {
    pub invoice_date: NaiveDate,
    pub date_key: Option<i64>,
    pub customer_key: Option<i64>,
    pub product_key: Option<i64>,
    pub invoice_no: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub line_total: f64,
}
