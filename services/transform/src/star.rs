//! Dimensional model built from the staged orders
//!
//! Customer and product keys follow first-appearance order after deduplication.
//! Date keys follow chronological order. Facts resolve their keys with a left join
//! on the natural keys, so no staged row is ever dropped.

use chrono::{Datelike, NaiveDate};
use common::model::{CustomerDim, DateDim, FactOrder, OrderRow, ProductDim};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct StarSchema {
    pub customers: Vec<CustomerDim>,
    pub products: Vec<ProductDim>,
    pub dates: Vec<DateDim>,
    pub facts: Vec<FactOrder>,
}

pub fn build_star_schema(rows: &[OrderRow]) -> StarSchema {
    let customers = create_dim_customers(rows);
    let products = create_dim_products(rows);
    let dates = create_dim_date(rows);
    let facts = create_fact_orders(rows, &customers, &products, &dates);
    StarSchema {
        customers,
        products,
        dates,
        facts,
    }
}

/// One row per distinct non-null customer ID, first occurrence wins.
/// Guest orders (no customer ID) are dropped here.
pub fn create_dim_customers(rows: &[OrderRow]) -> Vec<CustomerDim> {
    info!("Building dim_customers");
    let mut seen = HashSet::new();
    let dim: Vec<CustomerDim> = rows
        .iter()
        .filter_map(|r| r.customer_id.map(|id| (id, &r.country)))
        .filter(|(id, _)| seen.insert(*id))
        .enumerate()
        .map(|(idx, (customer_id, country))| CustomerDim {
            customer_key: idx as i64 + 1,
            customer_id,
            country: country.clone(),
        })
        .collect();
    info!("dim_customers has {} rows", dim.len());
    dim
}

/// One row per distinct stock code, first occurrence wins
pub fn create_dim_products(rows: &[OrderRow]) -> Vec<ProductDim> {
    info!("Building dim_products");
    let mut seen = HashSet::new();
    let dim: Vec<ProductDim> = rows
        .iter()
        .filter(|r| seen.insert(r.stock_code.as_str()))
        .enumerate()
        .map(|(idx, r)| ProductDim {
            product_key: idx as i64 + 1,
            stock_code: r.stock_code.clone(),
            description: r.description.clone(),
        })
        .collect();
    info!("dim_products has {} rows", dim.len());
    dim
}

/// One row per distinct calendar date, keyed in ascending date order
pub fn create_dim_date(rows: &[OrderRow]) -> Vec<DateDim> {
    info!("Building dim_date");
    let dates: BTreeSet<NaiveDate> = rows.iter().map(|r| r.invoice_date.date()).collect();
    let dim: Vec<DateDim> = dates
        .into_iter()
        .enumerate()
        .map(|(idx, date)| DateDim {
            date_key: idx as i64 + 1,
            invoice_date: date,
            year: date.year(),
            month: date.month() as i32,
            day: date.day() as i32,
            weekday: date.weekday().num_days_from_monday() as i32,
            month_name: date.format("%B").to_string(),
        })
        .collect();
    info!("dim_date has {} rows", dim.len());
    dim
}

/// Fact rows with surrogate keys resolved by left join on the natural keys
pub fn create_fact_orders(
    rows: &[OrderRow],
    customers: &[CustomerDim],
    products: &[ProductDim],
    dates: &[DateDim],
) -> Vec<FactOrder> {
    info!("Building fact_orders");
    let customer_keys: HashMap<i64, i64> = customers
        .iter()
        .map(|c| (c.customer_id, c.customer_key))
        .collect();
    let product_keys: HashMap<&str, i64> = products
        .iter()
        .map(|p| (p.stock_code.as_str(), p.product_key))
        .collect();
    let date_keys: HashMap<NaiveDate, i64> = dates
        .iter()
        .map(|d| (d.invoice_date, d.date_key))
        .collect();

    let facts: Vec<FactOrder> = rows
        .iter()
        .map(|r| {
            let invoice_date = r.invoice_date.date();
            FactOrder {
                invoice_date,
                date_key: date_keys.get(&invoice_date).copied(),
                customer_key: r
                    .customer_id
                    .and_then(|id| customer_keys.get(&id).copied()),
                product_key: product_keys.get(r.stock_code.as_str()).copied(),
                invoice_no: r.invoice_no.clone(),
                quantity: r.quantity,
                unit_price: r.unit_price,
                line_total: r.quantity as f64 * r.unit_price,
            }
        })
        .collect();
    info!("fact_orders has {} rows", facts.len());
    facts
}
