//! Extract Service - Reads the raw order workbook into the staging file
//!
//! Responsibilities:
//! - Open the raw spreadsheet (first sheet unless told otherwise)
//! - Coerce ambiguous columns: identifiers to text, CustomerID to nullable integer
//! - Write the cleaned table to the staging Parquet file for the transform stage
//!
//! Usage:
//!   cargo run --bin extract
//!   cargo run --bin extract -- --sheet "Online Retail"

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::Parser;
use common::columnar::write_parquet;
use common::config::load_config;
use common::layout::{ProjectLayout, StagingFile};
use common::model::{staging_columns as sc, OrderRow};
use common::telemetry::{self, LogConfig};
use common::EtlError;
use std::path::Path;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "extract", about = "Extracts raw orders from the workbook into the staging file")]
struct Args {
    /// Worksheet to read: zero-based index or sheet name (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

impl SheetSelector {
    fn parse(raw: &str) -> Self {
        match raw.trim().parse::<usize>() {
            Ok(idx) => SheetSelector::Index(idx),
            Err(_) => SheetSelector::Name(raw.to_string()),
        }
    }

    fn resolve(&self, sheet_names: &[String]) -> Result<String, EtlError> {
        match self {
            SheetSelector::Index(idx) => sheet_names
                .get(*idx)
                .cloned()
                .ok_or_else(|| EtlError::UnknownSheet(idx.to_string())),
            SheetSelector::Name(name) => sheet_names
                .iter()
                .find(|s| *s == name)
                .cloned()
                .ok_or_else(|| EtlError::UnknownSheet(name.clone())),
        }
    }
}

/// Positions of the required columns in the header row
#[derive(Debug)]
struct ColumnIndex {
    invoice_no: usize,
    stock_code: usize,
    description: usize,
    quantity: usize,
    invoice_date: usize,
    unit_price: usize,
    customer_id: usize,
    country: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &[String]) -> Result<Self, EtlError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(EtlError::MissingColumn {
                    table: "workbook",
                    column: name,
                })
        };

        Ok(Self {
            invoice_no: find(sc::INVOICE_NO)?,
            stock_code: find(sc::STOCK_CODE)?,
            description: find(sc::DESCRIPTION)?,
            quantity: find(sc::QUANTITY)?,
            invoice_date: find(sc::INVOICE_DATE)?,
            unit_price: find(sc::UNIT_PRICE)?,
            customer_id: find(sc::CUSTOMER_ID)?,
            country: find(sc::COUNTRY)?,
        })
    }
}

// =============================================================================
// CELL COERCION
// =============================================================================

fn coercion_error(row: usize, column: &'static str, cell: &Data) -> EtlError {
    EtlError::Coercion {
        row,
        column,
        value: cell.to_string(),
    }
}

/// Exact `i64` value of an integral float, `None` if fractional or out of range
fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then(|| f as i64)
}

/// Text form of a cell. Integral floats lose their `.0` so that a numeric
/// invoice number `536365.0` stages as `"536365"`.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(match integral(*f) {
            Some(i) => i.to_string(),
            None => f.to_string(),
        }),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn cell_integer(cell: &Data, row: usize, column: &'static str) -> Result<Option<i64>, EtlError> {
    match cell {
        Data::Empty => Ok(None),
        Data::Int(i) => Ok(Some(*i)),
        Data::Float(f) => integral(*f)
            .map(Some)
            .ok_or_else(|| coercion_error(row, column, cell)),
        Data::String(s) if s.trim().is_empty() => Ok(None),
        Data::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
                .map(Some)
                .ok_or_else(|| coercion_error(row, column, cell))
        }
        _ => Err(coercion_error(row, column, cell)),
    }
}

fn cell_float(cell: &Data, row: usize, column: &'static str) -> Result<f64, EtlError> {
    match cell {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| coercion_error(row, column, cell)),
        _ => Err(coercion_error(row, column, cell)),
    }
}

const TEXT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TEXT_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Excel serial date (1900 system, day 0 = 1899-12-30), rounded to the millisecond
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(Duration::milliseconds(millis))
}

fn cell_datetime(cell: &Data, row: usize, column: &'static str) -> Result<NaiveDateTime, EtlError> {
    let parsed = match cell {
        Data::String(s) => parse_datetime_text(s),
        Data::Float(f) => excel_serial_to_datetime(*f),
        Data::Int(i) => excel_serial_to_datetime(*i as f64),
        other => other.as_datetime(),
    };
    parsed.ok_or_else(|| coercion_error(row, column, cell))
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Convert a worksheet (header row first) into staged order rows
fn orders_from_range(range: &Range<Data>) -> Result<Vec<OrderRow>, EtlError> {
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| cell_text(c).unwrap_or_default()).collect(),
        None => Vec::new(),
    };
    let idx = ColumnIndex::from_headers(&headers)?;

    let empty = Data::Empty;
    let mut orders = Vec::new();

    for (offset, row) in rows.enumerate() {
        // 1-based sheet row, header is row 1
        let row_num = offset + 2;
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let cell = |i: usize| row.get(i).unwrap_or(&empty);

        let quantity = cell_integer(cell(idx.quantity), row_num, sc::QUANTITY)?
            .ok_or_else(|| coercion_error(row_num, sc::QUANTITY, cell(idx.quantity)))?;

        orders.push(OrderRow {
            invoice_no: cell_text(cell(idx.invoice_no)).unwrap_or_default(),
            stock_code: cell_text(cell(idx.stock_code)).unwrap_or_default(),
            description: cell_text(cell(idx.description)),
            quantity,
            invoice_date: cell_datetime(cell(idx.invoice_date), row_num, sc::INVOICE_DATE)?,
            unit_price: cell_float(cell(idx.unit_price), row_num, sc::UNIT_PRICE)?,
            customer_id: cell_integer(cell(idx.customer_id), row_num, sc::CUSTOMER_ID)?,
            country: cell_text(cell(idx.country)).unwrap_or_default(),
        });
    }

    Ok(orders)
}

/// Read the raw workbook into memory with cleaned column types
fn extract(excel_path: &Path, sheet: &SheetSelector) -> Result<Vec<OrderRow>> {
    if !excel_path.exists() {
        return Err(EtlError::InputNotFound(excel_path.to_path_buf()).into());
    }
    info!("▶ Reading raw data from {}", excel_path.display());

    // calamine auto-detects the format: xls, xlsx, xlsb, ods
    let mut workbook = open_workbook_auto(excel_path).context("Failed to open workbook")?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet.resolve(&sheet_names)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet '{}'", sheet_name))?;
    let (row_count, col_count) = range.get_size();

    let orders = orders_from_range(&range)?;
    info!(
        "✔ Loaded {} rows × {} columns from sheet '{}'",
        orders.len(),
        col_count,
        sheet_name
    );
    if row_count > 0 && orders.len() + 1 < row_count {
        info!("Skipped {} empty rows", row_count - 1 - orders.len());
    }

    Ok(orders)
}

/// Write the cleaned rows out as the staging Parquet file
fn save_staging(rows: &[OrderRow], staging: &StagingFile) -> Result<()> {
    info!("▶ Writing staging file to {}", staging.path().display());
    write_parquet(staging.path(), rows).context("Failed to write staging file")?;
    info!("✔ Staging file saved.");
    Ok(())
}

/// Extract stage: workbook in, staging file out
fn run(workbook: &Path, sheet: &SheetSelector, staging: StagingFile) -> Result<StagingFile> {
    let rows = extract(workbook, sheet)?;
    let cancellations = rows.iter().filter(|r| r.is_cancellation()).count();
    info!("{} line items, {} on cancelled invoices", rows.len(), cancellations);
    save_staging(&rows, &staging)?;
    Ok(staging)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    telemetry::init(&LogConfig::default());

    let layout = ProjectLayout::from_env();
    let settings = load_config(&layout.config_file())?;
    info!("Config loaded (database: {})", settings.db.database);

    let sheet = args
        .sheet
        .as_deref()
        .map(SheetSelector::parse)
        .unwrap_or_default();

    let staging = run(&layout.raw_workbook(), &sheet, layout.staging())?;
    info!("Ready for transform: {}", staging.path().display());

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use common::columnar::read_parquet;

    const HEADERS: [&str; 8] = [
        "InvoiceNo",
        "StockCode",
        "Description",
        "Quantity",
        "InvoiceDate",
        "UnitPrice",
        "CustomerID",
        "Country",
    ];

    fn sheet(rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32 + 1;
        let width = HEADERS.len() as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (c, h) in HEADERS.iter().enumerate() {
            range.set_value((0, c as u32), Data::String(h.to_string()));
        }
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((r as u32 + 1, c as u32), cell);
            }
        }
        range
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn line(invoice: Data, stock: Data, customer: Data) -> Vec<Data> {
        vec![
            invoice,
            stock,
            s("WHITE HANGING HEART T-LIGHT HOLDER"),
            Data::Float(6.0),
            s("2010-12-01 08:26:00"),
            Data::Float(2.55),
            customer,
            s("United Kingdom"),
        ]
    }

    // -------------------------------------------------------------------------
    // TYPE COERCION TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_numeric_identifiers_become_text() {
        let range = sheet(vec![line(Data::Float(536365.0), Data::Int(22423), Data::Float(17850.0))]);
        let rows = orders_from_range(&range).unwrap();

        assert_eq!(rows[0].invoice_no, "536365");
        assert_eq!(rows[0].stock_code, "22423");
        assert_eq!(rows[0].customer_id, Some(17850));
    }

    #[test]
    fn test_cancellation_prefix_is_kept() {
        let range = sheet(vec![line(s("C536379"), s("D"), Data::Float(14527.0))]);
        let rows = orders_from_range(&range).unwrap();

        assert_eq!(rows[0].invoice_no, "C536379");
        assert!(rows[0].is_cancellation());
    }

    #[test]
    fn test_missing_customer_is_null() {
        let range = sheet(vec![
            line(s("536544"), s("21773"), Data::Empty),
            line(s("536544"), s("21774"), s("  ")),
        ]);
        let rows = orders_from_range(&range).unwrap();

        assert_eq!(rows[0].customer_id, None);
        assert_eq!(rows[1].customer_id, None);
    }

    #[test]
    fn test_fractional_customer_id_fails() {
        let range = sheet(vec![line(s("536365"), s("85123A"), Data::Float(17850.5))]);
        let err = orders_from_range(&range).unwrap_err();

        assert!(matches!(err, EtlError::Coercion { row: 2, column: "CustomerID", .. }));
    }

    #[test]
    fn test_oversized_customer_id_fails() {
        let range = sheet(vec![
            line(s("536365"), s("85123A"), Data::Float(1e20)),
            line(s("536365"), s("71053"), s("1e20")),
        ]);
        let err = orders_from_range(&range).unwrap_err();

        assert!(matches!(err, EtlError::Coercion { row: 2, column: "CustomerID", .. }));
        assert_eq!(integral(1e20), None);
        assert_eq!(integral(-9.3e18), None);
        assert_eq!(integral(17850.0), Some(17850));
    }

    #[test]
    fn test_oversized_identifier_keeps_float_text() {
        let range = sheet(vec![line(Data::Float(1e20), s("85123A"), Data::Empty)]);
        let rows = orders_from_range(&range).unwrap();

        assert_eq!(rows[0].invoice_no, 1e20_f64.to_string());
    }

    #[test]
    fn test_empty_description_is_null() {
        let mut row = line(s("536414"), s("22139"), Data::Empty);
        row[2] = Data::Empty;
        let rows = orders_from_range(&sheet(vec![row])).unwrap();

        assert_eq!(rows[0].description, None);
    }

    #[test]
    fn test_negative_quantity_for_returns() {
        let mut row = line(s("C536379"), s("D"), Data::Float(14527.0));
        row[3] = Data::Float(-1.0);
        let rows = orders_from_range(&sheet(vec![row])).unwrap();

        assert_eq!(rows[0].quantity, -1);
    }

    // -------------------------------------------------------------------------
    // DATE PARSING TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_text_timestamp() {
        let rows = orders_from_range(&sheet(vec![line(s("1"), s("A"), Data::Empty)])).unwrap();
        assert_eq!(
            rows[0].invoice_date,
            NaiveDate::from_ymd_opt(2010, 12, 1).unwrap().and_hms_opt(8, 26, 0).unwrap()
        );
    }

    #[test]
    fn test_excel_serial_timestamp() {
        let mut row = line(s("1"), s("A"), Data::Empty);
        row[4] = Data::Float(40513.5);
        let rows = orders_from_range(&sheet(vec![row])).unwrap();

        assert_eq!(
            rows[0].invoice_date,
            NaiveDate::from_ymd_opt(2010, 12, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_us_style_text_timestamp() {
        assert_eq!(
            parse_datetime_text("12/9/2011 12:50"),
            NaiveDate::from_ymd_opt(2011, 12, 9).unwrap().and_hms_opt(12, 50, 0)
        );
    }

    #[test]
    fn test_unparseable_date_fails() {
        let mut row = line(s("1"), s("A"), Data::Empty);
        row[4] = s("yesterday");
        let err = orders_from_range(&sheet(vec![row])).unwrap_err();

        assert!(matches!(err, EtlError::Coercion { column: "InvoiceDate", .. }));
    }

    // -------------------------------------------------------------------------
    // STRUCTURE TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_missing_required_column() {
        let mut range = Range::new((0, 0), (1, 0));
        range.set_value((0, 0), s("InvoiceNo"));
        range.set_value((1, 0), s("536365"));

        let err = orders_from_range(&range).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { column: "StockCode", .. }));
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let range = sheet(vec![
            line(s("536365"), s("85123A"), Data::Float(17850.0)),
            vec![Data::Empty; 8],
            line(s("536366"), s("22633"), Data::Float(17850.0)),
        ]);
        let rows = orders_from_range(&range).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].invoice_no, "536366");
    }

    #[test]
    fn test_sheet_selector() {
        let names = vec!["Online Retail".to_string(), "Notes".to_string()];
        assert_eq!(SheetSelector::default().resolve(&names).unwrap(), "Online Retail");
        assert_eq!(SheetSelector::parse("1").resolve(&names).unwrap(), "Notes");
        assert_eq!(SheetSelector::parse("Notes").resolve(&names).unwrap(), "Notes");
        assert!(matches!(
            SheetSelector::parse("Missing").resolve(&names),
            Err(EtlError::UnknownSheet(_))
        ));
    }

    #[test]
    fn test_missing_workbook_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract(&dir.path().join("Online Retail.xlsx"), &SheetSelector::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_save_staging_writes_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingFile::new(dir.path().join("processed").join("orders_staging.parquet"));
        let rows = orders_from_range(&sheet(vec![line(
            Data::Float(536365.0),
            s("85123A"),
            Data::Empty,
        )]))
        .unwrap();

        save_staging(&rows, &staging).unwrap();
        let back: Vec<OrderRow> = read_parquet(staging.path()).unwrap();
        assert_eq!(back, rows);
    }
}
