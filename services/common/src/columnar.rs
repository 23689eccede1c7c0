//! Parquet codec for the staging and star-schema tables
//!
//! Each row model maps to one Arrow schema. Nullable model fields map to nullable
//! Arrow fields, so null markers survive a write/read cycle. Timestamps are stored
//! at microsecond precision without a zone, dates as `Date32`.

use crate::error::{EtlError, Result};
use crate::model::{staging_columns as sc, CustomerDim, DateDim, FactOrder, OrderRow, ProductDim};
use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

/// A row model with a fixed Arrow schema.
pub trait Columnar: Sized {
    /// Table name used in error messages
    const TABLE: &'static str;

    fn schema() -> SchemaRef;

    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

/// Write `rows` as a single-row-group Parquet file, creating parent directories.
pub fn write_parquet<T: Columnar>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let batch = T::to_batch(rows)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Read every record batch of a Parquet file into row models.
pub fn read_parquet<T: Columnar>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(EtlError::InputNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        rows.extend(T::from_batch(&batch?)?);
    }
    Ok(rows)
}

// =============================================================================
// Column helpers
// =============================================================================

fn column<'a, A: Array + 'static>(
    batch: &'a RecordBatch,
    table: &'static str,
    name: &'static str,
    expected: &'static str,
) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .ok_or(EtlError::MissingColumn {
            table,
            column: name,
        })?
        .as_any()
        .downcast_ref::<A>()
        .ok_or(EtlError::ColumnType {
            table,
            column: name,
            expected,
        })
}

fn strings<'a>(batch: &'a RecordBatch, table: &'static str, name: &'static str) -> Result<&'a StringArray> {
    column(batch, table, name, "Utf8")
}

fn int64s<'a>(batch: &'a RecordBatch, table: &'static str, name: &'static str) -> Result<&'a Int64Array> {
    column(batch, table, name, "Int64")
}

fn int32s<'a>(batch: &'a RecordBatch, table: &'static str, name: &'static str) -> Result<&'a Int32Array> {
    column(batch, table, name, "Int32")
}

fn float64s<'a>(batch: &'a RecordBatch, table: &'static str, name: &'static str) -> Result<&'a Float64Array> {
    column(batch, table, name, "Float64")
}

fn dates<'a>(batch: &'a RecordBatch, table: &'static str, name: &'static str) -> Result<&'a Date32Array> {
    column(batch, table, name, "Date32")
}

fn opt_string(array: &StringArray, i: usize) -> Option<String> {
    (!array.is_null(i)).then(|| array.value(i).to_string())
}

fn opt_i64(array: &Int64Array, i: usize) -> Option<i64> {
    (!array.is_null(i)).then(|| array.value(i))
}

fn out_of_range(row: usize, column: &'static str, value: impl ToString) -> EtlError {
    EtlError::Coercion {
        row,
        column,
        value: value.to_string(),
    }
}

fn read_date(array: &Date32Array, i: usize, column: &'static str) -> Result<NaiveDate> {
    array
        .value_as_date(i)
        .ok_or_else(|| out_of_range(i, column, array.value(i)))
}

// =============================================================================
// Staging table
// =============================================================================

impl Columnar for OrderRow {
    const TABLE: &'static str = "orders_staging";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new(sc::INVOICE_NO, DataType::Utf8, false),
            Field::new(sc::STOCK_CODE, DataType::Utf8, false),
            Field::new(sc::DESCRIPTION, DataType::Utf8, true),
            Field::new(sc::QUANTITY, DataType::Int64, false),
            Field::new(
                sc::INVOICE_DATE,
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
            Field::new(sc::UNIT_PRICE, DataType::Float64, false),
            Field::new(sc::CUSTOMER_ID, DataType::Int64, true),
            Field::new(sc::COUNTRY, DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.invoice_no.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.stock_code.as_str()))),
            Arc::new(rows.iter().map(|r| r.description.as_deref()).collect::<StringArray>()),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.quantity))),
            Arc::new(TimestampMicrosecondArray::from_iter_values(
                rows.iter().map(|r| r.invoice_date.and_utc().timestamp_micros()),
            )),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.unit_price))),
            Arc::new(rows.iter().map(|r| r.customer_id).collect::<Int64Array>()),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.country.as_str()))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let invoice_no = strings(batch, t, sc::INVOICE_NO)?;
        let stock_code = strings(batch, t, sc::STOCK_CODE)?;
        let description = strings(batch, t, sc::DESCRIPTION)?;
        let quantity = int64s(batch, t, sc::QUANTITY)?;
        let invoice_date: &TimestampMicrosecondArray =
            column(batch, t, sc::INVOICE_DATE, "Timestamp(Microsecond)")?;
        let unit_price = float64s(batch, t, sc::UNIT_PRICE)?;
        let customer_id = int64s(batch, t, sc::CUSTOMER_ID)?;
        let country = strings(batch, t, sc::COUNTRY)?;

        (0..batch.num_rows())
            .map(|i| -> Result<OrderRow> {
                let micros = invoice_date.value(i);
                let invoice_date: NaiveDateTime = DateTime::from_timestamp_micros(micros)
                    .ok_or_else(|| out_of_range(i, sc::INVOICE_DATE, micros))?
                    .naive_utc();
                Ok(OrderRow {
                    invoice_no: invoice_no.value(i).to_string(),
                    stock_code: stock_code.value(i).to_string(),
                    description: opt_string(description, i),
                    quantity: quantity.value(i),
                    invoice_date,
                    unit_price: unit_price.value(i),
                    customer_id: opt_i64(customer_id, i),
                    country: country.value(i).to_string(),
                })
            })
            .collect()
    }
}

// =============================================================================
// Star schema tables
// =============================================================================

impl Columnar for CustomerDim {
    const TABLE: &'static str = "dim_customers";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Int64, false),
            Field::new("country", DataType::Utf8, false),
            Field::new("customer_key", DataType::Int64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.customer_id))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.country.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.customer_key))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let customer_id = int64s(batch, t, "customer_id")?;
        let country = strings(batch, t, "country")?;
        let customer_key = int64s(batch, t, "customer_key")?;

        Ok((0..batch.num_rows())
            .map(|i| CustomerDim {
                customer_key: customer_key.value(i),
                customer_id: customer_id.value(i),
                country: country.value(i).to_string(),
            })
            .collect())
    }
}

impl Columnar for ProductDim {
    const TABLE: &'static str = "dim_products";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("stock_code", DataType::Utf8, false),
            Field::new("description", DataType::Utf8, true),
            Field::new("product_key", DataType::Int64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.stock_code.as_str()))),
            Arc::new(rows.iter().map(|r| r.description.as_deref()).collect::<StringArray>()),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.product_key))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let stock_code = strings(batch, t, "stock_code")?;
        let description = strings(batch, t, "description")?;
        let product_key = int64s(batch, t, "product_key")?;

        Ok((0..batch.num_rows())
            .map(|i| ProductDim {
                product_key: product_key.value(i),
                stock_code: stock_code.value(i).to_string(),
                description: opt_string(description, i),
            })
            .collect())
    }
}

impl Columnar for DateDim {
    const TABLE: &'static str = "dim_date";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("invoice_date", DataType::Date32, false),
            Field::new("date_key", DataType::Int64, false),
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("weekday", DataType::Int32, false),
            Field::new("month_name", DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| Date32Type::from_naive_date(r.invoice_date)))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.date_key))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.month))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.day))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.weekday))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.month_name.as_str()))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let invoice_date = dates(batch, t, "invoice_date")?;
        let date_key = int64s(batch, t, "date_key")?;
        let year = int32s(batch, t, "year")?;
        let month = int32s(batch, t, "month")?;
        let day = int32s(batch, t, "day")?;
        let weekday = int32s(batch, t, "weekday")?;
        let month_name = strings(batch, t, "month_name")?;

        (0..batch.num_rows())
            .map(|i| -> Result<DateDim> {
                Ok(DateDim {
                    date_key: date_key.value(i),
                    invoice_date: read_date(invoice_date, i, "invoice_date")?,
                    year: year.value(i),
                    month: month.value(i),
                    day: day.value(i),
                    weekday: weekday.value(i),
                    month_name: month_name.value(i).to_string(),
                })
            })
            .collect()
    }
}

impl Columnar for FactOrder {
    const TABLE: &'static str = "fact_orders";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("invoice_date", DataType::Date32, false),
            Field::new("date_key", DataType::Int64, true),
            Field::new("customer_key", DataType::Int64, true),
            Field::new("product_key", DataType::Int64, true),
            Field::new("invoice_no", DataType::Utf8, false),
            Field::new("quantity", DataType::Int64, false),
            Field::new("unit_price", DataType::Float64, false),
            Field::new("line_total", DataType::Float64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| Date32Type::from_naive_date(r.invoice_date)))),
            Arc::new(rows.iter().map(|r| r.date_key).collect::<Int64Array>()),
            Arc::new(rows.iter().map(|r| r.customer_key).collect::<Int64Array>()),
            Arc::new(rows.iter().map(|r| r.product_key).collect::<Int64Array>()),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.invoice_no.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.quantity))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.unit_price))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.line_total))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let invoice_date = dates(batch, t, "invoice_date")?;
        let date_key = int64s(batch, t, "date_key")?;
        let customer_key = int64s(batch, t, "customer_key")?;
        let product_key = int64s(batch, t, "product_key")?;
        let invoice_no = strings(batch, t, "invoice_no")?;
        let quantity = int64s(batch, t, "quantity")?;
        let unit_price = float64s(batch, t, "unit_price")?;
        let line_total = float64s(batch, t, "line_total")?;

        (0..batch.num_rows())
            .map(|i| -> Result<FactOrder> {
                Ok(FactOrder {
                    invoice_date: read_date(invoice_date, i, "invoice_date")?,
                    date_key: opt_i64(date_key, i),
                    customer_key: opt_i64(customer_key, i),
                    product_key: opt_i64(product_key, i),
                    invoice_no: invoice_no.value(i).to_string(),
                    quantity: quantity.value(i),
                    unit_price: unit_price.value(i),
                    line_total: line_total.value(i),
                })
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn sample_orders() -> Vec<OrderRow> {
        vec![
            OrderRow {
                invoice_no: "536365".to_string(),
                stock_code: "85123A".to_string(),
                description: Some("WHITE HANGING HEART T-LIGHT HOLDER".to_string()),
                quantity: 6,
                invoice_date: ts("2010-12-01 08:26:00"),
                unit_price: 2.55,
                customer_id: Some(17850),
                country: "United Kingdom".to_string(),
            },
            OrderRow {
                invoice_no: "C536379".to_string(),
                stock_code: "22423".to_string(),
                description: None,
                quantity: -1,
                invoice_date: ts("2010-12-01 09:41:00"),
                unit_price: 12.75,
                customer_id: None,
                country: "United Kingdom".to_string(),
            },
        ]
    }

    // -------------------------------------------------------------------------
    // ROUND TRIP
    // -------------------------------------------------------------------------

    #[test]
    fn test_staging_round_trip_preserves_values_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("orders_staging.parquet");
        let rows = sample_orders();

        write_parquet(&path, &rows).unwrap();
        let back: Vec<OrderRow> = read_parquet(&path).unwrap();

        assert_eq!(back, rows);
        assert_eq!(back[1].customer_id, None);
        assert_eq!(back[1].description, None);
    }

    #[test]
    fn test_staging_identifiers_are_utf8_even_when_numeric() {
        let batch = OrderRow::to_batch(&sample_orders()).unwrap();
        let schema = batch.schema();
        assert_eq!(schema.field_with_name(sc::INVOICE_NO).unwrap().data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name(sc::STOCK_CODE).unwrap().data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name(sc::CUSTOMER_ID).unwrap().data_type(), &DataType::Int64);
        assert!(schema.field_with_name(sc::CUSTOMER_ID).unwrap().is_nullable());
    }

    #[test]
    fn test_fact_round_trip_keeps_null_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fact_orders.parquet");
        let rows = vec![FactOrder {
            invoice_date: NaiveDate::from_ymd_opt(2011, 3, 14).unwrap(),
            date_key: Some(3),
            customer_key: None,
            product_key: Some(7),
            invoice_no: "540001".to_string(),
            quantity: 4,
            unit_price: 1.25,
            line_total: 5.0,
        }];

        write_parquet(&path, &rows).unwrap();
        let back: Vec<FactOrder> = read_parquet(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_date_dimension_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dim_date.parquet");
        let rows = vec![DateDim {
            date_key: 1,
            invoice_date: NaiveDate::from_ymd_opt(2010, 12, 1).unwrap(),
            year: 2010,
            month: 12,
            day: 1,
            weekday: 2,
            month_name: "December".to_string(),
        }];

        write_parquet(&path, &rows).unwrap();
        let back: Vec<DateDim> = read_parquet(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_empty_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dim_customers.parquet");

        write_parquet::<CustomerDim>(&path, &[]).unwrap();
        let back: Vec<CustomerDim> = read_parquet(&path).unwrap();
        assert!(back.is_empty());
    }

    // -------------------------------------------------------------------------
    // ERRORS
    // -------------------------------------------------------------------------

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_parquet::<OrderRow>(&dir.path().join("nope.parquet")).unwrap_err();
        assert!(matches!(err, EtlError::InputNotFound(_)));
    }

    #[test]
    fn test_missing_column_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new(sc::INVOICE_NO, DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(StringArray::from(vec!["536365"])) as ArrayRef],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = read_parquet::<OrderRow>(&path).unwrap_err();
        assert!(matches!(
            err,
            EtlError::MissingColumn { table: "orders_staging", column: "StockCode" }
        ));
    }

    #[test]
    fn test_wrong_column_type_is_surfaced() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Utf8, false),
            Field::new("country", DataType::Utf8, false),
            Field::new("customer_key", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["17850"])) as ArrayRef,
                Arc::new(StringArray::from(vec!["France"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![1])) as ArrayRef,
            ],
        )
        .unwrap();

        let err = CustomerDim::from_batch(&batch).unwrap_err();
        assert!(matches!(err, EtlError::ColumnType { column: "customer_id", .. }));
    }

    #[test]
    fn test_epoch_day_encoding() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(Date32Type::from_naive_date(epoch), 0);
    }

    #[test]
    fn test_out_of_range_date_is_coercion_error() {
        let batch = RecordBatch::try_new(
            DateDim::schema(),
            vec![
                Arc::new(Date32Array::from(vec![i32::MAX])) as ArrayRef,
                Arc::new(Int64Array::from(vec![1])) as ArrayRef,
                Arc::new(Int32Array::from(vec![2011])) as ArrayRef,
                Arc::new(Int32Array::from(vec![12])) as ArrayRef,
                Arc::new(Int32Array::from(vec![9])) as ArrayRef,
                Arc::new(Int32Array::from(vec![4])) as ArrayRef,
                Arc::new(StringArray::from(vec!["December"])) as ArrayRef,
            ],
        )
        .unwrap();

        let err = DateDim::from_batch(&batch).unwrap_err();
        assert!(matches!(
            err,
            EtlError::Coercion { row: 0, column: "invoice_date", .. }
        ));
    }
}
