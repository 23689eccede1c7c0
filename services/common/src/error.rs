use std::path::PathBuf;

/// Errors raised by the pipeline stages.
///
/// Only a missing transformed file before load is tolerated (the loader skips it).
/// Every other variant terminates the stage.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("input file not found at {0}")]
    InputNotFound(PathBuf),

    #[error("{table}: missing required column '{column}'")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table}: column '{column}' is not of type {expected}")]
    ColumnType {
        table: &'static str,
        column: &'static str,
        expected: &'static str,
    },

    #[error("row {row}: cannot coerce '{value}' in column '{column}'")]
    Coercion {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("sheet '{0}' not found in workbook")]
    UnknownSheet(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
