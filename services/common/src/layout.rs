//! Typed file locations shared by the stages
//!
//! Each stage takes the handles it reads and returns the handles it wrote:
//! extract -> `StagingFile`, transform `StagingFile` -> `TransformedFiles`,
//! load `TransformedFiles` -> database tables.

use std::path::{Path, PathBuf};

/// Environment variable overriding the project root (defaults to the working directory)
pub const ROOT_ENV: &str = "ETL_PROJECT_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var(ROOT_ENV).unwrap_or_else(|_| ".".to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn raw_workbook(&self) -> PathBuf {
        self.root.join("data").join("raw").join("Online Retail.xlsx")
    }

    pub fn staging(&self) -> StagingFile {
        StagingFile::new(
            self.root
                .join("data")
                .join("processed")
                .join("orders_staging.parquet"),
        )
    }

    pub fn transformed(&self) -> TransformedFiles {
        TransformedFiles::in_dir(self.root.join("data").join("processed").join("transformed"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }
}

/// The staged snapshot of the raw workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingFile(PathBuf);

impl StagingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// The four tables of the star schema, in load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StarTable {
    Customers,
    Products,
    Dates,
    Facts,
}

impl StarTable {
    pub const ALL: [StarTable; 4] = [
        StarTable::Customers,
        StarTable::Products,
        StarTable::Dates,
        StarTable::Facts,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            StarTable::Customers => "dim_customers",
            StarTable::Products => "dim_products",
            StarTable::Dates => "dim_date",
            StarTable::Facts => "fact_orders",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.parquet", self.table_name())
    }
}

/// Output of the transform stage, input of the load stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedFiles {
    dir: PathBuf,
}

impl TransformedFiles {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, table: StarTable) -> PathBuf {
        self.dir.join(table.file_name())
    }
}
