// crates/shopmetrics-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Record conversion failed: {0}")]
    Conversion(String),

    #[error("Query execution failed: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
