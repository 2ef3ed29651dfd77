use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the failure cases of the audit, sync, patch, and
/// migration pipelines.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a CSV file cannot be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Transport failure or non-success status from a remote API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection or query failure reported by the database.
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    /// The database connection went away part way through a batch.
    #[error("database connection lost: {0}")]
    ConnectionLost(String),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook does not contain the expected sheet.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// A required configuration value was not provided.
    #[error("missing configuration value {name}. {hint}")]
    MissingConfig { name: &'static str, hint: &'static str },

    /// The OAuth client secrets file needed for a fresh authorization is absent.
    #[error(
        "{} not found. Create an OAuth 2.0 desktop client and download its JSON to this path.",
        .0.display()
    )]
    MissingCredentials(PathBuf),

    /// Raised when the authorization flow or token refresh fails.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// Raised when a workflow blueprint cannot be rewritten.
    #[error("invalid blueprint: {0}")]
    Blueprint(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
