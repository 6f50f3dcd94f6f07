use std::path::PathBuf;
use thiserror::Error;

/// Per-file failure inside a result store. Logged and skipped at the
/// reader; never surfaced to callers individually.
#[derive(Error, Debug)]
pub enum FileReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("undecodable text")]
    Encoding,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Directory-level failure while listing a result store. A missing
/// directory is not a failure; this fires when the directory exists but
/// cannot be read at all.
#[derive(Error, Debug)]
#[error("failed to read {path}: {source}")]
pub struct StoreError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Both result stores failed outright during a load. The data service
/// keeps its last-known-good collections when this occurs; the caller
/// may retry.
#[derive(Error, Debug)]
#[error("no result stores could be read (responses: {responses}; emails: {emails})")]
pub struct DataLoadError {
    pub responses: StoreError,
    pub emails: StoreError,
}

/// Record-level rejection during normalization. Logged and excluded;
/// aggregate counts reflect only included records.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("email record {id} is missing a recipient address")]
    MissingRecipient { id: String },
}

/// Export failure, distinguishing "nothing matched the current filters"
/// from an actual serialization problem. Both are recoverable.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no data to export")]
    NoData,

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workbook serialization failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chart rendering failure. Caught at the dashboard layer so the other
/// dashboard sections still update.
#[derive(Error, Debug)]
pub enum ChartRenderError {
    #[error("charts have not been initialized")]
    NotInitialized,

    #[error("chart backend failure: {0}")]
    Backend(String),
}
