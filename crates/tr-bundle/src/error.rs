//! Error types for report directory operations.

use thiserror::Error;

/// Errors that can occur while reading or writing a report directory.
#[derive(Error, Debug)]
pub enum BundleError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory has no report.json
    #[error("report not found: {0}")]
    ReportNotFound(String),

    /// Report written by a newer schema than this reader understands
    #[error("unsupported report version: {version} (supported: {supported})")]
    UnsupportedVersion { version: u32, supported: u32 },
}

impl From<BundleError> for tr_common::Error {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::Io(e) => tr_common::Error::Io(e),
            BundleError::Json(e) => tr_common::Error::Json(e),
            BundleError::ReportNotFound(path) => tr_common::Error::ReportNotFound { path },
            BundleError::UnsupportedVersion { version, .. } => {
                tr_common::Error::UnsupportedVersion { version }
            }
        }
    }
}

/// Result type alias for report directory operations.
pub type Result<T> = std::result::Result<T, BundleError>;
