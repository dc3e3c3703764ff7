//! Error types for testrelay.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Crate-local errors (`BundleError`, `NormalizeError`, `UploadError`) convert
//! into [`Error`] at the CLI boundary.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Invalid Report
//!   Reason: attempt references environment 3 but only 2 exist
//!   Fix: Regenerate the report; every attempt must reference an existing environment.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 21,
//!   "category": "report",
//!   "message": "environment index 3 out of bounds (2 environments)",
//!   "recoverable": false,
//!   "context": { "index": 3, "len": 2 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for testrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration errors (endpoint, tokens, config file).
    Config,
    /// Malformed report content.
    Report,
    /// Report directory layout errors.
    Bundle,
    /// Network synchronization errors.
    Upload,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Report => write!(f, "report"),
            ErrorCategory::Bundle => write!(f, "bundle"),
            ErrorCategory::Upload => write!(f, "upload"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for testrelay.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    // Report errors (20-29)
    #[error("invalid report: {0}")]
    InvalidReport(String),

    #[error("environment index {index} out of bounds ({len} environments)")]
    EnvironmentIndexOutOfBounds { index: usize, len: usize },

    #[error("unsupported report version {version}")]
    UnsupportedVersion { version: u32 },

    // Report directory errors (30-39)
    #[error("report not found: {path}")]
    ReportNotFound { path: String },

    #[error("attachment {id} is missing")]
    MissingAttachment { id: String },

    // Upload errors (40-49)
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("request to {url} failed with status {status}")]
    UploadStatus { status: u16, url: String },

    #[error("upload protocol violation: {0}")]
    ProtocolViolation(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Report errors
    /// - 30-39: Report directory errors
    /// - 40-49: Upload errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidEndpoint(_) => 11,
            Error::InvalidReport(_) => 20,
            Error::EnvironmentIndexOutOfBounds { .. } => 21,
            Error::UnsupportedVersion { .. } => 22,
            Error::ReportNotFound { .. } => 30,
            Error::MissingAttachment { .. } => 31,
            Error::UploadFailed(_) => 40,
            Error::UploadStatus { .. } => 41,
            Error::ProtocolViolation(_) => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidEndpoint(_) => ErrorCategory::Config,

            Error::InvalidReport(_)
            | Error::EnvironmentIndexOutOfBounds { .. }
            | Error::UnsupportedVersion { .. } => ErrorCategory::Report,

            Error::ReportNotFound { .. } | Error::MissingAttachment { .. } => {
                ErrorCategory::Bundle
            }

            Error::UploadFailed(_) | Error::UploadStatus { .. } | Error::ProtocolViolation(_) => {
                ErrorCategory::Upload
            }

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by retrying or
    /// fixing the environment, as opposed to regenerating the input.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidEndpoint(_) => true,

            Error::InvalidReport(_) => false,
            Error::EnvironmentIndexOutOfBounds { .. } => false,
            Error::UnsupportedVersion { .. } => false,

            Error::ReportNotFound { .. } => true,
            Error::MissingAttachment { .. } => true,

            Error::UploadFailed(_) => true,
            Error::UploadStatus { status, .. } => *status >= 500 || *status == 429,
            // Signals an internal consistency bug, not a transient condition
            Error::ProtocolViolation(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check TR_* environment variables and the config file syntax.",
            Error::InvalidEndpoint(_) => {
                "Set TR_ENDPOINT (or --endpoint) to an http:// or https:// URL."
            }
            Error::InvalidReport(_) => {
                "Regenerate the report with the test reporter; run 'tr-core check <dir>' for details."
            }
            Error::EnvironmentIndexOutOfBounds { .. } => {
                "Regenerate the report; every attempt must reference an existing environment."
            }
            Error::UnsupportedVersion { .. } => {
                "Upgrade tr-core to a version that understands this report format."
            }
            Error::ReportNotFound { .. } => {
                "Pass the directory that contains report.json."
            }
            Error::MissingAttachment { .. } => {
                "Make sure the attachments/ directory was copied alongside report.json."
            }
            Error::UploadFailed(_) => {
                "Retry the upload. If persistent, check network connectivity to the endpoint."
            }
            Error::UploadStatus { .. } => {
                "Check the access token and endpoint. 5xx responses are usually transient; retry later."
            }
            Error::ProtocolViolation(_) => {
                "The service response was inconsistent. Report this as a bug with the log output."
            }
            Error::Io(_) => "Check disk space and permissions, then retry the operation.",
            Error::Json(_) => "Invalid JSON in file. Check syntax with 'jq . <file>'.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidEndpoint(_) => "Invalid Endpoint",
            Error::InvalidReport(_) => "Invalid Report",
            Error::EnvironmentIndexOutOfBounds { .. } => "Invalid Report",
            Error::UnsupportedVersion { .. } => "Unsupported Report Version",
            Error::ReportNotFound { .. } => "Report Not Found",
            Error::MissingAttachment { .. } => "Missing Attachment",
            Error::UploadFailed(_) => "Upload Failed",
            Error::UploadStatus { .. } => "Upload Failed",
            Error::ProtocolViolation(_) => "Upload Protocol Violation",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., status code, URL).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::EnvironmentIndexOutOfBounds { index, len } => {
                context.insert("index".to_string(), serde_json::json!(index));
                context.insert("len".to_string(), serde_json::json!(len));
            }
            Error::UploadStatus { status, url } => {
                context.insert("status".to_string(), serde_json::json!(status));
                context.insert("url".to_string(), serde_json::json!(url));
            }
            Error::MissingAttachment { id } => {
                context.insert("attachment_id".to_string(), serde_json::json!(id));
            }
            Error::ReportNotFound { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
