//! Exit codes for the tr-core CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-2: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/input errors (recoverable by user action)
//! - 20-29: Internal and I/O errors

use tr_common::{Error, ErrorCategory};

/// Exit codes for tr-core operations.
///
/// These codes are a stable contract for CI scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success: command completed, report uploaded
    Ok = 0,

    /// Upload skipped: no credentials available
    Skipped = 1,

    /// Upload attempted and failed
    UploadFailed = 2,

    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Report is malformed or has dangling references
    InvalidReport = 11,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 0-2 are outcomes, not errors.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Error code name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Ok => "OK",
            ExitCode::Skipped => "OK_SKIPPED",
            ExitCode::UploadFailed => "ERR_UPLOAD",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InvalidReport => "ERR_REPORT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map a library error onto its exit code.
    pub fn for_error(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Config => ExitCode::ArgsError,
            ErrorCategory::Report => ExitCode::InvalidReport,
            ErrorCategory::Bundle => match err {
                Error::ReportNotFound { .. } => ExitCode::ArgsError,
                _ => ExitCode::InvalidReport,
            },
            ErrorCategory::Upload => ExitCode::UploadFailed,
            ErrorCategory::Io => match err {
                Error::Json(_) => ExitCode::InvalidReport,
                _ => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
