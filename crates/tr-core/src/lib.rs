//! testrelay core library.
//!
//! - Report normalization (deduplication and environment reindexing)
//! - The four-phase upload pipeline with retry and compression
//! - Upload configuration loading and validation
//! - Logging setup and CLI exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod normalize;
pub mod upload;

pub use normalize::{check_references, normalize, strip_defaults, NormalizeError, ReferenceIssue};
pub use upload::{ReportUploader, UploadError, UploadOptions, UploadOutcome};
