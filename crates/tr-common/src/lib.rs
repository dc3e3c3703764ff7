//! testrelay common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the tr-* crates:
//! - The report data model (suites, tests, attempts, environments)
//! - Content-addressed attachment identifiers
//! - Common error types
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;
pub mod report;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use id::{AttachmentId, InvalidAttachmentId, RunId};
pub use output::OutputFormat;
pub use report::{
    Annotation, AttachmentRef, Environment, Location, Report, ReportError, RunAttempt,
    StdioEntry, Suite, SuiteType, SystemData, Test, TestStatus, TestStep, TransportPoint,
    REPORT_SCHEMA_VERSION,
};
