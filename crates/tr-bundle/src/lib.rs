//! Report directory reader/writer for testrelay.
//!
//! A report directory is the on-disk hand-off format between the test
//! reporter that produced a report and the tools that normalize or upload it.
//!
//! # Directory Layout
//!
//! ```text
//! <dir>/
//!   report.json          canonical Report, UTF-8 JSON
//!   attachments/
//!     <sha1-hex>         one file per attachment, named by content id
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tr_bundle::{Attachment, ReportReader, ReportWriter};
//! use tr_common::Report;
//! use std::path::Path;
//!
//! let screenshot = Attachment::from_buffer(vec![0x89, b'P', b'N', b'G'], "image/png");
//! ReportWriter::new("out").write(&Report::new("pytest", "4f2a9c"), &[screenshot]).unwrap();
//!
//! let loaded = ReportReader::open(Path::new("out")).unwrap();
//! assert!(loaded.missing.is_empty());
//! ```

pub mod attachment;
pub mod error;
pub mod reader;
pub mod writer;

pub use attachment::{hash_bytes, hash_file, hash_reader, Attachment};
pub use error::{BundleError, Result};
pub use reader::{AttachmentMismatch, LoadedReport, ReportReader};
pub use writer::{ReportWriter, WriteSummary};

/// Name of the report document inside a report directory.
pub const REPORT_FILE: &str = "report.json";

/// Name of the attachments subdirectory.
pub const ATTACHMENTS_DIR: &str = "attachments";
