//! Report directory reader.
//!
//! Parses `report.json` and resolves every attachment reference to a file in
//! `attachments/`.

use crate::attachment::{hash_file, Attachment};
use crate::{BundleError, Result, ATTACHMENTS_DIR, REPORT_FILE};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tr_common::{AttachmentId, AttachmentRef, Report, REPORT_SCHEMA_VERSION};
use tracing::{debug, info, warn};

/// An attachment whose bytes no longer hash to the id it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMismatch {
    pub expected: AttachmentId,
    pub actual: AttachmentId,
    pub path: PathBuf,
}

/// A report loaded from disk together with its resolved attachments.
#[derive(Debug, Clone)]
pub struct LoadedReport {
    pub dir: PathBuf,
    pub report: Report,
    /// One file-backed attachment per distinct referenced id present on disk.
    pub attachments: Vec<Attachment>,
    /// References whose `attachments/<id>` file does not exist.
    pub missing: Vec<AttachmentRef>,
}

impl LoadedReport {
    /// Recompute the id of every resolved attachment from its bytes.
    pub fn verify_attachments(&self) -> Result<Vec<AttachmentMismatch>> {
        let mut mismatches = Vec::new();
        for attachment in &self.attachments {
            if let Attachment::File { id, path, .. } = attachment {
                let actual = hash_file(path)?;
                if &actual != id {
                    warn!(expected = %id, actual = %actual, "Attachment checksum mismatch");
                    mismatches.push(AttachmentMismatch {
                        expected: id.clone(),
                        actual,
                        path: path.clone(),
                    });
                }
            }
        }
        Ok(mismatches)
    }
}

/// Reader for report directories.
pub struct ReportReader;

impl ReportReader {
    /// Open a report directory.
    pub fn open(dir: &Path) -> Result<LoadedReport> {
        let report_path = dir.join(REPORT_FILE);
        if !report_path.is_file() {
            return Err(BundleError::ReportNotFound(report_path.display().to_string()));
        }

        let bytes = std::fs::read(&report_path)?;
        let report = Self::parse(&bytes)?;

        let attachments_dir = dir.join(ATTACHMENTS_DIR);
        let mut seen: HashSet<&AttachmentId> = HashSet::new();
        let mut attachments = Vec::new();
        let mut missing = Vec::new();

        for reference in report.attachment_refs() {
            if !seen.insert(&reference.id) {
                continue;
            }
            let path = attachments_dir.join(reference.id.as_str());
            if path.is_file() {
                attachments.push(Attachment::from_known_file(
                    reference.id.clone(),
                    path,
                    reference.content_type.clone(),
                ));
            } else {
                debug!(id = %reference.id, "Referenced attachment not on disk");
                missing.push(reference.clone());
            }
        }

        info!(
            dir = %dir.display(),
            tests = report.test_count(),
            attachments = attachments.len(),
            missing = missing.len(),
            "Report opened"
        );

        Ok(LoadedReport {
            dir: dir.to_path_buf(),
            report,
            attachments,
            missing,
        })
    }

    /// Parse `report.json` bytes and check the schema version.
    pub fn parse(bytes: &[u8]) -> Result<Report> {
        let report: Report = serde_json::from_slice(bytes)?;
        if report.version > REPORT_SCHEMA_VERSION {
            return Err(BundleError::UnsupportedVersion {
                version: report.version,
                supported: REPORT_SCHEMA_VERSION,
            });
        }
        Ok(report)
    }
}
