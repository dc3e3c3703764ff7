//! Report directory writer.
//!
//! Writes `report.json` and one `attachments/<id>` file per attachment.

use crate::attachment::Attachment;
use crate::{Result, ATTACHMENTS_DIR, REPORT_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use tr_common::{AttachmentId, Report};
use tracing::{debug, info, warn};

/// Outcome of writing a report directory.
#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    /// Path of the written `report.json`.
    pub report_path: PathBuf,
    /// Attachments newly written to disk.
    pub attachments_written: usize,
    /// Attachments already present (same content id).
    pub attachments_reused: usize,
    /// File-backed attachments whose source file no longer exists.
    pub missing: Vec<AttachmentId>,
}

/// Writer for a report directory.
pub struct ReportWriter {
    dir: PathBuf,
    pretty: bool,
}

impl ReportWriter {
    /// Create a writer targeting `dir`. The directory is created on write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pretty: false,
        }
    }

    /// Pretty-print `report.json`.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the report and its attachments.
    ///
    /// `report.json` is replaced atomically. Attachments are content-addressed,
    /// so an existing `attachments/<id>` is left untouched. A file-backed
    /// attachment whose source is gone is recorded in
    /// [`WriteSummary::missing`] rather than failing the whole write.
    pub fn write(&self, report: &Report, attachments: &[Attachment]) -> Result<WriteSummary> {
        fs::create_dir_all(&self.dir)?;
        let report_path = self.write_report_json(report)?;

        let mut summary = WriteSummary {
            report_path,
            ..Default::default()
        };

        if !attachments.is_empty() {
            let attachments_dir = self.dir.join(ATTACHMENTS_DIR);
            fs::create_dir_all(&attachments_dir)?;

            for attachment in attachments {
                let target = attachments_dir.join(attachment.id().as_str());
                if target.exists() {
                    summary.attachments_reused += 1;
                    continue;
                }
                match attachment {
                    Attachment::File { id, path, .. } => {
                        if !path.exists() {
                            warn!(id = %id, path = %path.display(), "Attachment source missing");
                            summary.missing.push(id.clone());
                            continue;
                        }
                        fs::copy(path, &target)?;
                    }
                    Attachment::Buffer { body, .. } => {
                        fs::write(&target, body)?;
                    }
                }
                debug!(id = %attachment.id(), "Wrote attachment");
                summary.attachments_written += 1;
            }
        }

        info!(
            dir = %self.dir.display(),
            written = summary.attachments_written,
            reused = summary.attachments_reused,
            missing = summary.missing.len(),
            "Report written"
        );
        Ok(summary)
    }

    fn write_report_json(&self, report: &Report) -> Result<PathBuf> {
        let json = if self.pretty {
            serde_json::to_vec_pretty(report)?
        } else {
            serde_json::to_vec(report)?
        };

        let final_path = self.dir.join(REPORT_FILE);
        let temp_path = self.dir.join(format!("{}.tmp", REPORT_FILE));
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &final_path)?;

        debug!(path = %final_path.display(), bytes = json.len(), "Wrote report.json");
        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_report_only() {
        let tmp = TempDir::new().unwrap();
        let summary = ReportWriter::new(tmp.path())
            .write(&Report::new("pytest", "abc"), &[])
            .unwrap();

        assert!(summary.report_path.exists());
        assert!(!tmp.path().join(ATTACHMENTS_DIR).exists());
        assert!(!tmp.path().join("report.json.tmp").exists());
    }

    #[test]
    fn test_duplicate_attachment_written_once() {
        let tmp = TempDir::new().unwrap();
        let a = Attachment::from_buffer(b"same".to_vec(), "text/plain");
        let b = Attachment::from_buffer(b"same".to_vec(), "text/plain");

        let summary = ReportWriter::new(tmp.path())
            .write(&Report::new("pytest", "abc"), &[a, b])
            .unwrap();

        assert_eq!(summary.attachments_written, 1);
        assert_eq!(summary.attachments_reused, 1);
    }

    #[test]
    fn test_missing_source_recorded() {
        let tmp = TempDir::new().unwrap();
        let id = crate::attachment::hash_bytes(b"gone");
        let ghost = Attachment::from_known_file(id.clone(), tmp.path().join("gone.bin"), "image/png");

        let summary = ReportWriter::new(tmp.path().join("out"))
            .write(&Report::new("pytest", "abc"), &[ghost])
            .unwrap();

        assert_eq!(summary.missing, vec![id]);
        assert_eq!(summary.attachments_written, 0);
    }
}
