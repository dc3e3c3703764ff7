//! Report data model.
//!
//! A [`Report`] describes one CI test run: a forest of [`Suite`]s and/or a flat
//! list of top-level [`Test`]s, the [`Environment`]s those tests ran in, and
//! optional machine telemetry. Attempts reference environments by position in
//! [`Report::environments`]; that index is the one cross-reference the
//! normalizer must keep valid.
//!
//! Every optional field is omitted from JSON when absent. Several fields have
//! documented defaults that readers must apply when the field is missing:
//!
//! | Field                        | Default  |
//! |------------------------------|----------|
//! | `RunAttempt.environmentIdx`  | `0`      |
//! | `RunAttempt.status`          | `passed` |
//! | `RunAttempt.expectedStatus`  | `passed` |
//! | `RunAttempt.duration`        | `0`      |
//! | `TestStep.duration`          | `0`      |

use crate::id::AttachmentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current report schema version.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Source location of a suite, test, step or error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// Outcome of a single test attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    #[default]
    Passed,
    Failed,
    TimedOut,
    Skipped,
    Interrupted,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::TimedOut => write!(f, "timedOut"),
            TestStatus::Skipped => write!(f, "skipped"),
            TestStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Kind of grouping a suite represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuiteType {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "describe")]
    Describe,
    #[serde(rename = "anonymous suite")]
    Anonymous,
}

/// Platform facts about the machine an environment ran on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_arch: Option<String>,
}

/// A named execution context referenced by index from attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_data: Option<SystemData>,
    /// Free-form metadata supplied by the user (browser, shard, project...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_supplied_data: Option<BTreeMap<String, serde_json::Value>>,
    /// Data that is stored but never interpreted by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque_data: Option<serde_json::Value>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_data: None,
            user_supplied_data: None,
            opaque_data: None,
        }
    }

    pub fn with_system_data(mut self, data: SystemData) -> Self {
        self.system_data = Some(data);
        self
    }

    /// Add one user-supplied key/value pair.
    pub fn with_user_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.user_supplied_data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Reference from an attempt to a content-addressed attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub name: String,
    pub content_type: String,
    pub id: AttachmentId,
}

/// An error raised by a test, step or the runner itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Stringified non-Error value that was thrown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// One chunk of captured stdout/stderr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StdioEntry {
    Text {
        text: String,
        /// Milliseconds since the previous entry.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dts: Option<u64>,
    },
    /// Base64-encoded binary output.
    Buffer {
        buffer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dts: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<TestStep>>,
}

/// One execution of a test in one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAttempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<TestStatus>,
    #[serde(default)]
    pub start_timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<Vec<StdioEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<Vec<StdioEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ReportError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<TestStep>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentRef>>,
}

impl RunAttempt {
    /// Create an attempt in the given environment.
    pub fn new(environment_idx: usize, status: TestStatus) -> Self {
        Self {
            environment_idx: Some(environment_idx),
            status: Some(status),
            ..Default::default()
        }
    }

    /// Environment index with the documented default applied.
    pub fn environment_idx(&self) -> usize {
        self.environment_idx.unwrap_or(0)
    }

    pub fn status(&self) -> TestStatus {
        self.status.unwrap_or_default()
    }

    pub fn expected_status(&self) -> TestStatus {
        self.expected_status.unwrap_or_default()
    }

    pub fn duration(&self) -> u64 {
        self.duration.unwrap_or(0)
    }

    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachments.get_or_insert_with(Vec::new).push(attachment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub attempts: Vec<RunAttempt>,
}

impl Test {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            location: None,
            tags: None,
            attempts: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    pub fn with_attempt(mut self, attempt: RunAttempt) -> Self {
        self.attempts.push(attempt);
        self
    }

    /// File component used for identity; empty when the test has no location.
    pub fn file(&self) -> &str {
        self.location.as_ref().map_or("", |l| l.file.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    #[serde(rename = "type")]
    pub kind: SuiteType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suites: Option<Vec<Suite>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<Test>>,
}

impl Suite {
    pub fn new(kind: SuiteType, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            location: None,
            suites: None,
            tests: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_suite(mut self, suite: Suite) -> Self {
        self.suites.get_or_insert_with(Vec::new).push(suite);
        self
    }

    pub fn with_test(mut self, test: Test) -> Self {
        self.tests.get_or_insert_with(Vec::new).push(test);
        self
    }

    pub fn file(&self) -> &str {
        self.location.as_ref().map_or("", |l| l.file.as_str())
    }

    pub fn child_suites(&self) -> &[Suite] {
        self.suites.as_deref().unwrap_or_default()
    }

    pub fn child_tests(&self) -> &[Test] {
        self.tests.as_deref().unwrap_or_default()
    }
}

/// Transport form of a telemetry point: `[timeDelta, value]`.
///
/// See `tr_telemetry::TelemetrySeries::to_transport_form` for the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportPoint(pub u64, pub f64);

/// Root of a test-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Producer of the report (e.g. `playwright`, `pytest`, `junit`).
    pub category: String,
    pub version: u32,
    pub commit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_commit_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    /// Link to the CI run that produced this report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suites: Option<Vec<Suite>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<Test>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unattributed_errors: Option<Vec<ReportError>>,
    #[serde(default)]
    pub start_timestamp: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_avg: Option<Vec<TransportPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_max: Option<Vec<TransportPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<Vec<TransportPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_bytes: Option<u64>,
}

impl Report {
    pub fn new(category: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            version: REPORT_SCHEMA_VERSION,
            commit_id: commit_id.into(),
            related_commit_ids: None,
            config_path: None,
            url: None,
            environments: Vec::new(),
            suites: None,
            tests: None,
            unattributed_errors: None,
            start_timestamp: 0,
            duration: 0,
            cpu_count: None,
            cpu_avg: None,
            cpu_max: None,
            ram: None,
            ram_bytes: None,
        }
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.environments.push(env);
        self
    }

    pub fn with_suite(mut self, suite: Suite) -> Self {
        self.suites.get_or_insert_with(Vec::new).push(suite);
        self
    }

    pub fn with_test(mut self, test: Test) -> Self {
        self.tests.get_or_insert_with(Vec::new).push(test);
        self
    }

    pub fn top_suites(&self) -> &[Suite] {
        self.suites.as_deref().unwrap_or_default()
    }

    pub fn top_tests(&self) -> &[Test] {
        self.tests.as_deref().unwrap_or_default()
    }

    /// Visit every test in depth-first order, top-level tests first.
    pub fn for_each_test<'a>(&'a self, mut f: impl FnMut(&'a Test)) {
        fn walk<'a>(suite: &'a Suite, f: &mut impl FnMut(&'a Test)) {
            for child in suite.child_suites() {
                walk(child, f);
            }
            for test in suite.child_tests() {
                f(test);
            }
        }
        for test in self.top_tests() {
            f(test);
        }
        for suite in self.top_suites() {
            walk(suite, &mut f);
        }
    }

    /// All attachment references in the report, in traversal order.
    pub fn attachment_refs(&self) -> Vec<&AttachmentRef> {
        let mut refs = Vec::new();
        self.for_each_test(|test| {
            for attempt in &test.attempts {
                refs.extend(attempt.attachments.iter().flatten());
            }
        });
        refs
    }

    /// Total number of tests in the tree, counting duplicates.
    pub fn test_count(&self) -> usize {
        let mut count = 0;
        self.for_each_test(|_| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_defaults_applied() {
        let attempt: RunAttempt = serde_json::from_str(r#"{"startTimestamp": 5}"#).unwrap();
        assert_eq!(attempt.environment_idx(), 0);
        assert_eq!(attempt.status(), TestStatus::Passed);
        assert_eq!(attempt.expected_status(), TestStatus::Passed);
        assert_eq!(attempt.duration(), 0);
    }

    #[test]
    fn test_absent_fields_not_serialized() {
        let attempt = RunAttempt::default();
        let json = serde_json::to_string(&attempt).unwrap();
        assert_eq!(json, r#"{"startTimestamp":0}"#);
    }

    #[test]
    fn test_suite_type_wire_names() {
        let suite = Suite::new(SuiteType::Anonymous, "");
        let json = serde_json::to_value(&suite).unwrap();
        assert_eq!(json["type"], "anonymous suite");
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&TestStatus::TimedOut).unwrap();
        assert_eq!(json, r#""timedOut""#);
    }

    #[test]
    fn test_stdio_entry_untagged() {
        let entries: Vec<StdioEntry> =
            serde_json::from_str(r#"[{"text":"hi"},{"buffer":"aGk=","dts":3}]"#).unwrap();
        assert!(matches!(entries[0], StdioEntry::Text { .. }));
        assert!(matches!(entries[1], StdioEntry::Buffer { dts: Some(3), .. }));
    }

    #[test]
    fn test_transport_point_is_pair() {
        let json = serde_json::to_string(&TransportPoint(1000, 12.5)).unwrap();
        assert_eq!(json, "[1000,12.5]");
    }

    #[test]
    fn test_traversal_order_and_refs() {
        let id = AttachmentId::parse("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        let attachment = AttachmentRef {
            name: "trace".into(),
            content_type: "application/zip".into(),
            id,
        };
        let report = Report::new("pytest", "abc")
            .with_test(Test::new("top"))
            .with_suite(
                Suite::new(SuiteType::File, "a.py").with_test(
                    Test::new("inner")
                        .with_attempt(RunAttempt::new(0, TestStatus::Failed).with_attachment(attachment)),
                ),
            );

        let mut titles = Vec::new();
        report.for_each_test(|t| titles.push(t.title.clone()));
        assert_eq!(titles, vec!["top", "inner"]);
        assert_eq!(report.attachment_refs().len(), 1);
        assert_eq!(report.test_count(), 2);
    }
}
