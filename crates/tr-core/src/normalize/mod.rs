//! Report normalization.
//!
//! Reporters emit the same logical suite or test several times: once per
//! project, shard, retry or browser. [`normalize`] folds those occurrences
//! into one node per identity, keeps only the environments that attempts
//! actually reference and rewrites every `environmentIdx` to match.
//!
//! # Identities
//!
//! | Entity      | Identity                                         |
//! |-------------|--------------------------------------------------|
//! | Environment | content hash of the full value (order-insensitive) |
//! | Suite       | `(parentSuiteId or no-suite, file, title)`       |
//! | Test        | `(suiteId or no-suite, file, title)`             |
//!
//! # Pipeline
//!
//! 1. Hash every environment; the first value wins for a repeated identity.
//! 2. Walk the tree depth-first into arena buckets keyed by identity,
//!    resolving each attempt's environment index to an identity.
//! 3. Re-emit one node per bucket, assigning new environment indices in
//!    first-use order of the merged tree.
//! 4. Strip default-valued fields ([`strip_defaults`]).
//!
//! The output is structurally independent of the input and normalizing it a
//! second time is a no-op.
//!
//! Environment order follows the merged output tree, not the input walk. For
//! input suites `S1, S2, S1` an environment first used by the second `S1` is
//! numbered before one used by `S2`, because that attempt is emitted under the
//! merged `S1`. Numbering by the input walk would renumber environments on a
//! second pass.

mod defaults;

pub use defaults::strip_defaults;

use std::collections::HashMap;
use thiserror::Error;
use tr_common::{Environment, Location, Report, RunAttempt, Suite, SuiteType, Test};
use tr_identity::{content_id, content_id_of_parts, ContentId, IdentityError};
use tracing::debug;

/// Errors raised while normalizing a report.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("test '{test}' references environment {index}, but the report has {len}")]
    EnvironmentIndexOutOfBounds {
        index: usize,
        len: usize,
        test: String,
    },

    #[error("cannot compute environment identity: {0}")]
    Identity(#[from] IdentityError),
}

impl From<NormalizeError> for tr_common::Error {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::EnvironmentIndexOutOfBounds { index, len, .. } => {
                tr_common::Error::EnvironmentIndexOutOfBounds { index, len }
            }
            NormalizeError::Identity(e) => tr_common::Error::InvalidReport(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// An attempt whose environment index points outside `Report::environments`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReferenceIssue {
    pub test: String,
    pub file: String,
    pub attempt: usize,
    pub index: usize,
    pub len: usize,
}

/// List every dangling environment reference without normalizing.
pub fn check_references(report: &Report) -> Vec<ReferenceIssue> {
    let len = report.environments.len();
    let mut issues = Vec::new();
    report.for_each_test(|test| {
        for (attempt_idx, attempt) in test.attempts.iter().enumerate() {
            let index = attempt.environment_idx();
            if index >= len {
                issues.push(ReferenceIssue {
                    test: test.title.clone(),
                    file: test.file().to_string(),
                    attempt: attempt_idx,
                    index,
                    len,
                });
            }
        }
    });
    issues
}

struct SuiteSlot {
    kind: SuiteType,
    title: String,
    location: Option<Location>,
    suites: Vec<usize>,
    tests: Vec<usize>,
}

struct TestSlot {
    title: String,
    location: Option<Location>,
    tags: Vec<String>,
    attempts: Vec<(RunAttempt, ContentId)>,
}

/// Traversal state for one normalization run.
struct Context<'a> {
    /// Input environment index -> identity.
    env_ids: Vec<ContentId>,
    /// Identity -> first environment value with that identity.
    env_by_id: HashMap<ContentId, &'a Environment>,

    suites: Vec<SuiteSlot>,
    suite_slots: HashMap<ContentId, usize>,
    tests: Vec<TestSlot>,
    test_slots: HashMap<ContentId, usize>,
    top_suites: Vec<usize>,
    top_tests: Vec<usize>,

    /// Identity -> output index, filled during emission.
    env_out: HashMap<ContentId, usize>,
    environments: Vec<Environment>,
}

impl<'a> Context<'a> {
    fn new(report: &'a Report) -> Result<Self> {
        let mut env_ids = Vec::with_capacity(report.environments.len());
        let mut env_by_id = HashMap::new();
        for env in &report.environments {
            let id = content_id(env)?;
            env_by_id.entry(id.clone()).or_insert(env);
            env_ids.push(id);
        }

        Ok(Self {
            env_ids,
            env_by_id,
            suites: Vec::new(),
            suite_slots: HashMap::new(),
            tests: Vec::new(),
            test_slots: HashMap::new(),
            top_suites: Vec::new(),
            top_tests: Vec::new(),
            env_out: HashMap::new(),
            environments: Vec::new(),
        })
    }

    /// Bucket a suite and its subtree. Returns the slot and whether it is new.
    fn visit_suite(&mut self, parent: &ContentId, suite: &Suite) -> Result<(usize, bool)> {
        let id = content_id_of_parts(&[parent.as_str(), suite.file(), &suite.title]);
        let (slot, created) = match self.suite_slots.get(&id) {
            Some(&slot) => (slot, false),
            None => {
                self.suites.push(SuiteSlot {
                    kind: suite.kind,
                    title: suite.title.clone(),
                    location: suite.location.clone(),
                    suites: Vec::new(),
                    tests: Vec::new(),
                });
                let slot = self.suites.len() - 1;
                self.suite_slots.insert(id.clone(), slot);
                (slot, true)
            }
        };

        for child in suite.child_suites() {
            let (child_slot, child_created) = self.visit_suite(&id, child)?;
            if child_created {
                self.suites[slot].suites.push(child_slot);
            }
        }
        for test in suite.child_tests() {
            let (test_slot, test_created) = self.visit_test(&id, test)?;
            if test_created {
                self.suites[slot].tests.push(test_slot);
            }
        }

        Ok((slot, created))
    }

    fn visit_test(&mut self, parent: &ContentId, test: &Test) -> Result<(usize, bool)> {
        let id = content_id_of_parts(&[parent.as_str(), test.file(), &test.title]);
        let (slot, created) = match self.test_slots.get(&id) {
            Some(&slot) => (slot, false),
            None => {
                self.tests.push(TestSlot {
                    title: test.title.clone(),
                    location: test.location.clone(),
                    tags: Vec::new(),
                    attempts: Vec::new(),
                });
                let slot = self.tests.len() - 1;
                self.test_slots.insert(id, slot);
                (slot, true)
            }
        };

        for tag in test.tags.iter().flatten() {
            if !self.tests[slot].tags.contains(tag) {
                self.tests[slot].tags.push(tag.clone());
            }
        }

        for attempt in &test.attempts {
            let index = attempt.environment_idx();
            let env_id = self.env_ids.get(index).cloned().ok_or_else(|| {
                NormalizeError::EnvironmentIndexOutOfBounds {
                    index,
                    len: self.env_ids.len(),
                    test: test.title.clone(),
                }
            })?;
            self.tests[slot].attempts.push((attempt.clone(), env_id));
        }

        Ok((slot, created))
    }

    fn env_index(&mut self, id: &ContentId) -> usize {
        if let Some(&idx) = self.env_out.get(id) {
            return idx;
        }
        let idx = self.environments.len();
        if let Some(env) = self.env_by_id.get(id) {
            self.environments.push((*env).clone());
        }
        self.env_out.insert(id.clone(), idx);
        idx
    }

    fn emit_test(&mut self, slot: usize) -> Test {
        let attempts = std::mem::take(&mut self.tests[slot].attempts);
        let attempts = attempts
            .into_iter()
            .map(|(mut attempt, env_id)| {
                attempt.environment_idx = Some(self.env_index(&env_id));
                attempt
            })
            .collect();

        let test = &mut self.tests[slot];
        Test {
            title: std::mem::take(&mut test.title),
            location: test.location.take(),
            tags: Some(std::mem::take(&mut test.tags)),
            attempts,
        }
    }

    fn emit_suite(&mut self, slot: usize) -> Suite {
        let child_suites = std::mem::take(&mut self.suites[slot].suites);
        let child_tests = std::mem::take(&mut self.suites[slot].tests);

        let suites = child_suites
            .into_iter()
            .map(|child| self.emit_suite(child))
            .collect();
        let tests = child_tests
            .into_iter()
            .map(|child| self.emit_test(child))
            .collect();

        let suite = &mut self.suites[slot];
        Suite {
            kind: suite.kind,
            title: std::mem::take(&mut suite.title),
            location: suite.location.take(),
            suites: Some(suites),
            tests: Some(tests),
        }
    }
}

/// Merge duplicate suites, tests and environments and strip defaults.
///
/// Returns [`NormalizeError::EnvironmentIndexOutOfBounds`] when an attempt
/// references an environment that does not exist; nothing is coerced.
pub fn normalize(report: &Report) -> Result<Report> {
    let mut ctx = Context::new(report)?;
    let no_suite = ContentId::no_suite();

    for test in report.top_tests() {
        let (slot, created) = ctx.visit_test(&no_suite, test)?;
        if created {
            ctx.top_tests.push(slot);
        }
    }
    for suite in report.top_suites() {
        let (slot, created) = ctx.visit_suite(&no_suite, suite)?;
        if created {
            ctx.top_suites.push(slot);
        }
    }

    let top_tests: Vec<Test> = std::mem::take(&mut ctx.top_tests)
        .into_iter()
        .map(|slot| ctx.emit_test(slot))
        .collect();
    let top_suites: Vec<Suite> = std::mem::take(&mut ctx.top_suites)
        .into_iter()
        .map(|slot| ctx.emit_suite(slot))
        .collect();

    debug!(
        environments_in = report.environments.len(),
        environments_out = ctx.environments.len(),
        tests_in = report.test_count(),
        tests_out = ctx.tests.len(),
        suites_out = ctx.suites.len(),
        "Report normalized"
    );

    let mut out = Report {
        category: report.category.clone(),
        version: report.version,
        commit_id: report.commit_id.clone(),
        related_commit_ids: report.related_commit_ids.clone(),
        config_path: report.config_path.clone(),
        url: report.url.clone(),
        environments: ctx.environments,
        suites: Some(top_suites),
        tests: Some(top_tests),
        unattributed_errors: report.unattributed_errors.clone(),
        start_timestamp: report.start_timestamp,
        duration: report.duration,
        cpu_count: report.cpu_count,
        cpu_avg: report.cpu_avg.clone(),
        cpu_max: report.cpu_max.clone(),
        ram: report.ram.clone(),
        ram_bytes: report.ram_bytes,
    };
    strip_defaults(&mut out);
    Ok(out)
}
