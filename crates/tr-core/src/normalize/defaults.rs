//! Default-value stripping.
//!
//! Fields equal to their documented default are removed, and so are empty
//! arrays and maps. The result reads back identically through the accessor
//! methods on [`RunAttempt`] and friends.

use tr_common::{Report, RunAttempt, Suite, Test, TestStatus, TestStep};

fn none_if_empty<T>(field: &mut Option<Vec<T>>) {
    if field.as_ref().is_some_and(Vec::is_empty) {
        *field = None;
    }
}

fn strip_steps(steps: &mut Option<Vec<TestStep>>) {
    if let Some(list) = steps.as_mut() {
        for step in list.iter_mut() {
            if step.duration == Some(0) {
                step.duration = None;
            }
            strip_steps(&mut step.steps);
        }
    }
    none_if_empty(steps);
}

fn strip_attempt(attempt: &mut RunAttempt) {
    if attempt.status == Some(TestStatus::Passed) {
        attempt.status = None;
    }
    if attempt.expected_status == Some(TestStatus::Passed) {
        attempt.expected_status = None;
    }
    if attempt.environment_idx == Some(0) {
        attempt.environment_idx = None;
    }
    if attempt.duration == Some(0) {
        attempt.duration = None;
    }
    none_if_empty(&mut attempt.stdout);
    none_if_empty(&mut attempt.stderr);
    none_if_empty(&mut attempt.annotations);
    none_if_empty(&mut attempt.errors);
    none_if_empty(&mut attempt.attachments);
    strip_steps(&mut attempt.steps);
}

fn strip_test(test: &mut Test) {
    none_if_empty(&mut test.tags);
    test.attempts.iter_mut().for_each(strip_attempt);
}

fn strip_suite(suite: &mut Suite) {
    if let Some(children) = suite.suites.as_mut() {
        children.iter_mut().for_each(strip_suite);
    }
    if let Some(tests) = suite.tests.as_mut() {
        tests.iter_mut().for_each(strip_test);
    }
    none_if_empty(&mut suite.suites);
    none_if_empty(&mut suite.tests);
}

/// Remove default-valued and empty fields throughout the report, in place.
pub fn strip_defaults(report: &mut Report) {
    for env in report.environments.iter_mut() {
        if env.user_supplied_data.as_ref().is_some_and(|m| m.is_empty()) {
            env.user_supplied_data = None;
        }
    }
    if let Some(suites) = report.suites.as_mut() {
        suites.iter_mut().for_each(strip_suite);
    }
    if let Some(tests) = report.tests.as_mut() {
        tests.iter_mut().for_each(strip_test);
    }
    none_if_empty(&mut report.suites);
    none_if_empty(&mut report.tests);
    none_if_empty(&mut report.unattributed_errors);
    none_if_empty(&mut report.related_commit_ids);
}
