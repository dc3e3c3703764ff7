//! Property-based tests for report normalization invariants.
//!
//! - normalizing twice equals normalizing once
//! - every attempt's environment index is in bounds afterwards
//! - every output environment is referenced by some attempt
//! - no attempt is lost or invented

use proptest::prelude::*;
use tr_common::{Environment, Location, Report, RunAttempt, Suite, SuiteType, Test, TestStatus};
use tr_core::normalize;

fn status() -> impl Strategy<Value = TestStatus> {
    prop_oneof![
        Just(TestStatus::Passed),
        Just(TestStatus::Failed),
        Just(TestStatus::TimedOut),
        Just(TestStatus::Skipped),
        Just(TestStatus::Interrupted),
    ]
}

/// Tests drawn from a small title/file pool so duplicates are common.
fn test_strategy(env_count: usize) -> impl Strategy<Value = Test> {
    (
        0..3usize,
        0..2usize,
        proptest::collection::vec((0..env_count, status(), 0..50u64), 0..4),
        proptest::collection::vec(0..4usize, 0..3),
    )
        .prop_map(|(title, file, attempts, tags)| {
            let mut test = Test::new(format!("test-{title}"))
                .with_location(Location::new(format!("spec-{file}.ts"), 1, 1));
            for tag in tags {
                test = test.with_tag(format!("@tag{tag}"));
            }
            for (env, status, duration) in attempts {
                let mut attempt = RunAttempt::new(env, status);
                attempt.duration = Some(duration);
                test = test.with_attempt(attempt);
            }
            test
        })
}

fn suite_strategy(env_count: usize) -> impl Strategy<Value = Suite> {
    (
        0..2usize,
        proptest::collection::vec(test_strategy(env_count), 0..4),
        proptest::collection::vec((0..2usize, proptest::collection::vec(test_strategy(env_count), 0..3)), 0..2),
    )
        .prop_map(|(title, tests, children)| {
            let mut suite = Suite::new(SuiteType::File, format!("suite-{title}"))
                .with_location(Location::new(format!("spec-{title}.ts"), 0, 0));
            for (child_title, child_tests) in children {
                let mut child = Suite::new(SuiteType::Describe, format!("group-{child_title}"));
                for test in child_tests {
                    child = child.with_test(test);
                }
                suite = suite.with_suite(child);
            }
            for test in tests {
                suite = suite.with_test(test);
            }
            suite
        })
}

fn report_strategy() -> impl Strategy<Value = Report> {
    (1..4usize).prop_flat_map(|env_count| {
        (
            proptest::collection::vec(0..3usize, env_count),
            proptest::collection::vec(test_strategy(env_count), 0..4),
            proptest::collection::vec(suite_strategy(env_count), 0..3),
        )
            .prop_map(|(env_names, tests, suites)| {
                let mut report = Report::new("playwright", "c0ffee");
                for name in env_names {
                    report = report.with_environment(Environment::new(format!("env-{name}")));
                }
                for test in tests {
                    report = report.with_test(test);
                }
                for suite in suites {
                    report = report.with_suite(suite);
                }
                report
            })
    })
}

fn attempt_count(report: &Report) -> usize {
    let mut count = 0;
    report.for_each_test(|test| count += test.attempts.len());
    count
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_idempotent(report in report_strategy()) {
        let once = normalize(&report).unwrap();
        let twice = normalize(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_references_valid(report in report_strategy()) {
        let out = normalize(&report).unwrap();
        let len = out.environments.len();
        let mut used = vec![false; len];
        out.for_each_test(|test| {
            for attempt in &test.attempts {
                assert!(attempt.environment_idx() < len);
                used[attempt.environment_idx()] = true;
            }
        });
        prop_assert!(used.iter().all(|u| *u), "unused environment survived");
    }

    #[test]
    fn prop_attempts_preserved(report in report_strategy()) {
        let out = normalize(&report).unwrap();
        prop_assert_eq!(attempt_count(&out), attempt_count(&report));
    }

    #[test]
    fn prop_environment_names_preserved(report in report_strategy()) {
        let out = normalize(&report).unwrap();
        let name_of = |r: &Report, idx: usize| r.environments[idx].name.clone();

        let mut before = Vec::new();
        report.for_each_test(|t| {
            for a in &t.attempts {
                before.push(name_of(&report, a.environment_idx()));
            }
        });
        let mut after = Vec::new();
        out.for_each_test(|t| {
            for a in &t.attempts {
                after.push(name_of(&out, a.environment_idx()));
            }
        });
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }
}

#[test]
fn test_unused_environment_dropped() {
    let report = Report::new("pytest", "abc")
        .with_environment(Environment::new("unused"))
        .with_environment(Environment::new("linux"))
        .with_test(Test::new("t").with_attempt(RunAttempt::new(1, TestStatus::Passed)));

    let out = normalize(&report).unwrap();
    assert_eq!(out.environments.len(), 1);
    assert_eq!(out.environments[0].name, "linux");
    // Index 0 is the default and is stripped.
    assert_eq!(out.top_tests()[0].attempts[0].environment_idx, None);
}

#[test]
fn test_tags_union_first_seen_order() {
    let report = Report::new("playwright", "abc")
        .with_environment(Environment::new("chromium"))
        .with_test(Test::new("t").with_tag("@smoke").with_tag("@auth").with_attempt(RunAttempt::new(0, TestStatus::Passed)))
        .with_test(Test::new("t").with_tag("@auth").with_tag("@slow").with_attempt(RunAttempt::new(0, TestStatus::Failed)));

    let out = normalize(&report).unwrap();
    let test = &out.top_tests()[0];
    assert_eq!(
        test.tags.as_deref().unwrap(),
        ["@smoke".to_string(), "@auth".to_string(), "@slow".to_string()]
    );
    assert_eq!(test.attempts.len(), 2);
    assert_eq!(test.attempts[1].status(), TestStatus::Failed);
}

#[test]
fn test_repeated_suites_merge_recursively() {
    let shard = |env: usize, title: &str| {
        Suite::new(SuiteType::File, "login.spec.ts")
            .with_location(Location::new("login.spec.ts", 0, 0))
            .with_suite(
                Suite::new(SuiteType::Describe, "login")
                    .with_test(
                        Test::new(title)
                            .with_location(Location::new("login.spec.ts", 4, 3))
                            .with_attempt(RunAttempt::new(env, TestStatus::Passed)),
                    ),
            )
    };
    let report = Report::new("playwright", "abc")
        .with_environment(Environment::new("chromium"))
        .with_environment(Environment::new("webkit"))
        .with_suite(shard(0, "works"))
        .with_suite(shard(1, "works"))
        .with_suite(shard(1, "rejects bad password"));

    let out = normalize(&report).unwrap();
    assert_eq!(out.top_suites().len(), 1);
    let describe = &out.top_suites()[0].child_suites()[0];
    assert_eq!(out.top_suites()[0].child_suites().len(), 1);
    assert_eq!(describe.child_tests().len(), 2);
    assert_eq!(describe.child_tests()[0].attempts.len(), 2);
    assert_eq!(out.environments.len(), 2);
}

#[test]
fn test_environment_identity_ignores_key_order() {
    let a = Environment::new("ci").with_user_data("browser", "chromium").with_user_data("shard", 1);
    let b = Environment::new("ci").with_user_data("shard", 1).with_user_data("browser", "chromium");

    let report = Report::new("playwright", "abc")
        .with_environment(a)
        .with_environment(b)
        .with_test(
            Test::new("t")
                .with_attempt(RunAttempt::new(0, TestStatus::Passed))
                .with_attempt(RunAttempt::new(1, TestStatus::Passed)),
        );

    let out = normalize(&report).unwrap();
    assert_eq!(out.environments.len(), 1);
}

#[test]
fn test_input_not_mutated() {
    let report = Report::new("pytest", "abc")
        .with_environment(Environment::new("linux"))
        .with_test(Test::new("t").with_attempt(RunAttempt::new(0, TestStatus::Passed)));
    let before = report.clone();
    let _ = normalize(&report).unwrap();
    assert_eq!(report, before);
}
