//! Meta-tests: run small test bodies under a recording reporter and check the
//! verdict the harness reaches.

mod common;

use common::meta_test;
use microtest::{Failure, Outcome, TestTools};
use std::io;

struct MetaCase {
    name: &'static str,
    early: bool,
    failed: bool,
    body: fn(&TestTools) -> Outcome,
}

const BATCH: &[MetaCase] = &[
    MetaCase {
        name: "empty",
        early: false,
        failed: false,
        body: |_| Ok(()),
    },
    MetaCase {
        name: "error",
        early: true,
        failed: true,
        body: |t| Err(t.error(Failure::new("some error"))),
    },
    MetaCase {
        name: "assert-ok",
        early: false,
        failed: false,
        body: |t| t.assert(true, "some message"),
    },
    MetaCase {
        name: "assert-fail",
        early: true,
        failed: true,
        body: |t| t.assert(false, "some message"),
    },
    MetaCase {
        name: "ok-ok",
        early: false,
        failed: false,
        body: |t| t.ok(Ok::<_, io::Error>(())),
    },
    MetaCase {
        name: "ok-fail",
        early: true,
        failed: true,
        body: |t| t.ok(Err::<(), _>(io::Error::new(io::ErrorKind::Other, "an error!"))),
    },
    MetaCase {
        name: "equals-ok",
        early: false,
        failed: false,
        body: |t| t.equals("hello", "hello"),
    },
    MetaCase {
        name: "equals-fail",
        early: true,
        failed: true,
        body: |t| t.equals("hello", "world"),
    },
    MetaCase {
        name: "must-fail-ok",
        early: false,
        failed: false,
        body: |t| t.must_fail(Err::<(), _>("an error"), "should have failed").map(drop),
    },
    MetaCase {
        name: "must-fail-fail",
        early: true,
        failed: true,
        body: |t| t.must_fail(Ok::<_, &str>(()), "should have failed").map(drop),
    },
    MetaCase {
        name: "must-fail-with-ok",
        early: false,
        failed: false,
        body: |t| t.must_fail_with(Err::<(), _>("an error"), "an error"),
    },
    MetaCase {
        name: "must-fail-with-no-error",
        early: true,
        failed: true,
        body: |t| t.must_fail_with(Ok::<(), _>(()), "an error"),
    },
    MetaCase {
        name: "must-fail-with-other-error",
        early: true,
        failed: true,
        body: |t| t.must_fail_with(Err::<(), _>("some other error"), "an error"),
    },
    MetaCase {
        name: "json-equals-ok",
        early: false,
        failed: false,
        body: |t| t.json_equals(br#"{"a":6,"b":5}"#, br#"{"b":5,"a":6}"#),
    },
    MetaCase {
        name: "json-equals-fail",
        early: true,
        failed: true,
        body: |t| t.json_equals(br#"{"a":6,"b":5}"#, br#"{"b":5}"#),
    },
    MetaCase {
        name: "fatal",
        early: true,
        failed: true,
        body: |t| Err(t.fatal("cannot continue")),
    },
];

#[test]
fn batch_verdicts() {
    for (i, case) in BATCH.iter().enumerate() {
        let run = meta_test(case.name, case.body);
        assert_eq!(run.early, case.early, "#{i} '{}': early", case.name);
        assert_eq!(run.failed(), case.failed, "#{i} '{}': failed", case.name);
        assert_eq!(run.panic, None, "#{i} '{}': unexpected panic", case.name);
        assert_eq!(run.stop.is_some(), case.failed, "#{i} '{}': stop", case.name);
    }
}

#[test]
fn summary_counts_every_queued_failure() {
    let run = meta_test("counted", |t| {
        let _ = t.assert(false, "one");
        let _ = t.equals(1, 2);
        let _ = t.ok(Err::<(), _>("three"));
        Ok(())
    });
    assert!(!run.early);
    assert_eq!(run.stop.as_deref(), Some("3 errors"));
    assert_eq!(run.reporter.stop_messages(), vec!["3 errors"]);
}

#[test]
fn overflow_fails_the_test_immediately() {
    let run = meta_test("overflow", |t| {
        for n in 0..20 {
            let _ = t.assert(false, format!("failure {n}"));
        }
        assert!(!t.reporter().failed(), "twenty failures fit in the queue");
        let _ = t.assert(false, "one too many");
        assert!(t.reporter().failed(), "the twenty-first escalates");
        Ok(())
    });
    assert_eq!(run.stop.as_deref(), Some("20 errors, 1 escalated"));
}

#[test]
fn subtest_label_reaches_the_summary() {
    let run = meta_test("subtests", |t| {
        t.in_subtest("first", |t| t.assert(true, "fine"))?;
        t.in_subtest("second", |t| t.equals(1, 2))
    });
    assert!(run.early);
    assert_eq!(run.stop.as_deref(), Some("1 errors"));
    let logs = run.reporter.logs();
    let summary = logs.last().expect("summary logged");
    assert!(summary.contains("Error: "), "{summary}");
    assert!(summary.contains("Expressions don't match"), "{summary}");
    assert!(summary.contains("Failed subtest: second"), "{summary}");
    assert!(!summary.contains("Failed subtest: first"), "{summary}");
    assert!(summary.ends_with("1 errors"), "{summary}");
}

#[test]
fn passing_test_logs_nothing() {
    let run = meta_test("quiet", |t| t.in_subtest("only", |t| t.assert(true, "fine")));
    assert_eq!(run.stop, None);
    assert!(run.reporter.logs().is_empty());
}

#[test]
fn orchestrator_panic_is_resumed_not_summarised() {
    let run = meta_test("panicking", |t| {
        let _ = t.assert(false, "queued before the panic");
        panic!("orchestrator exploded");
    });
    assert_eq!(run.panic.as_deref(), Some("orchestrator exploded"));
    assert_eq!(run.stop, None);
    assert!(run.reporter.stop_messages().is_empty());
}

#[test]
fn session_terminates_when_dropped() {
    let (session, reporter) = common::session(
        "dropped",
        common::config(std::path::Path::new("testdata"), false),
        std::sync::Arc::new(microtest::golden::MemoryStorage::new()),
    );
    let tools = session.tools().clone();
    let _ = tools.assert(false, "dropped with a failure");
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || drop(session)));
    assert!(result.is_err());
    assert!(reporter.stopped());
    assert_eq!(tools.phase(), microtest::lifecycle::Phase::Done);
}
