/*!
 * Orchestrator behavior under concurrency, capability failures and cancellation
 */

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use ddlport::fakes::{FakeBehavior, FakeJudge, FakeParser, FakeTranslator};
use ddlport::pipeline::{Orchestrator, Router};
use ddlport::translation::ErrorKind;
use ddlport::validation::{Evaluator, FindingKind, PolicyTable, Severity, ValidationMethod};
use ddlport::{CancelToken, RunError, cancellation};

use crate::common;

fn orchestrator_with_policies(translator: FakeTranslator, parser: FakeParser, policies: PolicyTable) -> Orchestrator {
    Orchestrator::new(
        Router::for_known_types(Arc::new(translator)),
        Evaluator::new(Arc::new(parser), policies, common::fast_evaluator_settings()),
        common::fast_orchestrator_settings(),
    )
}

/// A record whose calls time out twice and then fail is reported; its batch mate still lands
#[tokio::test]
async fn test_run_timeoutsThenFailure_shouldKeepBatchMate() {
    let translator = FakeTranslator::new(|record, attempt| match record.name() {
        "V2" if attempt < 2 => FakeBehavior::Timeout,
        "V2" => FakeBehavior::Unavailable,
        name => FakeBehavior::translate(format!("CREATE VIEW {} AS SELECT 1", name)),
    });
    let orchestrator = common::orchestrator_with(translator);

    let result = orchestrator
        .run(vec![common::batch(0, "views", &["V1", "V2"])], &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(result.statements("views"), ["CREATE VIEW V1 AS SELECT 1"]);
    let errors = &result.metadata.total_errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::TransientExhausted);
    assert_eq!(errors[0].artifact_type, "views");
    assert_eq!(errors[0].record.as_ref().map(|record| record.name.as_str()), Some("V2"));
}

/// Skipped types pass every statement with a manual review warning
#[tokio::test]
async fn test_run_skippedPolicy_shouldFlagManualReview() {
    let parser = FakeParser::rejecting_all();
    let orchestrator = orchestrator_with_policies(
        FakeTranslator::translating(),
        parser.clone(),
        PolicyTable::new(ValidationMethod::SyntaxOnly).with_method("procedures", ValidationMethod::Skipped),
    );

    let result = orchestrator
        .run(vec![common::batch(0, "procedures", &["P1", "P2", "P3"])], &CancelToken::never())
        .await
        .unwrap();

    let report = &result.metadata.evaluation_reports[0];
    assert_eq!(report.validation_method, ValidationMethod::Skipped);
    assert_eq!(report.valid_count, 3);
    assert_eq!(report.invalid_count, 0);
    for evaluation in &report.per_statement {
        assert_eq!(evaluation.findings.len(), 1);
        assert_eq!(evaluation.findings[0].kind, FindingKind::Warning);
        assert!(evaluation.findings[0].message.contains("manual review required"));
    }
    assert!(parser.parsed_statements().is_empty());
    assert_eq!(result.metadata.manual_review_types(), vec!["procedures"]);
}

/// A slow first batch still merges before a fast second batch of the same type
#[tokio::test]
async fn test_run_laterBatchFinishingFirst_shouldKeepDispatchOrder() {
    let translator = FakeTranslator::new(|record, _| {
        let statement = format!("CREATE TABLE {} (id INT)", record.name());
        if record.name() == "SLOW_A" {
            FakeBehavior::delayed(60, FakeBehavior::translate(statement))
        } else {
            FakeBehavior::translate(statement)
        }
    });
    let orchestrator = common::orchestrator_with(translator.clone());

    let result = orchestrator
        .run(
            vec![
                common::batch(0, "tables", &["SLOW_A", "SLOW_B"]),
                common::batch(1, "tables", &["FAST_C"]),
            ],
            &CancelToken::never(),
        )
        .await
        .unwrap();

    assert_eq!(translator.call_count(), 2);
    assert_eq!(
        result.statements("tables"),
        [
            "CREATE TABLE SLOW_A (id INT)",
            "CREATE TABLE SLOW_B (id INT)",
            "CREATE TABLE FAST_C (id INT)"
        ]
    );
    let sequences: Vec<u64> = result
        .metadata
        .evaluation_reports
        .iter()
        .map(|report| report.batch_sequence)
        .collect();
    assert_eq!(sequences, vec![0, 1]);
}

/// Statements that fail to parse are never judged and only carry the syntax error
#[tokio::test]
async fn test_run_parseFailure_shouldSkipJudge() {
    let judge = Arc::new(FakeJudge::scoring(95.0, 95.0));
    let translator = FakeTranslator::new(|record, _| match record.name() {
        "BROKEN" => FakeBehavior::translate("CREATE VIEW BROKEN AS SELEC 1"),
        name => FakeBehavior::translate(format!("CREATE VIEW {} AS SELECT 1", name)),
    });
    let orchestrator = Orchestrator::new(
        Router::for_known_types(Arc::new(translator)),
        Evaluator::new(
            Arc::new(FakeParser::rejecting_containing("SELEC ")),
            PolicyTable::new(ValidationMethod::SyntaxAndSemantic),
            common::fast_evaluator_settings(),
        )
        .with_judge(judge.clone()),
        common::fast_orchestrator_settings(),
    );

    let result = orchestrator
        .run(vec![common::batch(0, "views", &["GOOD", "BROKEN"])], &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(judge.judged_statements(), vec!["CREATE VIEW GOOD AS SELECT 1".to_string()]);
    let report = &result.metadata.evaluation_reports[0];
    let broken = &report.per_statement[1];
    assert!(!broken.is_valid);
    assert_eq!(broken.findings.len(), 1);
    assert_eq!(broken.findings[0].kind, FindingKind::SyntaxError);
    assert_eq!(result.metadata.per_type_stats["views"].invalid, 1);
}

/// Every record ends up as exactly one statement or one error
#[tokio::test]
async fn test_run_mixedOutcomes_shouldAccountForEveryRecord() {
    let translator = FakeTranslator::new(|record, _| {
        let name = record.name();
        if name.ends_with("_rejected") {
            FakeBehavior::Reject(format!("{} uses an unsupported feature", name))
        } else if name.ends_with("_broken") {
            FakeBehavior::Broken
        } else {
            FakeBehavior::translate(format!("CREATE SCHEMA {}", name))
        }
    });
    let orchestrator = common::orchestrator_with(translator);
    let batches = vec![
        common::batch(0, "schemas", &["s1", "s2_rejected", "s3"]),
        common::batch(1, "schemas", &["s4_broken"]),
        common::batch(2, "roles", &["r1", "r2_broken"]),
        common::batch(3, "tags", &["t1"]),
    ];
    let all_names: BTreeSet<String> = batches
        .iter()
        .flat_map(|batch| batch.items().iter().map(|record| record.name().to_string()))
        .collect();

    let result = orchestrator.run(batches, &CancelToken::never()).await.unwrap();
    let metadata = &result.metadata;

    assert_eq!(metadata.total_items, all_names.len());
    assert_eq!(metadata.success_count() + metadata.error_count(), metadata.total_items);

    let mut seen: BTreeSet<String> = result
        .by_type
        .values()
        .flatten()
        .map(|statement| statement.trim_start_matches("CREATE SCHEMA ").to_string())
        .collect();
    for error in &metadata.total_errors {
        let name = error.record.as_ref().map(|record| record.name.clone()).unwrap_or_default();
        assert!(seen.insert(name), "record reported twice");
    }
    assert_eq!(seen, all_names);
    assert!(metadata
        .total_errors
        .iter()
        .all(|error| error.kind == ErrorKind::TranslationError));
}

/// Transient failures are retried within the budget
#[tokio::test]
async fn test_run_transientThenSuccess_shouldRetry() {
    let translator = FakeTranslator::new(|record, attempt| {
        if attempt < 2 {
            FakeBehavior::Unavailable
        } else {
            FakeBehavior::translate(format!("CREATE STREAM {}", record.name()))
        }
    });
    let orchestrator = common::orchestrator_with(translator.clone());

    let result = orchestrator
        .run(vec![common::batch(0, "streams", &["ORDERS_STREAM"])], &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(translator.call_count(), 3);
    assert_eq!(result.statements("streams"), ["CREATE STREAM ORDERS_STREAM"]);
    assert!(result.metadata.total_errors.is_empty());
}

/// A permanent batch failure falls back to one call per record
#[tokio::test]
async fn test_run_permanentFailure_shouldIsolateRecord() {
    let translator = FakeTranslator::new(|record, _| match record.name() {
        "B" => FakeBehavior::Broken,
        name => FakeBehavior::translate(format!("CREATE TAG {}", name)),
    });
    let orchestrator = common::orchestrator_with(translator.clone());

    let result = orchestrator
        .run(vec![common::batch(0, "tags", &["A", "B", "C"])], &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(
        translator.calls(),
        vec![
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec!["A".to_string()],
            vec!["B".to_string()],
            vec!["C".to_string()],
        ]
    );
    assert_eq!(result.statements("tags"), ["CREATE TAG A", "CREATE TAG C"]);
    assert_eq!(result.metadata.total_errors[0].kind, ErrorKind::TranslationError);
}

/// Invalid statements always carry a blocking finding
#[tokio::test]
async fn test_run_invalidStatements_shouldCarryBlockers() {
    let orchestrator = orchestrator_with_policies(
        FakeTranslator::translating(),
        FakeParser::rejecting_containing("BAD"),
        PolicyTable::new(ValidationMethod::SyntaxOnly),
    );

    let result = orchestrator
        .run(
            vec![common::batch(0, "tables", &["OK_1", "BAD_2", "OK_3", "BAD_4"])],
            &CancelToken::never(),
        )
        .await
        .unwrap();

    let report = &result.metadata.evaluation_reports[0];
    assert!(report.is_consistent());
    assert_eq!(report.invalid_count, 2);
    for evaluation in report.per_statement.iter().filter(|evaluation| !evaluation.is_valid) {
        assert!(evaluation
            .findings
            .iter()
            .any(|finding| finding.severity == Severity::Blocker));
    }
    assert_eq!(result.metadata.per_type_stats["tables"].invalid, 2);
}

/// Types without a route fail per record without stopping other batches
#[tokio::test]
async fn test_run_unroutedTypes_shouldFailOnlyTheirRecords() {
    let orchestrator = Orchestrator::new(
        Router::for_known_types(Arc::new(FakeTranslator::translating())).without_route("stages"),
        Evaluator::new(
            Arc::new(FakeParser::accepting_all()),
            PolicyTable::new(ValidationMethod::SyntaxOnly),
            common::fast_evaluator_settings(),
        ),
        common::fast_orchestrator_settings(),
    );

    let result = orchestrator
        .run(
            vec![
                common::batch(0, "stages", &["RAW_STAGE"]),
                common::batch(1, "widgets", &["W"]),
                common::batch(2, "tables", &["T"]),
            ],
            &CancelToken::never(),
        )
        .await
        .unwrap();

    assert_eq!(result.statements("tables"), ["CREATE TABLE T (id INT)"]);
    let kinds: Vec<(String, ErrorKind)> = result
        .metadata
        .total_errors
        .iter()
        .map(|error| (error.artifact_type.clone(), error.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("stages".to_string(), ErrorKind::UnknownArtifactType),
            ("widgets".to_string(), ErrorKind::UnknownArtifactType),
        ]
    );
}

/// Cancelling mid-run keeps finished batches and merges nothing partial
#[tokio::test]
async fn test_run_cancelledMidRun_shouldNotMergePartialBatches() {
    common::init_test_logging();
    let translator = FakeTranslator::new(|record, _| match record.name() {
        "HANGS" => FakeBehavior::Timeout,
        name => FakeBehavior::translate(format!("CREATE DATABASE {}", name)),
    });
    let orchestrator = common::orchestrator_with(translator);
    let (handle, token) = cancellation();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
    });

    let result = orchestrator
        .run(
            vec![
                common::batch(0, "databases", &["SALES"]),
                common::batch(1, "databases", &["FINANCE", "HANGS"]),
            ],
            &token,
        )
        .await
        .unwrap();

    assert_eq!(result.statements("databases"), ["CREATE DATABASE SALES"]);
    assert_eq!(result.metadata.cancelled_batches, vec![1]);
    assert_eq!(result.metadata.cancelled_items, 2);
    assert_eq!(result.metadata.total_items, 1);
    assert!(result.metadata.total_errors.is_empty());
}

/// A capability that never answers fails the whole run
#[tokio::test]
async fn test_run_unreachableTranslator_shouldFailRun() {
    let orchestrator = common::orchestrator_with(FakeTranslator::unavailable());

    let error = orchestrator
        .run(vec![common::batch(0, "sequences", &["SEQ_1"])], &CancelToken::never())
        .await
        .unwrap_err();

    match error {
        RunError::CapabilityUnreachable { batches, last_error } => {
            assert_eq!(batches, 1);
            assert!(last_error.contains("gave up after 3 attempt(s)"));
        }
        other => panic!("expected CapabilityUnreachable, got {:?}", other),
    }
}
