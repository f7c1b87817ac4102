/*!
 * End-to-end migration runs through the controller
 */

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Value, json};

use ddlport::fakes::{FakeJudge, FakeTranslator};
use ddlport::{CancelToken, Config, Controller, OutputFormat, RunError, cancellation};

use crate::common;

fn exported_inputs(dir: &std::path::Path) -> Result<Vec<std::path::PathBuf>> {
    let tables = common::create_artifact_file(
        dir,
        "tables.json",
        "tables",
        vec![
            json!({"name": "CUSTOMERS", "definition": "CREATE TABLE CUSTOMERS (id INT)"}),
            json!({"name": "ORDERS", "definition": "CREATE TABLE ORDERS (id INT)"}),
            json!({"name": "ITEMS", "definition": "CREATE TABLE ITEMS (id INT)"}),
        ],
    )?;
    let procedures = common::create_artifact_file(
        dir,
        "procedures.json",
        "procedures",
        vec![
            json!({"name": "LOAD_ORDERS", "definition": "CREATE PROCEDURE LOAD_ORDERS() AS $$ ... $$"}),
            json!({"name": "PURGE", "definition": "CREATE PROCEDURE PURGE() AS $$ ... $$"}),
        ],
    )?;
    Ok(vec![tables, procedures])
}

fn test_config(format: OutputFormat) -> Config {
    let mut config = Config::default();
    config.processing.batch_size = 2;
    config.output.format = format;
    config
}

/// Test a full run with injected capabilities
#[tokio::test]
async fn test_controllerRun_shouldTranslateValidateAndWrite() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let inputs = exported_inputs(temp_dir.path())?;
    let output_dir = temp_dir.path().join("out");
    let translator = FakeTranslator::translating();

    let controller = Controller::with_config(test_config(OutputFormat::Combined))?
        .with_translator(Arc::new(translator.clone()))
        .with_judge(Arc::new(FakeJudge::scoring(90.0, 90.0)));

    let report = controller.run(&inputs, &output_dir, &CancelToken::never()).await?;

    // tables: [CUSTOMERS, ORDERS], [ITEMS]; procedures: [LOAD_ORDERS, PURGE]
    assert_eq!(translator.call_count(), 3);
    assert_eq!(report.skipped_inputs, 0);
    assert_eq!(report.summary.total_items, 5);
    assert_eq!(report.summary.successful, 5);
    assert_eq!(report.summary.invalid, 0);
    assert_eq!(report.summary.manual_review_types, vec!["procedures".to_string()]);
    assert_eq!(
        report.result.statements("tables"),
        [
            "CREATE TABLE CUSTOMERS (id INT)",
            "CREATE TABLE ORDERS (id INT)",
            "CREATE TABLE ITEMS (id INT)"
        ]
    );

    for file in [
        "tables.sql",
        "procedures.sql",
        "results.json",
        "translation_results.json",
        "results_summary.json",
        "ddlport.run.log",
    ] {
        assert!(output_dir.join(file).exists(), "missing {}", file);
    }
    assert!(report.written.contains(&output_dir.join("tables.sql")));

    let summary: Value = serde_json::from_str(&std::fs::read_to_string(output_dir.join("results_summary.json"))?)?;
    assert_eq!(summary["successful"], 5);
    assert_eq!(summary["output_format"], "combined");
    Ok(())
}

/// Test that a dry run needs no credentials and echoes the source definitions
#[tokio::test]
async fn test_controllerRun_dryRun_shouldEchoDefinitions() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let inputs = exported_inputs(temp_dir.path())?;
    let output_dir = temp_dir.path().join("dry");

    let controller = Controller::with_config(test_config(OutputFormat::Sql))?.dry_run(true);
    let report = controller.run(&inputs, &output_dir, &CancelToken::never()).await?;

    assert_eq!(report.summary.successful, 5);
    assert_eq!(report.summary.invalid, 0);
    let script = std::fs::read_to_string(output_dir.join("tables.sql"))?;
    assert!(script.contains("-- Statement 3\nCREATE TABLE ITEMS (id INT);"));
    assert!(!output_dir.join("results.json").exists());
    Ok(())
}

/// Test that a dry run over records without definitions reports placeholders as unchecked, not invalid
#[tokio::test]
async fn test_controllerRun_dryRunWithoutDefinitions_shouldNotReportInvalid() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let tables = common::create_artifact_file(
        temp_dir.path(),
        "tables.json",
        "tables",
        vec![
            json!({"database_name": "SALES", "schema_name": "PUBLIC", "table_name": "ORDERS"}),
            json!({"database_name": "SALES", "schema_name": "PUBLIC", "table_name": "CUSTOMERS"}),
        ],
    )?;
    let output_dir = temp_dir.path().join("dry");

    let controller = Controller::with_config(test_config(OutputFormat::Sql))?.dry_run(true);
    let report = controller.run(&[tables], &output_dir, &CancelToken::never()).await?;

    assert_eq!(report.summary.successful, 2);
    assert_eq!(report.summary.invalid, 0);
    assert_eq!(report.summary.warnings, 2);
    let script = std::fs::read_to_string(output_dir.join("tables.sql"))?;
    assert!(script.contains("-- tables SALES.PUBLIC.ORDERS (dry run)"));
    Ok(())
}

/// Test that an LLM run without credentials fails before any batch is dispatched
#[tokio::test]
async fn test_controllerRun_withoutApiKey_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let inputs = exported_inputs(temp_dir.path())?;

    let controller = Controller::with_config(test_config(OutputFormat::Sql))?;
    let result = controller
        .run(&inputs, &temp_dir.path().join("out"), &CancelToken::never())
        .await;

    let error = result.unwrap_err();
    assert!(error.to_string().contains("api_key"));
    assert!(!temp_dir.path().join("out").exists());
    Ok(())
}

/// Test that inputs without usable records are a fatal error
#[tokio::test]
async fn test_controllerRun_withoutBatches_shouldReturnNoBatches() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let empty = common::create_artifact_file(temp_dir.path(), "views.json", "views", Vec::new())?;
    let unknown = common::create_test_file(temp_dir.path(), "inventory.json", "{}")?;

    let controller = Controller::with_config(Config::default())?.dry_run(true);
    let error = controller
        .run(&[empty, unknown], &temp_dir.path().join("out"), &CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(error.downcast_ref::<RunError>(), Some(RunError::NoBatches)));
    Ok(())
}

/// Test that an invalid configuration is rejected up front
#[test]
fn test_controller_withInvalidConfig_shouldFail() {
    let mut config = Config::default();
    config.target_dialect = "not-a-dialect".to_string();
    assert!(Controller::with_config(config).is_err());
}

/// Test that a run cancelled before it starts writes an empty, cancelled result
#[tokio::test]
async fn test_controllerRun_cancelledUpFront_shouldRecordCancelledBatches() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let inputs = exported_inputs(temp_dir.path())?;
    let output_dir = temp_dir.path().join("out");
    let (handle, token) = cancellation();
    handle.cancel();

    let controller = Controller::with_config(test_config(OutputFormat::Sql))?.dry_run(true);
    let report = controller.run(&inputs, &output_dir, &token).await?;

    assert_eq!(report.summary.total_items, 0);
    assert_eq!(report.summary.cancelled_batches, 3);
    assert_eq!(report.summary.cancelled_items, 5);
    assert!(!output_dir.join("tables.sql").exists());
    assert!(output_dir.join("translation_results.json").exists());
    Ok(())
}
