/*!
 * Tests for application configuration
 */

use std::time::Duration;

use anyhow::Result;

use ddlport::OutputFormat;
use ddlport::app_config::{Config, LlmProviderKind, LogLevel};
use ddlport::pipeline::{OrchestratorSettings, RetryPolicy};
use ddlport::validation::{EvaluatorSettings, PolicyTable, ValidationMethod};

use crate::common;

/// Test that a partial config file keeps defaults for everything it omits
#[test]
fn test_partialConfig_shouldMergeWithDefaults() -> Result<()> {
    let json = r#"{
        "target_dialect": "databricks",
        "llm": { "translator": { "provider": "anthropic", "model": "claude-test", "api_key": "k" } },
        "processing": { "batch_size": 3 },
        "validation": { "methods": { "views": "syntax_and_semantic" } },
        "output": { "format": "combined" },
        "log_level": "debug"
    }"#;

    let config: Config = serde_json::from_str(json)?;

    assert_eq!(config.llm.translator.provider, LlmProviderKind::Anthropic);
    assert_eq!(config.llm.judge.provider, LlmProviderKind::Databricks);
    assert_eq!(config.processing.batch_size, 3);
    assert_eq!(config.processing.max_concurrent_batches, 5);
    assert_eq!(config.output.format, OutputFormat::Combined);
    assert_eq!(config.log_level, LogLevel::Debug);
    // An explicit methods table replaces the default one
    assert_eq!(config.validation.methods.len(), 1);
    assert!(config.validate().is_ok());
    Ok(())
}

/// Test that a config written to disk reads back unchanged
#[test]
fn test_configFile_shouldRoundTripThroughDisk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = Config::default();
    config.processing.call_timeout_secs = 42;
    config.validation.default_method = ValidationMethod::Skipped;

    let path = common::create_test_file(temp_dir.path(), "conf.json", &serde_json::to_string_pretty(&config)?)?;
    let loaded: Config = serde_json::from_str(&std::fs::read_to_string(path)?)?;

    assert_eq!(loaded, config);
    Ok(())
}

/// Test the consistency checks on numeric settings
#[test]
fn test_validate_shouldRejectInconsistentValues() {
    let mut zero_batch = Config::default();
    zero_batch.processing.batch_size = 0;
    assert!(zero_batch.validate().is_err());

    let mut zero_workers = Config::default();
    zero_workers.processing.max_concurrent_batches = 0;
    assert!(zero_workers.validate().is_err());

    let mut inverted_backoff = Config::default();
    inverted_backoff.retry.judge.backoff_base_ms = 5_000;
    inverted_backoff.retry.judge.max_backoff_ms = 1_000;
    assert!(inverted_backoff.validate().is_err());

    let mut bad_threshold = Config::default();
    bad_threshold.validation.compliance_threshold = 120.0;
    assert!(bad_threshold.validate().is_err());

    let mut bad_endpoint = Config::default();
    bad_endpoint.llm.judge.endpoint = "not a url".to_string();
    assert!(bad_endpoint.validate().is_err());
}

/// Test that credential checks only cover the judge when it is used
#[test]
fn test_validateCredentials_withoutSemanticTypes_shouldIgnoreJudge() {
    let mut config = Config::default();
    config.validation.methods.retain(|_, method| *method != ValidationMethod::SyntaxAndSemantic);
    config.llm.translator.provider = LlmProviderKind::OpenAI;
    config.llm.translator.api_key = "sk-test".to_string();

    assert!(!config.uses_semantic_validation());
    assert!(config.validate_credentials().is_ok());
}

/// Test that components derive their settings from the config
#[test]
fn test_settingsFromConfig_shouldCarryConfiguredValues() {
    let mut config = Config::default();
    config.processing.max_concurrent_batches = 7;
    config.processing.call_timeout_secs = 12;
    config.retry.translator.max_attempts = 4;
    config.validation.judge_batch_size = 2;

    let orchestrator = OrchestratorSettings::from_config(&config);
    assert_eq!(orchestrator.max_concurrent_batches, 7);
    assert_eq!(orchestrator.call_timeout, Duration::from_secs(12));
    assert_eq!(orchestrator.translator_retry, RetryPolicy::new(4, 1000, 30_000));

    let evaluator = EvaluatorSettings::from_config(&config);
    assert_eq!(evaluator.judge_batch_size, 2);
    assert_eq!(evaluator.target_dialect, "databricks");

    let policies = PolicyTable::from_config(&config.validation);
    assert_eq!(policies.method_for("udfs"), ValidationMethod::Skipped);
    assert_eq!(policies.method_for("tables"), ValidationMethod::SyntaxOnly);
}

/// Test provider name parsing
#[test]
fn test_llmProviderKind_fromStr_shouldAcceptKnownNames() {
    assert_eq!("OpenAI".parse::<LlmProviderKind>().unwrap(), LlmProviderKind::OpenAI);
    assert_eq!("databricks".parse::<LlmProviderKind>().unwrap(), LlmProviderKind::Databricks);
    assert!("ollama".parse::<LlmProviderKind>().is_err());
    assert_eq!(LlmProviderKind::Anthropic.to_string(), "anthropic");
}
