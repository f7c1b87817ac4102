/*!
 * Tests for LLM providers and the capabilities built on them
 */

use std::sync::Arc;

use serde_json::json;

use ddlport::app_config::{LlmProviderKind, LlmSettings};
use ddlport::artifacts::{ArtifactRecord, BatchContext};
use ddlport::errors::ProviderError;
use ddlport::providers::mock::{MockBehavior, MockProvider};
use ddlport::providers::{CompletionRequest, Provider, create_provider};
use ddlport::translation::{LlmTranslator, TranslationReply, Translator};
use ddlport::validation::{LlmJudge, SemanticJudge};

fn settings(provider: LlmProviderKind, api_key: &str, endpoint: &str) -> LlmSettings {
    LlmSettings {
        provider,
        api_key: api_key.to_string(),
        endpoint: endpoint.to_string(),
        model: "test-model".to_string(),
        ..LlmSettings::default()
    }
}

/// Test provider construction for every supported kind
#[test]
fn test_createProvider_shouldBuildEveryKind() {
    let openai = create_provider(&settings(LlmProviderKind::OpenAI, "sk-test", "")).unwrap();
    assert_eq!(openai.model(), "test-model");

    let anthropic = create_provider(&settings(LlmProviderKind::Anthropic, "key", "")).unwrap();
    assert_eq!(anthropic.model(), "test-model");

    let databricks = create_provider(&settings(
        LlmProviderKind::Databricks,
        "dapi-test",
        "https://example.cloud.databricks.com/serving-endpoints",
    ))
    .unwrap();
    assert_eq!(databricks.model(), "test-model");

    assert!(create_provider(&settings(LlmProviderKind::Anthropic, "", "")).is_err());
}

/// Test that the slow mock still answers
#[tokio::test]
async fn test_mockProvider_slow_shouldRespondAfterDelay() {
    let provider = MockProvider::new(MockBehavior::Slow { delay_ms: 10 });
    let response = provider.complete(CompletionRequest::new("ping")).await.unwrap();
    assert_eq!(response.text, "ping");
}

/// Test that the empty mock returns no text
#[tokio::test]
async fn test_mockProvider_empty_shouldReturnBlankText() {
    let response = MockProvider::empty().complete(CompletionRequest::new("ping")).await.unwrap();
    assert!(response.text.is_empty());
}

/// Test that a blank completion becomes a rejection, not a statement
#[tokio::test]
async fn test_llmTranslator_blankReply_shouldReject() {
    let translator = LlmTranslator::new(Arc::new(MockProvider::empty()), "snowflake", "databricks");
    let records = vec![ArtifactRecord::new("ORDERS", json!({"table_name": "ORDERS"}))];

    let replies = translator.translate("tables", &records, &BatchContext::new()).await.unwrap();

    assert!(matches!(&replies[0], TranslationReply::Rejected(_)));
}

/// Test that an unsupported marker becomes a rejection carrying the reason
#[tokio::test]
async fn test_llmTranslator_unsupportedMarker_shouldRejectWithReason() {
    let provider = MockProvider::working()
        .with_custom_response(|_| "-- UNSUPPORTED: Snowpipe auto-ingest has no equivalent".to_string());
    let translator = LlmTranslator::new(Arc::new(provider), "snowflake", "databricks");
    let records = vec![ArtifactRecord::new("P", json!({"pipe_name": "P"}))];

    let replies = translator.translate("pipes", &records, &BatchContext::new()).await.unwrap();

    match &replies[0] {
        TranslationReply::Rejected(reason) => assert!(reason.contains("Snowpipe auto-ingest")),
        other => panic!("expected a rejection, got {:?}", other),
    }
}

/// Test that credential failures are permanent capability errors
#[tokio::test]
async fn test_llmTranslator_unauthorized_shouldFailPermanently() {
    let translator = LlmTranslator::new(Arc::new(MockProvider::unauthorized()), "snowflake", "databricks");
    let records = vec![ArtifactRecord::new("T", json!({}))];

    let error = translator.translate("tables", &records, &BatchContext::new()).await.unwrap_err();

    assert!(!error.is_transient());
}

/// Test that the judge sends the configured sampling settings and parses the verdicts
#[tokio::test]
async fn test_llmJudge_shouldUseSettingsAndParseVerdicts() {
    let provider = Arc::new(MockProvider::working().with_custom_response(|_| {
        r#"{"results": [{"index": 0, "compliance_score": 88, "best_practices_score": 75, "issues": []}]}"#.to_string()
    }));
    let judge = LlmJudge::new(provider.clone(), "databricks")
        .with_temperature(0.0)
        .with_max_tokens(512);

    let verdicts = judge
        .judge("views", &["CREATE VIEW v AS SELECT 1".to_string()])
        .await
        .unwrap();

    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].compliance_score, 88.0);
    assert_eq!(verdicts[0].best_practice_score, 75.0);
    let request = &provider.requests()[0];
    assert_eq!(request.temperature, 0.0);
    assert_eq!(request.max_tokens, 512);
    assert!(request.system.as_deref().unwrap_or_default().contains("databricks"));
}

/// Test that a judge reply with the wrong number of verdicts is rejected
#[tokio::test]
async fn test_llmJudge_countMismatch_shouldFailPermanently() {
    let provider = MockProvider::working().with_custom_response(|_| r#"{"results": []}"#.to_string());
    let judge = LlmJudge::new(Arc::new(provider), "databricks");

    let error = judge.judge("views", &["CREATE VIEW v AS SELECT 1".to_string()]).await.unwrap_err();

    assert!(!error.is_transient());
}

/// Test provider error classification at the capability boundary
#[test]
fn test_providerError_transience_shouldDriveRetries() {
    assert!(ProviderError::Timeout("30s".to_string()).is_transient());
    assert!(ProviderError::RateLimitExceeded("slow down".to_string()).is_transient());
    assert!(!ProviderError::ParseError("not json".to_string()).is_transient());
}
