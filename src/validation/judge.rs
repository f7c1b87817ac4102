/*!
 * Semantic judge capability.
 *
 * The judge scores statements that already parse for compliance with the
 * target platform and for best practices. Its rubric is opaque; only the
 * scores and the explanatory findings matter to the evaluator.
 *
 * `LlmJudge` asks an LLM for a structured JSON verdict per statement and
 * rejects replies that do not line up one-to-one with the request.
 */

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::CapabilityError;
use crate::providers::{CompletionRequest, Provider};

use super::sql_text::strip_code_fences;

/// Score assigned when a judge reports a parsable statement with no score
pub const DEFAULT_VALID_SCORE: f64 = 80.0;

/// Scores and explanations for one statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// 0-100 compliance with the target dialect
    pub compliance_score: f64,
    /// 0-100 adherence to target best practices
    pub best_practice_score: f64,
    /// Human-readable explanations
    #[serde(default)]
    pub findings: Vec<String>,
}

/// Opaque semantic scorer
#[async_trait]
pub trait SemanticJudge: Send + Sync + Debug {
    /// Score `statements`, returning exactly one verdict per statement, in order
    async fn judge(&self, artifact_type: &str, statements: &[String]) -> Result<Vec<JudgeVerdict>, CapabilityError>;
}

#[derive(Debug, Deserialize)]
struct JudgeReply {
    results: Vec<JudgeReplyEntry>,
}

#[derive(Debug, Deserialize)]
struct JudgeReplyEntry {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default, alias = "score")]
    compliance_score: f64,
    #[serde(default, alias = "best_practices_score")]
    best_practice_score: f64,
    #[serde(default)]
    syntax_valid: Option<bool>,
    #[serde(default)]
    issues: Vec<JudgeReplyIssue>,
}

#[derive(Debug, Deserialize)]
struct JudgeReplyIssue {
    #[serde(default)]
    severity: Option<String>,
    description: String,
    #[serde(default)]
    suggestion: Option<String>,
}

impl JudgeReplyIssue {
    fn describe(&self) -> String {
        let mut text = match &self.severity {
            Some(severity) => format!("[{}] {}", severity, self.description),
            None => self.description.clone(),
        };
        if let Some(suggestion) = self.suggestion.as_deref().filter(|s| !s.is_empty()) {
            text.push_str(&format!(" Suggestion: {}", suggestion));
        }
        text
    }
}

impl From<JudgeReplyEntry> for JudgeVerdict {
    fn from(entry: JudgeReplyEntry) -> Self {
        let compliance_score = if entry.compliance_score == 0.0 && entry.syntax_valid == Some(true) {
            DEFAULT_VALID_SCORE
        } else {
            entry.compliance_score
        };
        Self {
            compliance_score: compliance_score.clamp(0.0, 100.0),
            best_practice_score: entry.best_practice_score.clamp(0.0, 100.0),
            findings: entry.issues.iter().map(JudgeReplyIssue::describe).collect(),
        }
    }
}

/// Semantic judge backed by an LLM provider
#[derive(Debug, Clone)]
pub struct LlmJudge {
    provider: Arc<dyn Provider>,
    target_dialect: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmJudge {
    pub fn new(provider: Arc<dyn Provider>, target_dialect: impl Into<String>) -> Self {
        Self {
            provider,
            target_dialect: target_dialect.into(),
            temperature: 0.1,
            max_tokens: 2000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a strict reviewer of {dialect} SQL DDL produced by an automated migration. \
             For every statement, score compliance with {dialect} syntax and semantics (0-100) and \
             adherence to {dialect} best practices (0-100), and list concrete issues. \
             Respond with JSON only, shaped as \
             {{\"results\": [{{\"index\": 0, \"compliance_score\": 0, \"best_practices_score\": 0, \
             \"syntax_valid\": true, \"issues\": [{{\"severity\": \"warning\", \"description\": \"\", \"suggestion\": \"\"}}]}}]}} \
             with exactly one entry per statement, in the order given.",
            dialect = self.target_dialect
        )
    }

    fn user_prompt(artifact_type: &str, statements: &[String]) -> String {
        let mut prompt = format!(
            "Evaluate the following {} {} statement(s).\n",
            statements.len(),
            artifact_type
        );
        for (index, statement) in statements.iter().enumerate() {
            prompt.push_str(&format!("\n-- Statement {}\n{}\n", index, statement.trim()));
        }
        prompt
    }

    /// Parse a judge reply into one verdict per expected statement
    pub fn parse_reply(reply: &str, expected: usize) -> Result<Vec<JudgeVerdict>, CapabilityError> {
        let body = strip_code_fences(reply);
        let json = match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => &body[start..=end],
            _ => return Err(CapabilityError::permanent("judge reply contained no JSON object")),
        };

        let parsed: JudgeReply = serde_json::from_str(json)
            .map_err(|e| CapabilityError::permanent(format!("malformed judge reply: {}", e)))?;

        if parsed.results.len() != expected {
            return Err(CapabilityError::permanent(format!(
                "judge returned {} verdict(s) for {} statement(s)",
                parsed.results.len(),
                expected
            )));
        }

        let mut entries = parsed.results;
        if entries.iter().all(|entry| entry.index.is_some()) {
            entries.sort_by_key(|entry| entry.index);
            let in_range = entries
                .iter()
                .enumerate()
                .all(|(position, entry)| entry.index == Some(position));
            if !in_range {
                return Err(CapabilityError::permanent("judge reply indexes do not match the request"));
            }
        }

        Ok(entries.into_iter().map(JudgeVerdict::from).collect())
    }
}

#[async_trait]
impl SemanticJudge for LlmJudge {
    async fn judge(&self, artifact_type: &str, statements: &[String]) -> Result<Vec<JudgeVerdict>, CapabilityError> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }

        let request = CompletionRequest::new(Self::user_prompt(artifact_type, statements))
            .system(self.system_prompt())
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

        let response = self.provider.complete(request).await?;
        debug!(
            "Judge scored {} {} statement(s) with {}",
            statements.len(),
            artifact_type,
            self.provider.model()
        );

        Self::parse_reply(&response.text, statements.len())
    }
}
