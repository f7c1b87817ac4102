/*!
 * LLM-backed translator.
 *
 * Each record is sent as its own completion request; requests for one batch
 * run concurrently and their replies are returned in record order.
 */

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::debug;

use crate::artifacts::{ArtifactRecord, BatchContext};
use crate::errors::CapabilityError;
use crate::providers::{CompletionRequest, Provider};
use crate::validation::sql_text::clean_statement;

use super::Translator;
use super::outcome::TranslationReply;
use super::prompts::{PromptTemplate, TranslationPromptBuilder, UNSUPPORTED_MARKER};

/// Translator that asks an LLM provider for target-dialect DDL
#[derive(Debug, Clone)]
pub struct LlmTranslator {
    provider: Arc<dyn Provider>,
    template: PromptTemplate,
    source_dialect: String,
    target_dialect: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn Provider>, source_dialect: impl Into<String>, target_dialect: impl Into<String>) -> Self {
        Self {
            provider,
            template: PromptTemplate::default(),
            source_dialect: source_dialect.into(),
            target_dialect: target_dialect.into(),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Interpret a raw model reply
    pub fn interpret_reply(raw: &str) -> TranslationReply {
        let statement = clean_statement(raw);
        if statement.is_empty() {
            return TranslationReply::rejected("translator returned an empty statement");
        }
        if let Some(reason) = statement.strip_prefix(UNSUPPORTED_MARKER) {
            let reason = reason.trim();
            return TranslationReply::rejected(if reason.is_empty() {
                "unsupported in the target dialect".to_string()
            } else {
                format!("unsupported in the target dialect: {}", reason)
            });
        }
        TranslationReply::Translated(statement)
    }

    async fn translate_record(
        &self,
        system: &str,
        artifact_type: &str,
        record: &ArtifactRecord,
        context: &BatchContext,
    ) -> Result<TranslationReply, CapabilityError> {
        let prompt = TranslationPromptBuilder::new(artifact_type, record)
            .with_context(context)
            .build();
        let request = CompletionRequest::new(prompt)
            .system(system)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

        let response = self.provider.complete(request).await?;
        debug!(
            "Translated {} '{}' with {} ({:?} output tokens)",
            artifact_type,
            record.name(),
            self.provider.model(),
            response.output_tokens
        );
        Ok(Self::interpret_reply(&response.text))
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    fn name(&self) -> &str {
        "llm"
    }

    async fn translate(
        &self,
        artifact_type: &str,
        records: &[ArtifactRecord],
        context: &BatchContext,
    ) -> Result<Vec<TranslationReply>, CapabilityError> {
        let system = self.template.render(&self.source_dialect, &self.target_dialect, artifact_type);
        let replies = join_all(
            records
                .iter()
                .map(|record| self.translate_record(&system, artifact_type, record, context)),
        )
        .await;

        replies.into_iter().collect()
    }
}
