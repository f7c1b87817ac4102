/*!
 * Translation capability for DDL artifacts.
 *
 * - `Translator`: the capability seam the orchestrator routes batches to
 * - `llm`: LLM-backed translator
 * - `echo`: offline translator for dry runs
 * - `outcome`: per-record replies and outcomes
 * - `prompts`: prompt templates and builders
 */

use std::fmt::Debug;

use async_trait::async_trait;

use crate::artifacts::{ArtifactRecord, BatchContext};
use crate::errors::CapabilityError;

pub mod echo;
pub mod llm;
pub mod outcome;
pub mod prompts;

// Re-export main types for easier usage
pub use self::echo::EchoTranslator;
pub use self::llm::LlmTranslator;
pub use self::outcome::{ErrorInfo, ErrorKind, OutcomeStatus, TranslationOutcome, TranslationReply};
pub use self::prompts::{PromptTemplate, TranslationPromptBuilder};

/// Translates a batch of records of one artifact type into target-dialect DDL
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Translate `records`, returning exactly one reply per record, in order.
    ///
    /// An `Err` fails the whole call; a per-record refusal is a `Rejected` reply.
    async fn translate(
        &self,
        artifact_type: &str,
        records: &[ArtifactRecord],
        context: &BatchContext,
    ) -> Result<Vec<TranslationReply>, CapabilityError>;
}
