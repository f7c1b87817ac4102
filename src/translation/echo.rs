/*!
 * Offline translator used for dry runs.
 */

use async_trait::async_trait;

use crate::artifacts::{ArtifactRecord, BatchContext};
use crate::errors::CapabilityError;

use super::Translator;
use super::outcome::TranslationReply;

/// Returns each record's source definition unchanged.
///
/// Records without a definition get a placeholder comment naming the object.
#[derive(Debug, Clone, Default)]
pub struct EchoTranslator;

impl EchoTranslator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Translator for EchoTranslator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn translate(
        &self,
        artifact_type: &str,
        records: &[ArtifactRecord],
        _context: &BatchContext,
    ) -> Result<Vec<TranslationReply>, CapabilityError> {
        Ok(records
            .iter()
            .map(|record| match record.body() {
                Some(body) if !body.trim().is_empty() => TranslationReply::translated(body.trim()),
                _ => TranslationReply::translated(format!("-- {} {} (dry run)", artifact_type, record.qualified_name())),
            })
            .collect())
    }
}
