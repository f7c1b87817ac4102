/*!
 * Artifact type routing.
 *
 * The routing table maps each artifact type to the translator that handles
 * it. It is assembled once before a run and only read afterwards.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::artifacts::Batch;
use crate::artifacts::registry::ARTIFACT_TYPES;
use crate::errors::RouteError;
use crate::translation::Translator;

/// Shared handle to a translator capability
pub type TranslatorHandle = Arc<dyn Translator>;

/// Closed artifact type to translator table
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: BTreeMap<String, TranslatorHandle>,
}

impl Router {
    /// An empty table; every route fails until types are registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every known artifact type to `translator`
    pub fn for_known_types(translator: TranslatorHandle) -> Self {
        ARTIFACT_TYPES
            .iter()
            .fold(Self::new(), |router, artifact_type| router.with_route(*artifact_type, translator.clone()))
    }

    /// Register or replace the translator for one artifact type
    pub fn with_route(mut self, artifact_type: impl Into<String>, translator: TranslatorHandle) -> Self {
        self.routes.insert(artifact_type.into(), translator);
        self
    }

    /// Remove an artifact type from the table
    pub fn without_route(mut self, artifact_type: &str) -> Self {
        self.routes.remove(artifact_type);
        self
    }

    /// Pure lookup of the translator for `batch`
    pub fn route(&self, batch: &Batch) -> Result<TranslatorHandle, RouteError> {
        self.routes
            .get(batch.artifact_type())
            .cloned()
            .ok_or_else(|| RouteError::UnknownArtifactType(batch.artifact_type().to_string()))
    }

    pub fn artifact_types(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
