/*!
 * Validation policy table.
 *
 * Which checks an artifact type receives is data, not code: a table maps each
 * artifact type to a `ValidationMethod`, with a default for types that have
 * no entry.
 */

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::app_config::ValidationConfig;

/// How the statements of an artifact type are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    /// Deterministic parse against the target dialect
    #[default]
    SyntaxOnly,
    /// Parse, then score parsed statements with the semantic judge
    SyntaxAndSemantic,
    /// No automated validation; flagged for manual review
    Skipped,
}

impl ValidationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxOnly => "syntax_only",
            Self::SyntaxAndSemantic => "syntax_and_semantic",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact type to validation method lookup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyTable {
    default_method: ValidationMethod,
    methods: BTreeMap<String, ValidationMethod>,
}

impl PolicyTable {
    pub fn new(default_method: ValidationMethod) -> Self {
        Self {
            default_method,
            methods: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            default_method: config.default_method,
            methods: config.methods.clone(),
        }
    }

    /// Set the method for one artifact type
    pub fn with_method(mut self, artifact_type: impl Into<String>, method: ValidationMethod) -> Self {
        self.methods.insert(artifact_type.into(), method);
        self
    }

    pub fn method_for(&self, artifact_type: &str) -> ValidationMethod {
        self.methods
            .get(artifact_type)
            .copied()
            .unwrap_or(self.default_method)
    }

    /// Artifact types configured as `skipped`, i.e. needing manual review
    pub fn skipped_types(&self) -> Vec<&str> {
        self.methods
            .iter()
            .filter(|(_, method)| **method == ValidationMethod::Skipped)
            .map(|(artifact_type, _)| artifact_type.as_str())
            .collect()
    }
}
