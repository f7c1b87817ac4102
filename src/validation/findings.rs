/*!
 * Validation findings and per-batch evaluation reports.
 */

use serde::{Deserialize, Serialize};

use crate::artifacts::RecordRef;

use super::policy::ValidationMethod;

/// Category of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SyntaxError,
    SemanticIssue,
    Warning,
}

/// Whether a finding invalidates its statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocker,
    NonBlocking,
}

/// One observation about one statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub kind: FindingKind,
    pub message: String,
    pub severity: Severity,
}

impl ValidationFinding {
    /// The statement does not parse. Always blocking.
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self {
            kind: FindingKind::SyntaxError,
            message: message.into(),
            severity: Severity::Blocker,
        }
    }

    /// Judge-reported problem. Never blocking.
    pub fn semantic_issue(message: impl Into<String>) -> Self {
        Self {
            kind: FindingKind::SemanticIssue,
            message: message.into(),
            severity: Severity::NonBlocking,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: FindingKind::Warning,
            message: message.into(),
            severity: Severity::NonBlocking,
        }
    }

    pub fn is_blocker(&self) -> bool {
        self.severity == Severity::Blocker
    }
}

/// Evaluation of a single statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementEvaluation {
    pub record: RecordRef,
    pub is_valid: bool,
    pub findings: Vec<ValidationFinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_practice_score: Option<f64>,
}

impl StatementEvaluation {
    pub fn new(record: RecordRef) -> Self {
        Self {
            record,
            is_valid: true,
            findings: Vec::new(),
            compliance_score: None,
            best_practice_score: None,
        }
    }

    /// Add a finding. A blocking finding invalidates the statement.
    pub fn push(&mut self, finding: ValidationFinding) {
        if finding.is_blocker() {
            self.is_valid = false;
        }
        self.findings.push(finding);
    }

    pub fn warning_count(&self) -> usize {
        self.findings.iter().filter(|finding| !finding.is_blocker()).count()
    }
}

/// Result of evaluating one batch's successful statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub batch_sequence: u64,
    pub artifact_type: String,
    pub evaluated_count: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub validation_method: ValidationMethod,
    pub per_statement: Vec<StatementEvaluation>,
}

impl EvaluationReport {
    /// Build a report whose counts are derived from the statements
    pub fn from_statements(
        batch_sequence: u64,
        artifact_type: impl Into<String>,
        validation_method: ValidationMethod,
        per_statement: Vec<StatementEvaluation>,
    ) -> Self {
        let valid_count = per_statement.iter().filter(|statement| statement.is_valid).count();
        Self {
            batch_sequence,
            artifact_type: artifact_type.into(),
            evaluated_count: per_statement.len(),
            valid_count,
            invalid_count: per_statement.len() - valid_count,
            validation_method,
            per_statement,
        }
    }

    /// Report for a batch with nothing to evaluate
    pub fn empty(batch_sequence: u64, artifact_type: impl Into<String>, validation_method: ValidationMethod) -> Self {
        Self::from_statements(batch_sequence, artifact_type, validation_method, Vec::new())
    }

    pub fn warning_count(&self) -> usize {
        self.per_statement.iter().map(StatementEvaluation::warning_count).sum()
    }

    /// Whether the counts agree with the per-statement entries
    pub fn is_consistent(&self) -> bool {
        self.valid_count + self.invalid_count == self.evaluated_count
            && self.evaluated_count == self.per_statement.len()
    }
}
