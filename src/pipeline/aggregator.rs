/*!
 * Run-level aggregation.
 *
 * `RunAggregator` is the only cross-batch state in a run. Every completed
 * batch is folded in through `merge`; `finalize` freezes the result once and
 * hands out the same `RunResult` on every later call.
 *
 * The aggregator does not reorder anything itself. Callers deliver batches
 * in dispatch order (see `orchestrator`).
 */

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use log::debug;
use serde::Serialize;

use crate::errors::AggregatorError;
use crate::translation::{ErrorInfo, TranslationOutcome};
use crate::validation::{EvaluationReport, ValidationMethod};

/// Counters for one artifact type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    pub success: usize,
    pub error: usize,
    pub invalid: usize,
    pub warnings: usize,
    pub batches: usize,
}

/// Everything a run learned besides the statements themselves
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub started_at: String,
    /// Records in merged batches
    pub total_items: usize,
    pub total_errors: Vec<ErrorInfo>,
    pub total_warnings: usize,
    pub per_type_stats: BTreeMap<String, TypeStats>,
    pub evaluation_reports: Vec<EvaluationReport>,
    /// Sequences of batches that were cancelled before merging
    pub cancelled_batches: Vec<u64>,
    /// Records carried by cancelled batches
    pub cancelled_items: usize,
    pub duration: Duration,
}

impl RunMetadata {
    pub fn success_count(&self) -> usize {
        self.per_type_stats.values().map(|stats| stats.success).sum()
    }

    pub fn error_count(&self) -> usize {
        self.per_type_stats.values().map(|stats| stats.error).sum()
    }

    pub fn invalid_count(&self) -> usize {
        self.per_type_stats.values().map(|stats| stats.invalid).sum()
    }

    /// Artifact types whose statements were emitted without automated validation
    pub fn manual_review_types(&self) -> Vec<&str> {
        self.evaluation_reports
            .iter()
            .filter(|report| report.validation_method == ValidationMethod::Skipped)
            .map(|report| report.artifact_type.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Final product of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    /// Successful statements per artifact type, in dispatch order
    pub by_type: BTreeMap<String, Vec<String>>,
    pub metadata: RunMetadata,
}

impl RunResult {
    pub fn statements(&self, artifact_type: &str) -> &[String] {
        self.by_type.get(artifact_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The persisted `translation_results.json` shape
    pub fn output_document(&self) -> OutputDocument<'_> {
        let metadata = &self.metadata;
        OutputDocument {
            by_type: &self.by_type,
            metadata: OutputMetadata {
                total_results: metadata.success_count(),
                errors: &metadata.total_errors,
                processing_stats: ProcessingStats {
                    run_id: &metadata.run_id,
                    started_at: &metadata.started_at,
                    total_items: metadata.total_items,
                    successful: metadata.success_count(),
                    failed: metadata.error_count(),
                    invalid: metadata.invalid_count(),
                    warnings: metadata.total_warnings,
                    cancelled_batches: &metadata.cancelled_batches,
                    duration_secs: metadata.duration.as_secs_f64(),
                    per_type: &metadata.per_type_stats,
                    manual_review_types: metadata.manual_review_types(),
                },
                evaluation_results_count: metadata.evaluation_reports.len(),
            },
        }
    }
}

/// Serialized view of a `RunResult`
#[derive(Debug, Serialize)]
pub struct OutputDocument<'a> {
    #[serde(flatten)]
    pub by_type: &'a BTreeMap<String, Vec<String>>,
    pub metadata: OutputMetadata<'a>,
}

#[derive(Debug, Serialize)]
pub struct OutputMetadata<'a> {
    pub total_results: usize,
    pub errors: &'a [ErrorInfo],
    pub processing_stats: ProcessingStats<'a>,
    pub evaluation_results_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ProcessingStats<'a> {
    pub run_id: &'a str,
    pub started_at: &'a str,
    pub total_items: usize,
    pub successful: usize,
    pub failed: usize,
    pub invalid: usize,
    pub warnings: usize,
    pub cancelled_batches: &'a [u64],
    pub duration_secs: f64,
    pub per_type: &'a BTreeMap<String, TypeStats>,
    pub manual_review_types: Vec<&'a str>,
}

/// Accumulates merged batches into a `RunResult`
#[derive(Debug)]
pub struct RunAggregator {
    run_id: String,
    started_at: String,
    started: Instant,
    by_type: BTreeMap<String, Vec<String>>,
    total_items: usize,
    errors: Vec<ErrorInfo>,
    warnings: usize,
    per_type_stats: BTreeMap<String, TypeStats>,
    evaluation_reports: Vec<EvaluationReport>,
    seen_batches: BTreeSet<u64>,
    cancelled_batches: Vec<u64>,
    cancelled_items: usize,
    finalized: Option<RunResult>,
}

impl Default for RunAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::with_run_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: chrono::Utc::now().to_rfc3339(),
            started: Instant::now(),
            by_type: BTreeMap::new(),
            total_items: 0,
            errors: Vec::new(),
            warnings: 0,
            per_type_stats: BTreeMap::new(),
            evaluation_reports: Vec::new(),
            seen_batches: BTreeSet::new(),
            cancelled_batches: Vec::new(),
            cancelled_items: 0,
            finalized: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    /// Fold one completed batch into the run
    pub fn merge(
        &mut self,
        artifact_type: &str,
        outcomes: Vec<TranslationOutcome>,
        report: EvaluationReport,
    ) -> Result<(), AggregatorError> {
        if self.finalized.is_some() {
            return Err(AggregatorError::FinalizedRun);
        }
        if !self.seen_batches.insert(report.batch_sequence) {
            return Err(AggregatorError::DuplicateBatch(report.batch_sequence));
        }

        let stats = self.per_type_stats.entry(artifact_type.to_string()).or_default();
        let statements = self.by_type.entry(artifact_type.to_string()).or_default();

        self.total_items += outcomes.len();
        for outcome in outcomes {
            if let Some(statement) = outcome.statement() {
                statements.push(statement.to_string());
                stats.success += 1;
            } else if let Some(error) = outcome.error() {
                self.errors.push(error.clone());
                stats.error += 1;
            }
        }

        let warnings = report.warning_count();
        stats.invalid += report.invalid_count;
        stats.warnings += warnings;
        stats.batches += 1;
        self.warnings += warnings;

        debug!(
            "Merged batch {} ({}): {} ok, {} errors so far",
            report.batch_sequence, artifact_type, stats.success, stats.error
        );
        self.evaluation_reports.push(report);
        Ok(())
    }

    /// Record a batch that was cancelled before it could merge
    pub fn record_cancelled(&mut self, batch_sequence: u64, item_count: usize) -> Result<(), AggregatorError> {
        if self.finalized.is_some() {
            return Err(AggregatorError::FinalizedRun);
        }
        if !self.seen_batches.insert(batch_sequence) {
            return Err(AggregatorError::DuplicateBatch(batch_sequence));
        }
        self.cancelled_batches.push(batch_sequence);
        self.cancelled_items += item_count;
        Ok(())
    }

    /// Freeze the run. Later calls return the stored result unchanged.
    pub fn finalize(&mut self) -> Result<RunResult, AggregatorError> {
        if let Some(result) = &self.finalized {
            return Ok(result.clone());
        }

        let accounted: usize = self
            .per_type_stats
            .values()
            .map(|stats| stats.success + stats.error)
            .sum();
        if accounted != self.total_items {
            return Err(AggregatorError::InventoryMismatch {
                total_items: self.total_items,
                accounted,
            });
        }

        let result = RunResult {
            by_type: self.by_type.clone(),
            metadata: RunMetadata {
                run_id: self.run_id.clone(),
                started_at: self.started_at.clone(),
                total_items: self.total_items,
                total_errors: self.errors.clone(),
                total_warnings: self.warnings,
                per_type_stats: self.per_type_stats.clone(),
                evaluation_reports: self.evaluation_reports.clone(),
                cancelled_batches: self.cancelled_batches.clone(),
                cancelled_items: self.cancelled_items,
                duration: self.started.elapsed(),
            },
        };
        self.finalized = Some(result.clone());
        Ok(result)
    }
}
