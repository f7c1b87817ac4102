/*!
 * Run output.
 *
 * Layout of the output directory:
 *
 * ```text
 * <dir>/translation_results.json              statements per type + metadata
 * <dir>/results_summary.json                  run summary
 * <dir>/evaluation_results/evaluation_batch_<seq>_<type>.json
 * <dir>/<type>.sql                            sql and combined formats
 * <dir>/results.json                          json and combined formats
 * ```
 */

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::file_utils::FileManager;
use crate::pipeline::{RunResult, TypeStats};
use crate::validation::sql_text::trim_terminator;

/// How translated statements are written
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `<type>.sql` file per artifact type
    #[default]
    Sql,
    /// A single `results.json`
    Json,
    /// Both
    Combined,
}

impl OutputFormat {
    pub fn writes_sql(&self) -> bool {
        matches!(self, Self::Sql | Self::Combined)
    }

    pub fn writes_json(&self) -> bool {
        matches!(self, Self::Json | Self::Combined)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sql => "sql",
            Self::Json => "json",
            Self::Combined => "combined",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sql" => Ok(Self::Sql),
            "json" => Ok(Self::Json),
            "combined" => Ok(Self::Combined),
            _ => Err(anyhow!("Invalid output format: {}", s)),
        }
    }
}

/// Human-oriented digest of a run, persisted as `results_summary.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub total_items: usize,
    pub successful: usize,
    pub failed: usize,
    pub invalid: usize,
    pub warnings: usize,
    pub cancelled_batches: usize,
    pub cancelled_items: usize,
    pub manual_review_types: Vec<String>,
    pub per_type: BTreeMap<String, TypeStats>,
    pub duration_secs: f64,
    pub output_format: OutputFormat,
}

impl RunSummary {
    pub fn from_result(result: &RunResult, output_format: OutputFormat) -> Self {
        let metadata = &result.metadata;
        Self {
            run_id: metadata.run_id.clone(),
            started_at: metadata.started_at.clone(),
            total_items: metadata.total_items,
            successful: metadata.success_count(),
            failed: metadata.error_count(),
            invalid: metadata.invalid_count(),
            warnings: metadata.total_warnings,
            cancelled_batches: metadata.cancelled_batches.len(),
            cancelled_items: metadata.cancelled_items,
            manual_review_types: metadata
                .manual_review_types()
                .into_iter()
                .map(str::to_string)
                .collect(),
            per_type: metadata.per_type_stats.clone(),
            duration_secs: metadata.duration.as_secs_f64(),
            output_format,
        }
    }

    /// Multi-line text for the terminal
    pub fn render(&self) -> String {
        let mut text = format!(
            "Run {}: {} item(s), {} translated, {} failed, {} invalid, {} warning(s) in {:.1}s",
            self.run_id,
            self.total_items,
            self.successful,
            self.failed,
            self.invalid,
            self.warnings,
            self.duration_secs
        );
        for (artifact_type, stats) in &self.per_type {
            text.push_str(&format!(
                "\n  {:<20} {:>4} ok {:>4} failed {:>4} invalid",
                artifact_type, stats.success, stats.error, stats.invalid
            ));
        }
        if !self.manual_review_types.is_empty() {
            text.push_str(&format!("\n  Manual review required: {}", self.manual_review_types.join(", ")));
        }
        if self.cancelled_batches > 0 {
            text.push_str(&format!(
                "\n  Cancelled: {} batch(es), {} item(s)",
                self.cancelled_batches, self.cancelled_items
            ));
        }
        text
    }
}

/// Writes a finished run to disk
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every output file, returning the paths written
    pub fn write(&self, result: &RunResult) -> Result<Vec<PathBuf>> {
        FileManager::ensure_dir(&self.output_dir)?;
        let mut written = Vec::new();

        let evaluation_dir = self.output_dir.join("evaluation_results");
        for report in result
            .metadata
            .evaluation_reports
            .iter()
            .filter(|report| report.evaluated_count > 0)
        {
            let path = evaluation_dir.join(format!(
                "evaluation_batch_{:04}_{}.json",
                report.batch_sequence, report.artifact_type
            ));
            FileManager::write_json(&path, report)?;
            written.push(path);
        }

        let path = self.output_dir.join("translation_results.json");
        FileManager::write_json(&path, &result.output_document())?;
        written.push(path);

        let summary = RunSummary::from_result(result, self.format);
        let path = self.output_dir.join("results_summary.json");
        FileManager::write_json(&path, &summary)?;
        written.push(path);

        if self.format.writes_sql() {
            for (artifact_type, statements) in result.by_type.iter().filter(|(_, statements)| !statements.is_empty()) {
                let path = self.output_dir.join(format!("{}.sql", artifact_type));
                FileManager::write_to_file(&path, &Self::render_sql(artifact_type, statements))?;
                written.push(path);
            }
        }

        if self.format.writes_json() {
            let path = self.output_dir.join("results.json");
            FileManager::write_json(&path, &result.by_type)?;
            written.push(path);
        }

        debug!("Wrote {} file(s)", written.len());
        info!("Results written to {:?}", self.output_dir);
        Ok(written)
    }

    /// Render the statements of one artifact type as a SQL script
    pub fn render_sql(artifact_type: &str, statements: &[String]) -> String {
        let mut script = format!("-- {} DDL - Generated by ddlport\n", artifact_type.to_uppercase());
        for (index, statement) in statements.iter().enumerate() {
            script.push_str(&format!("\n-- Statement {}\n{};\n", index + 1, trim_terminator(statement)));
        }
        script
    }
}
