use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::artifacts::{BatchLoader, LoadedBatches};
use crate::errors::RunError;
use crate::file_utils::FileManager;
use crate::output::{ResultWriter, RunSummary};
use crate::pipeline::{CancelToken, Orchestrator, OrchestratorSettings, Router, RunResult};
use crate::providers::create_provider;
use crate::translation::{EchoTranslator, LlmTranslator, Translator};
use crate::validation::{Evaluator, EvaluatorSettings, LlmJudge, PolicyTable, SemanticJudge, SqlParserValidator};

// @module: Application controller for DDL migration runs

/// What a completed run produced
#[derive(Debug)]
pub struct RunReport {
    pub result: RunResult,
    pub summary: RunSummary,
    pub written: Vec<PathBuf>,
    pub skipped_inputs: usize,
}

/// Main application controller: load, orchestrate, write
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Use the echo translator and no judge
    dry_run: bool,
    // @field: Translator override, used instead of the configured LLM
    translator: Option<Arc<dyn Translator>>,
    // @field: Judge override, used instead of the configured LLM
    judge: Option<Arc<dyn SemanticJudge>>,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self {
            config,
            dry_run: false,
            translator: None,
            judge: None,
        })
    }

    /// Swap the LLM capabilities for offline ones
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Use `translator` for every artifact type
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Use `judge` for semantic validation
    pub fn with_judge(mut self, judge: Arc<dyn SemanticJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Turn the input files into sequenced batches
    pub fn load_batches(&self, inputs: &[PathBuf]) -> Result<LoadedBatches> {
        let mut loader = BatchLoader::new(self.config.processing.batch_size)
            .with_context("source_dialect", self.config.source_dialect.clone())
            .with_context("target_dialect", self.config.target_dialect.clone());
        let loaded = loader.load_all(inputs)?;

        for skipped in &loaded.skipped {
            warn!("Skipped {:?}: {}", skipped.path, skipped.reason);
        }
        info!(
            "Loaded {} record(s) in {} batch(es) from {} input(s)",
            loaded.record_count,
            loaded.batches.len(),
            inputs.len()
        );
        Ok(loaded)
    }

    fn build_translator(&self) -> Result<Arc<dyn Translator>> {
        if let Some(translator) = &self.translator {
            return Ok(translator.clone());
        }
        if self.dry_run {
            info!("Dry run: statements are echoed from the source definitions");
            return Ok(Arc::new(EchoTranslator::new()));
        }

        let settings = &self.config.llm.translator;
        settings.validate_credentials("translator")?;
        let provider = create_provider(settings).context("Failed to create the translator provider")?;
        info!("Translator: {} - {}", settings.provider.display_name(), provider.model());
        Ok(Arc::new(
            LlmTranslator::new(provider, &self.config.source_dialect, &self.config.target_dialect)
                .with_temperature(settings.temperature)
                .with_max_tokens(settings.max_tokens),
        ))
    }

    fn build_judge(&self) -> Result<Option<Arc<dyn SemanticJudge>>> {
        if let Some(judge) = &self.judge {
            return Ok(Some(judge.clone()));
        }
        if self.dry_run || !self.config.uses_semantic_validation() {
            return Ok(None);
        }

        let settings = &self.config.llm.judge;
        settings.validate_credentials("judge")?;
        let provider = create_provider(settings).context("Failed to create the judge provider")?;
        info!("Judge: {} - {}", settings.provider.display_name(), provider.model());
        Ok(Some(Arc::new(
            LlmJudge::new(provider, &self.config.target_dialect)
                .with_temperature(settings.temperature)
                .with_max_tokens(settings.max_tokens),
        )))
    }

    /// Assemble router, evaluator and orchestrator from the configuration
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        let router = Router::for_known_types(self.build_translator()?);

        let mut evaluator = Evaluator::new(
            Arc::new(SqlParserValidator::new()),
            PolicyTable::from_config(&self.config.validation),
            EvaluatorSettings::from_config(&self.config),
        );
        if let Some(judge) = self.build_judge()? {
            evaluator = evaluator.with_judge(judge);
        }

        let skipped = evaluator.policies().skipped_types().join(", ");
        if !skipped.is_empty() {
            debug!("Validation skipped (manual review) for: {}", skipped);
        }

        Ok(Orchestrator::new(router, evaluator, OrchestratorSettings::from_config(&self.config)))
    }

    /// Run the whole migration for `inputs`, writing results to `output_dir`
    pub async fn run(&self, inputs: &[PathBuf], output_dir: &Path, cancel: &CancelToken) -> Result<RunReport> {
        let loaded = self.load_batches(inputs)?;
        if loaded.batches.is_empty() {
            return Err(RunError::NoBatches.into());
        }

        let orchestrator = self.build_orchestrator()?;

        let progress_bar = ProgressBar::new(loaded.batches.len() as u64);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message("Migrating");

        let pb = progress_bar.clone();
        let run = orchestrator
            .run_with_progress(loaded.batches, cancel, move |finished, _total| {
                pb.set_position(finished as u64);
            })
            .await;
        progress_bar.finish_and_clear();
        let result = run?;

        let writer = ResultWriter::new(output_dir, self.config.output.format);
        let written = writer.write(&result)?;
        let summary = RunSummary::from_result(&result, self.config.output.format);

        for line in summary.render().lines() {
            info!("{}", line);
        }

        let log_line = format!(
            "run {} - {} item(s), {} translated, {} failed, {} invalid",
            summary.run_id, summary.total_items, summary.successful, summary.failed, summary.invalid
        );
        if let Err(e) = FileManager::append_to_log_file(output_dir.join("ddlport.run.log"), &log_line) {
            warn!("Failed to append to the run log: {}", e);
        }

        Ok(RunReport {
            result,
            summary,
            written,
            skipped_inputs: loaded.skipped.len(),
        })
    }
}
