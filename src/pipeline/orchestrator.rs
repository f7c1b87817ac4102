/*!
 * Batch orchestration.
 *
 * Each batch moves through Route -> Translate -> Evaluate -> Merge. Batches
 * run concurrently up to `max_concurrent_batches`; the stages inside one
 * batch run in sequence. Workers never touch run state: each finished batch
 * is sent to a single aggregation task, which buffers early arrivals and
 * merges strictly in dispatch order.
 *
 * Translator calls go through `call_with_retry`. When the whole-batch call
 * cannot be completed, records are retried one at a time so a single bad
 * record does not take its neighbours down with it.
 */

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::app_config::Config;
use crate::artifacts::{ArtifactRecord, Batch, BatchContext, RecordRef};
use crate::errors::{AggregatorError, CapabilityError, RunError};
use crate::translation::{ErrorKind, TranslationOutcome, TranslationReply, Translator};
use crate::validation::sql_text::clean_statement;
use crate::validation::{CandidateStatement, EvaluationReport, Evaluator};

use super::aggregator::{RunAggregator, RunResult};
use super::cancel::CancelToken;
use super::retry::{CallFailure, RetryPolicy, call_with_retry};
use super::router::Router;

/// Tunables for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub max_concurrent_batches: usize,
    pub translator_retry: RetryPolicy,
    pub call_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_batches: 5,
            translator_retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(300),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_batches: config.processing.max_concurrent_batches.max(1),
            translator_retry: config.retry.translator.to_policy(),
            call_timeout: config.processing.call_timeout(),
        }
    }
}

/// A finished batch, as delivered to the aggregation task
#[derive(Debug)]
enum BatchMessage {
    Completed {
        sequence: u64,
        artifact_type: String,
        outcomes: Vec<TranslationOutcome>,
        report: EvaluationReport,
    },
    Cancelled {
        sequence: u64,
        item_count: usize,
    },
}

impl BatchMessage {
    fn sequence(&self) -> u64 {
        match self {
            Self::Completed { sequence, .. } | Self::Cancelled { sequence, .. } => *sequence,
        }
    }

    fn cancelled(batch: &Batch) -> Self {
        Self::Cancelled {
            sequence: batch.sequence(),
            item_count: batch.len(),
        }
    }
}

/// Drives batches through routing, translation, evaluation and aggregation
#[derive(Debug, Clone)]
pub struct Orchestrator {
    router: Arc<Router>,
    evaluator: Arc<Evaluator>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(router: Router, evaluator: Evaluator, settings: OrchestratorSettings) -> Self {
        Self {
            router: Arc::new(router),
            evaluator: Arc::new(evaluator),
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Process `batches` and return the finalized run
    pub async fn run(&self, batches: Vec<Batch>, cancel: &CancelToken) -> Result<RunResult, RunError> {
        self.run_with_progress(batches, cancel, |_, _| {}).await
    }

    /// Like `run`, calling `progress_callback(finished, total)` after every batch
    pub async fn run_with_progress(
        &self,
        batches: Vec<Batch>,
        cancel: &CancelToken,
        progress_callback: impl Fn(usize, usize) + Clone + Send + 'static,
    ) -> Result<RunResult, RunError> {
        if batches.is_empty() {
            return Err(RunError::NoBatches);
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = batches.iter().find(|batch| !seen.insert(batch.sequence())) {
            return Err(AggregatorError::DuplicateBatch(duplicate.sequence()).into());
        }

        let total_batches = batches.len();
        let dispatch_order: Vec<u64> = batches.iter().map(Batch::sequence).collect();
        let (sender, receiver) = mpsc::channel(total_batches);
        let aggregation = tokio::spawn(aggregate(receiver, dispatch_order));

        info!(
            "Dispatching {} batch(es) with up to {} in flight",
            total_batches, self.settings.max_concurrent_batches
        );

        let finished = AtomicUsize::new(0);
        let finished = &finished;
        stream::iter(batches)
            .for_each_concurrent(self.settings.max_concurrent_batches.max(1), |batch| {
                let sender = sender.clone();
                let progress_callback = progress_callback.clone();
                async move {
                    let message = self.process_batch(batch, cancel).await;
                    let sequence = message.sequence();
                    if sender.send(message).await.is_err() {
                        warn!("Aggregation stopped before batch {} could be delivered", sequence);
                    }
                    let current = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    progress_callback(current, total_batches);
                }
            })
            .await;
        drop(sender);

        let result = aggregation
            .await
            .map_err(|e| RunError::AggregatorStopped(e.to_string()))??;

        check_reachability(&result)?;
        Ok(result)
    }

    /// Run one batch to completion, or to cancellation
    async fn process_batch(&self, batch: Batch, cancel: &CancelToken) -> BatchMessage {
        if cancel.is_cancelled() {
            return BatchMessage::cancelled(&batch);
        }

        let sequence = batch.sequence();
        let artifact_type = batch.artifact_type().to_string();

        let translator = match self.router.route(&batch) {
            Ok(translator) => translator,
            Err(error) => {
                warn!("Batch {}: {}", sequence, error);
                let outcomes = batch
                    .record_refs()
                    .into_iter()
                    .map(|record| {
                        TranslationOutcome::failure(record, ErrorKind::UnknownArtifactType, &artifact_type, error.to_string())
                    })
                    .collect();
                let report = EvaluationReport::empty(sequence, &artifact_type, self.evaluator.method_for(&artifact_type));
                return BatchMessage::Completed {
                    sequence,
                    artifact_type,
                    outcomes,
                    report,
                };
            }
        };

        debug!(
            "Batch {} ({}, {} record(s)) routed to {}",
            sequence,
            artifact_type,
            batch.len(),
            translator.name()
        );

        let Some(outcomes) = self.translate_batch(translator.as_ref(), &batch, cancel).await else {
            info!("Batch {} cancelled during translation", sequence);
            return BatchMessage::cancelled(&batch);
        };

        let candidates: Vec<CandidateStatement> = outcomes
            .iter()
            .filter_map(|outcome| {
                outcome.statement().map(|statement| CandidateStatement {
                    record: outcome.record().clone(),
                    statement: statement.to_string(),
                })
            })
            .collect();
        let report = self.evaluator.evaluate(sequence, &artifact_type, &candidates, cancel).await;

        if cancel.is_cancelled() {
            info!("Batch {} cancelled during evaluation", sequence);
            return BatchMessage::cancelled(&batch);
        }

        BatchMessage::Completed {
            sequence,
            artifact_type,
            outcomes,
            report,
        }
    }

    /// Translate a whole batch, falling back to one record at a time.
    ///
    /// Returns `None` when the run is cancelled.
    async fn translate_batch(
        &self,
        translator: &dyn Translator,
        batch: &Batch,
        cancel: &CancelToken,
    ) -> Option<Vec<TranslationOutcome>> {
        let artifact_type = batch.artifact_type();
        let items = batch.items();
        let context = batch.context();
        let label = format!("translate(batch {}, {})", batch.sequence(), artifact_type);

        let whole = call_with_retry(
            &label,
            &self.settings.translator_retry,
            self.settings.call_timeout,
            cancel,
            || async move { translate_exact(translator, artifact_type, items, context).await },
        )
        .await;

        let failure = match whole {
            Ok(replies) => {
                return Some(
                    batch
                        .record_refs()
                        .into_iter()
                        .zip(replies)
                        .map(|(record, reply)| bind_reply(record, artifact_type, reply))
                        .collect(),
                );
            }
            Err(CallFailure::Cancelled) => return None,
            Err(failure) => failure,
        };

        if batch.len() == 1 {
            return Some(vec![failure_outcome(batch.record_ref(0), artifact_type, &failure)]);
        }

        warn!(
            "{} failed ({}); translating its {} records individually",
            label,
            failure.message(),
            batch.len()
        );

        let mut outcomes = Vec::with_capacity(batch.len());
        for (index, record) in items.iter().enumerate() {
            let record_label = format!("{} record '{}'", label, record.name());
            let single = std::slice::from_ref(record);

            let result = call_with_retry(
                &record_label,
                &self.settings.translator_retry,
                self.settings.call_timeout,
                cancel,
                || async move { translate_exact(translator, artifact_type, single, context).await },
            )
            .await;

            let record_ref = batch.record_ref(index);
            let outcome = match result {
                Ok(mut replies) => match replies.pop() {
                    Some(reply) => bind_reply(record_ref, artifact_type, reply),
                    None => failure_outcome(
                        record_ref,
                        artifact_type,
                        &CallFailure::Permanent(CapabilityError::permanent("translator returned no reply")),
                    ),
                },
                Err(CallFailure::Cancelled) => return None,
                Err(failure) => failure_outcome(record_ref, artifact_type, &failure),
            };
            outcomes.push(outcome);
        }

        Some(outcomes)
    }
}

/// One translator call that must answer every record
async fn translate_exact(
    translator: &dyn Translator,
    artifact_type: &str,
    records: &[ArtifactRecord],
    context: &BatchContext,
) -> Result<Vec<TranslationReply>, CapabilityError> {
    let replies = translator.translate(artifact_type, records, context).await?;
    if replies.len() != records.len() {
        return Err(CapabilityError::permanent(format!(
            "translator returned {} outcome(s) for {} record(s)",
            replies.len(),
            records.len()
        )));
    }
    Ok(replies)
}

fn bind_reply(record: RecordRef, artifact_type: &str, reply: TranslationReply) -> TranslationOutcome {
    match reply {
        TranslationReply::Translated(statement) => {
            let statement = clean_statement(&statement);
            if statement.is_empty() {
                TranslationOutcome::failure(record, ErrorKind::TranslationError, artifact_type, "translator returned an empty statement")
            } else {
                TranslationOutcome::success(record, statement)
            }
        }
        rejected => TranslationOutcome::from_reply(record, artifact_type, rejected),
    }
}

fn failure_outcome(record: RecordRef, artifact_type: &str, failure: &CallFailure) -> TranslationOutcome {
    let kind = match failure {
        CallFailure::Exhausted { .. } => ErrorKind::TransientExhausted,
        _ => ErrorKind::TranslationError,
    };
    TranslationOutcome::failure(record, kind, artifact_type, failure.message())
}

/// Single owner of the run state: merges batches in dispatch order
async fn aggregate(mut receiver: mpsc::Receiver<BatchMessage>, dispatch_order: Vec<u64>) -> Result<RunResult, RunError> {
    let mut aggregator = RunAggregator::new();
    let mut pending: BTreeMap<u64, BatchMessage> = BTreeMap::new();
    let mut next = 0;

    while let Some(message) = receiver.recv().await {
        pending.insert(message.sequence(), message);

        while let Some(message) = dispatch_order.get(next).and_then(|sequence| pending.remove(sequence)) {
            match message {
                BatchMessage::Completed {
                    artifact_type,
                    outcomes,
                    report,
                    ..
                } => aggregator.merge(&artifact_type, outcomes, report)?,
                BatchMessage::Cancelled { sequence, item_count } => aggregator.record_cancelled(sequence, item_count)?,
            }
            next += 1;
        }

        if !pending.is_empty() {
            debug!("{} batch(es) waiting for batch {} to merge", pending.len(), dispatch_order[next]);
        }
    }

    if next < dispatch_order.len() {
        return Err(RunError::AggregatorStopped(format!(
            "batch {} never reported back",
            dispatch_order[next]
        )));
    }

    Ok(aggregator.finalize()?)
}

/// Fail the run when every merged record exhausted its transient retries
fn check_reachability(result: &RunResult) -> Result<(), RunError> {
    let metadata = &result.metadata;
    if metadata.total_items == 0 || metadata.total_errors.len() != metadata.total_items {
        return Ok(());
    }
    if !metadata
        .total_errors
        .iter()
        .all(|error| error.kind == ErrorKind::TransientExhausted)
    {
        return Ok(());
    }

    Err(RunError::CapabilityUnreachable {
        batches: metadata.per_type_stats.values().map(|stats| stats.batches).sum(),
        last_error: metadata
            .total_errors
            .last()
            .map(|error| error.message.clone())
            .unwrap_or_default(),
    })
}
