/*!
 * Dual-mode statement evaluation.
 *
 * The evaluator applies the validation method configured for an artifact
 * type to the successful statements of one batch:
 *
 * - `skipped`: every statement passes with a manual-review warning
 * - `syntax_only`: each statement must parse under the target dialect;
 *   statement kinds the parser has no grammar for pass with a warning
 * - `syntax_and_semantic`: parsing statements are additionally scored by the
 *   semantic judge, whose verdicts never invalidate a statement
 *
 * Only blocking findings (syntax errors) make a statement invalid. Judge
 * failures degrade to warnings; they never abort the batch.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::app_config::Config;
use crate::artifacts::RecordRef;
use crate::errors::ParseError;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::retry::{RetryPolicy, call_with_retry};

use super::findings::{EvaluationReport, StatementEvaluation, ValidationFinding};
use super::judge::{JudgeVerdict, SemanticJudge};
use super::policy::{PolicyTable, ValidationMethod};
use super::syntax::SyntaxParser;

/// A successfully translated statement awaiting evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStatement {
    pub record: RecordRef,
    pub statement: String,
}

/// Tunables for the evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorSettings {
    pub target_dialect: String,
    pub compliance_threshold: f64,
    pub best_practice_threshold: f64,
    pub judge_batch_size: usize,
    pub judge_retry: RetryPolicy,
    pub call_timeout: Duration,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            target_dialect: "databricks".to_string(),
            compliance_threshold: 70.0,
            best_practice_threshold: 50.0,
            judge_batch_size: 5,
            judge_retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(300),
        }
    }
}

impl EvaluatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_dialect: config.target_dialect.clone(),
            compliance_threshold: config.validation.compliance_threshold,
            best_practice_threshold: config.validation.best_practice_threshold,
            judge_batch_size: config.validation.judge_batch_size.max(1),
            judge_retry: config.retry.judge.to_policy(),
            call_timeout: config.processing.call_timeout(),
        }
    }
}

/// Stateless per-batch evaluator
#[derive(Debug, Clone)]
pub struct Evaluator {
    parser: Arc<dyn SyntaxParser>,
    judge: Option<Arc<dyn SemanticJudge>>,
    policies: PolicyTable,
    settings: EvaluatorSettings,
}

impl Evaluator {
    pub fn new(parser: Arc<dyn SyntaxParser>, policies: PolicyTable, settings: EvaluatorSettings) -> Self {
        Self {
            parser,
            judge: None,
            policies,
            settings,
        }
    }

    /// Attach the semantic judge used for `syntax_and_semantic` types
    pub fn with_judge(mut self, judge: Arc<dyn SemanticJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn method_for(&self, artifact_type: &str) -> ValidationMethod {
        self.policies.method_for(artifact_type)
    }

    /// Evaluate the successful statements of one batch
    pub async fn evaluate(
        &self,
        batch_sequence: u64,
        artifact_type: &str,
        statements: &[CandidateStatement],
        cancel: &CancelToken,
    ) -> EvaluationReport {
        let method = self.method_for(artifact_type);

        let per_statement = match method {
            ValidationMethod::Skipped => statements
                .iter()
                .map(|candidate| {
                    let mut evaluation = StatementEvaluation::new(candidate.record.clone());
                    evaluation.push(ValidationFinding::warning(format!(
                        "Automated validation is skipped for {}: manual review required",
                        artifact_type
                    )));
                    evaluation
                })
                .collect(),
            ValidationMethod::SyntaxOnly => self.check_syntax(statements),
            ValidationMethod::SyntaxAndSemantic => {
                let mut evaluations = self.check_syntax(statements);
                self.check_semantics(artifact_type, statements, &mut evaluations, cancel)
                    .await;
                evaluations
            }
        };

        let report = EvaluationReport::from_statements(batch_sequence, artifact_type, method, per_statement);
        debug!(
            "Batch {} ({}): {} evaluated, {} valid, {} invalid via {}",
            batch_sequence, artifact_type, report.evaluated_count, report.valid_count, report.invalid_count, method
        );
        report
    }

    fn check_syntax(&self, statements: &[CandidateStatement]) -> Vec<StatementEvaluation> {
        statements
            .iter()
            .map(|candidate| {
                let mut evaluation = StatementEvaluation::new(candidate.record.clone());
                match self
                    .parser
                    .parse_and_transpile(&candidate.statement, &self.settings.target_dialect)
                {
                    Ok(_) => {}
                    Err(ParseError::Unsupported(what)) => evaluation.push(ValidationFinding::warning(format!(
                        "Parser cannot check {}: manual review required",
                        what
                    ))),
                    Err(e) => evaluation.push(ValidationFinding::syntax_error(format!("Syntax error: {}", e))),
                }
                evaluation
            })
            .collect()
    }

    async fn check_semantics(
        &self,
        artifact_type: &str,
        statements: &[CandidateStatement],
        evaluations: &mut [StatementEvaluation],
        cancel: &CancelToken,
    ) {
        // Statements that failed to parse never reach the judge
        let parsed: Vec<usize> = evaluations
            .iter()
            .enumerate()
            .filter(|(_, evaluation)| evaluation.is_valid)
            .map(|(index, _)| index)
            .collect();

        if parsed.is_empty() {
            return;
        }

        let Some(judge) = &self.judge else {
            for index in parsed {
                evaluations[index].push(ValidationFinding::warning(
                    "Semantic evaluation unavailable: no judge configured",
                ));
            }
            return;
        };

        for chunk in parsed.chunks(self.settings.judge_batch_size.max(1)) {
            let texts: Vec<String> = chunk.iter().map(|index| statements[*index].statement.clone()).collect();
            let label = format!("judge({}, {} statement(s))", artifact_type, texts.len());

            let result = call_with_retry(
                &label,
                &self.settings.judge_retry,
                self.settings.call_timeout,
                cancel,
                || judge.judge(artifact_type, &texts),
            )
            .await;

            match result {
                Ok(verdicts) if verdicts.len() == chunk.len() => {
                    for (index, verdict) in chunk.iter().zip(verdicts) {
                        self.apply_verdict(&mut evaluations[*index], verdict);
                    }
                }
                Ok(verdicts) => {
                    warn!(
                        "{} returned {} verdict(s) for {} statement(s)",
                        label,
                        verdicts.len(),
                        chunk.len()
                    );
                    for index in chunk {
                        evaluations[*index].push(ValidationFinding::warning(
                            "Semantic evaluation unavailable: judge reply did not match the request",
                        ));
                    }
                }
                Err(failure) => {
                    for index in chunk {
                        evaluations[*index].push(ValidationFinding::warning(format!(
                            "Semantic evaluation unavailable: {}",
                            failure.message()
                        )));
                    }
                }
            }
        }
    }

    fn apply_verdict(&self, evaluation: &mut StatementEvaluation, verdict: JudgeVerdict) {
        evaluation.compliance_score = Some(verdict.compliance_score);
        evaluation.best_practice_score = Some(verdict.best_practice_score);

        if verdict.compliance_score < self.settings.compliance_threshold {
            let mut message = format!(
                "Compliance score {:.0} is below the threshold of {:.0}",
                verdict.compliance_score, self.settings.compliance_threshold
            );
            if !verdict.findings.is_empty() {
                message.push_str(": ");
                message.push_str(&verdict.findings.join("; "));
            }
            evaluation.push(ValidationFinding::semantic_issue(message));
        }

        if verdict.best_practice_score < self.settings.best_practice_threshold {
            evaluation.push(ValidationFinding::warning(format!(
                "Best-practice score {:.0} is below the threshold of {:.0}",
                verdict.best_practice_score, self.settings.best_practice_threshold
            )));
        }
    }
}
