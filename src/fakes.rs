/*!
 * Deterministic capability fakes.
 *
 * These stand in for the translator, the parser and the judge in unit and
 * integration tests:
 * - `FakeTranslator` - scripted per-record behavior, with a call log
 * - `FakeParser` - accepts or rejects statements by predicate
 * - `FakeJudge` - fixed scores, or permanently unavailable
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::artifacts::{ArtifactRecord, BatchContext};
use crate::errors::{CapabilityError, ParseError};
use crate::translation::{TranslationReply, Translator};
use crate::validation::judge::{JudgeVerdict, SemanticJudge};
use crate::validation::syntax::{NormalizedStatement, SyntaxParser};

/// What the fake translator does for one record on one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FakeBehavior {
    /// Reply with this statement
    Translate(String),
    /// Reply with a rejection
    Reject(String),
    /// Never answer within any reasonable deadline
    Timeout,
    /// Fail the call with a transient error
    Unavailable,
    /// Fail the call with a permanent error
    Broken,
    /// Wait, then behave as the inner behavior
    Delay(Duration, Box<FakeBehavior>),
}

impl FakeBehavior {
    pub fn translate(statement: impl Into<String>) -> Self {
        Self::Translate(statement.into())
    }

    pub fn delayed(millis: u64, then: FakeBehavior) -> Self {
        Self::Delay(Duration::from_millis(millis), Box::new(then))
    }
}

type BehaviorFn = dyn Fn(&ArtifactRecord, usize) -> FakeBehavior + Send + Sync;

/// Scripted translator.
///
/// The behavior function receives the record and how many times that record
/// was requested before, so tests can script "fails twice, then succeeds".
#[derive(Clone)]
pub struct FakeTranslator {
    behavior: Arc<BehaviorFn>,
    short_replies: bool,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl fmt::Debug for FakeTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTranslator")
            .field("short_replies", &self.short_replies)
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

impl FakeTranslator {
    pub fn new(behavior: impl Fn(&ArtifactRecord, usize) -> FakeBehavior + Send + Sync + 'static) -> Self {
        Self {
            behavior: Arc::new(behavior),
            short_replies: false,
            attempts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Translate every record to `CREATE TABLE <name> (id INT)`
    pub fn translating() -> Self {
        Self::new(|record, _| FakeBehavior::Translate(format!("CREATE TABLE {} (id INT)", record.name())))
    }

    /// Every call fails transiently
    pub fn unavailable() -> Self {
        Self::new(|_, _| FakeBehavior::Unavailable)
    }

    /// Drop the last reply of every multi-record call
    pub fn with_short_replies(mut self) -> Self {
        self.short_replies = true;
        self
    }

    /// Record names of every call, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_behavior(&self, record: &ArtifactRecord) -> FakeBehavior {
        let previous = {
            let mut attempts = self.attempts.lock();
            let counter = attempts.entry(record.qualified_name().to_string()).or_insert(0);
            let previous = *counter;
            *counter += 1;
            previous
        };
        (self.behavior)(record, previous)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn translate(
        &self,
        _artifact_type: &str,
        records: &[ArtifactRecord],
        _context: &BatchContext,
    ) -> Result<Vec<TranslationReply>, CapabilityError> {
        self.calls
            .lock()
            .push(records.iter().map(|record| record.name().to_string()).collect());

        let mut replies = Vec::with_capacity(records.len());
        for record in records {
            let mut behavior = self.next_behavior(record);
            loop {
                match behavior {
                    FakeBehavior::Delay(delay, then) => {
                        tokio::time::sleep(delay).await;
                        behavior = *then;
                    }
                    FakeBehavior::Translate(statement) => {
                        replies.push(TranslationReply::Translated(statement));
                        break;
                    }
                    FakeBehavior::Reject(reason) => {
                        replies.push(TranslationReply::Rejected(reason));
                        break;
                    }
                    FakeBehavior::Timeout => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        return Err(CapabilityError::transient("fake translator hung"));
                    }
                    FakeBehavior::Unavailable => {
                        return Err(CapabilityError::transient(format!("{} is temporarily unavailable", record.name())));
                    }
                    FakeBehavior::Broken => {
                        return Err(CapabilityError::permanent(format!("{} cannot be translated", record.name())));
                    }
                }
            }
        }

        if self.short_replies && replies.len() > 1 {
            replies.pop();
        }
        Ok(replies)
    }
}

type AcceptFn = dyn Fn(&str) -> bool + Send + Sync;

/// Parser that accepts statements matching a predicate
#[derive(Clone)]
pub struct FakeParser {
    accepts: Arc<AcceptFn>,
    parsed: Arc<Mutex<Vec<String>>>,
}

impl fmt::Debug for FakeParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeParser").finish_non_exhaustive()
    }
}

impl FakeParser {
    pub fn new(accepts: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            accepts: Arc::new(accepts),
            parsed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn accepting_all() -> Self {
        Self::new(|_| true)
    }

    pub fn rejecting_all() -> Self {
        Self::new(|_| false)
    }

    /// Reject statements containing `needle`
    pub fn rejecting_containing(needle: &'static str) -> Self {
        Self::new(move |statement| !statement.contains(needle))
    }

    /// Every statement seen, in order
    pub fn parsed_statements(&self) -> Vec<String> {
        self.parsed.lock().clone()
    }
}

impl SyntaxParser for FakeParser {
    fn parse_and_transpile(&self, statement: &str, _target_dialect: &str) -> Result<NormalizedStatement, ParseError> {
        self.parsed.lock().push(statement.to_string());
        if (self.accepts)(statement) {
            Ok(NormalizedStatement {
                sql: statement.to_string(),
                statement_count: 1,
            })
        } else {
            Err(ParseError::Syntax(format!("unexpected token in '{}'", statement)))
        }
    }
}

/// Judge returning fixed scores, or failing every call
#[derive(Debug, Clone)]
pub struct FakeJudge {
    scores: Option<(f64, f64)>,
    calls: Arc<AtomicUsize>,
    judged: Arc<Mutex<Vec<String>>>,
}

impl FakeJudge {
    pub fn scoring(compliance_score: f64, best_practice_score: f64) -> Self {
        Self {
            scores: Some((compliance_score, best_practice_score)),
            calls: Arc::new(AtomicUsize::new(0)),
            judged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call fails transiently
    pub fn unavailable() -> Self {
        Self {
            scores: None,
            ..Self::scoring(0.0, 0.0)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every statement submitted, in order
    pub fn judged_statements(&self) -> Vec<String> {
        self.judged.lock().clone()
    }
}

#[async_trait]
impl SemanticJudge for FakeJudge {
    async fn judge(&self, _artifact_type: &str, statements: &[String]) -> Result<Vec<JudgeVerdict>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.judged.lock().extend(statements.iter().cloned());

        let (compliance_score, best_practice_score) = self
            .scores
            .ok_or_else(|| CapabilityError::transient("judge endpoint unavailable"))?;

        Ok(statements
            .iter()
            .map(|_| JudgeVerdict {
                compliance_score,
                best_practice_score,
                findings: Vec::new(),
            })
            .collect())
    }
}
