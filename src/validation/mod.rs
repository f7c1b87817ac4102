/*!
 * Validation of translated DDL statements.
 *
 * # Architecture
 *
 * - `policy`: artifact type to validation method table
 * - `syntax`: deterministic parser seam, backed by `sqlparser`
 * - `judge`: semantic judge seam and its LLM implementation
 * - `evaluator`: applies the policy to a batch and produces an `EvaluationReport`
 * - `findings`: findings, severities and reports
 * - `sql_text`: statement and error message cleanup
 */

pub mod evaluator;
pub mod findings;
pub mod judge;
pub mod policy;
pub mod sql_text;
pub mod syntax;

// Re-export main types
pub use evaluator::{CandidateStatement, Evaluator, EvaluatorSettings};
pub use findings::{EvaluationReport, FindingKind, Severity, StatementEvaluation, ValidationFinding};
pub use judge::{JudgeVerdict, LlmJudge, SemanticJudge};
pub use policy::{PolicyTable, ValidationMethod};
pub use syntax::{NormalizedStatement, SqlParserValidator, SyntaxParser};
