/*!
 * Batch pipeline.
 *
 * - `router`: artifact type to translator table
 * - `orchestrator`: bounded-concurrency batch driver
 * - `aggregator`: run state, merged in dispatch order
 * - `retry`: retry/backoff/timeout wrapper for capability calls
 * - `cancel`: run-level cooperative cancellation
 */

pub mod aggregator;
pub mod cancel;
pub mod orchestrator;
pub mod retry;
pub mod router;

// Re-export main types
pub use aggregator::{RunAggregator, RunMetadata, RunResult, TypeStats};
pub use cancel::{CancelHandle, CancelToken, cancellation};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use retry::{CallFailure, RetryPolicy, call_with_retry};
pub use router::{Router, TranslatorHandle};
