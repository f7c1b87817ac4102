/*!
 * Error types for the ddlport application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions. Record-level failures
 * are never raised through these types; they are captured as data in the run
 * result. Only capability calls, aggregation invariants and run-level fatal
 * conditions surface as errors.
 */

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Network failures, timeouts, rate limits and server-side (5xx) errors are
    /// transient. Authentication, malformed responses and client (4xx) errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Failure class of an external capability call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Worth retrying (network, timeout, rate limit, 5xx)
    Transient,
    /// Retrying will not help
    Permanent,
}

/// Infrastructure failure raised by a Translator or SemanticJudge
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CapabilityError {
    class: FailureClass,
    message: String,
}

impl CapabilityError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Permanent,
            message: message.into(),
        }
    }

    /// A call that exceeded its deadline. Timeouts are always transient.
    pub fn timeout(after: Duration) -> Self {
        Self::transient(format!("call timed out after {}ms", after.as_millis()))
    }

    pub fn class(&self) -> FailureClass {
        self.class
    }

    pub fn is_transient(&self) -> bool {
        self.class == FailureClass::Transient
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ProviderError> for CapabilityError {
    fn from(error: ProviderError) -> Self {
        if error.is_transient() {
            Self::transient(error.to_string())
        } else {
            Self::permanent(error.to_string())
        }
    }
}

/// Errors raised when a batch cannot be constructed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Batch {sequence} for '{artifact_type}' has no records")]
    Empty { sequence: u64, artifact_type: String },
}

/// Errors raised by the Router
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    /// No translator is registered for the batch's artifact type
    #[error("Unknown artifact type: {0}")]
    UnknownArtifactType(String),
}

/// Errors raised by the deterministic SQL parser
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The target dialect is not known to the parser
    #[error("Unsupported target dialect: {0}")]
    UnsupportedDialect(String),

    /// The statement does not parse under the target dialect
    #[error("{0}")]
    Syntax(String),

    /// Nothing left to parse after cleaning
    #[error("Statement is empty")]
    Empty,

    /// Valid target SQL the parser has no grammar for. Not a syntax error.
    #[error("Parser cannot check {0}")]
    Unsupported(String),
}

/// Errors raised by the Aggregator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregatorError {
    /// `merge` was called after `finalize`
    #[error("Cannot merge into a finalized run")]
    FinalizedRun,

    /// Totals no longer add up
    #[error("Inventory mismatch: {total_items} items recorded but {accounted} accounted for")]
    InventoryMismatch { total_items: usize, accounted: usize },

    /// The same batch sequence was delivered twice
    #[error("Batch {0} was already merged")]
    DuplicateBatch(u64),
}

/// Run-level fatal conditions
#[derive(Error, Debug)]
pub enum RunError {
    /// Nothing valid to process
    #[error("No valid batches to process")]
    NoBatches,

    /// Every dispatched record failed on exhausted transient errors
    #[error("Capability unreachable: all {batches} batches exhausted their retries (last error: {last_error})")]
    CapabilityUnreachable { batches: usize, last_error: String },

    /// An aggregation invariant was violated
    #[error("Aggregation failed: {0}")]
    Aggregation(#[from] AggregatorError),

    /// The aggregation task stopped before the run completed
    #[error("Aggregation task stopped unexpectedly: {0}")]
    AggregatorStopped(String),
}
