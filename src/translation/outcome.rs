/*!
 * Per-record translation outcomes.
 */

use serde::{Deserialize, Serialize};

use crate::artifacts::RecordRef;

/// What a translator produced for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationReply {
    /// Target-dialect DDL
    Translated(String),
    /// The translator declined the record; the reason is kept
    Rejected(String),
}

impl TranslationReply {
    pub fn translated(statement: impl Into<String>) -> Self {
        Self::Translated(statement.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Final status of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    TranslationError,
}

/// Why a record ended in error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No translator registered for the batch's artifact type
    UnknownArtifactType,
    /// The translator rejected the record or failed permanently
    TranslationError,
    /// Transient failures outlasted the retry budget
    TransientExhausted,
}

/// A captured record-level error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub artifact_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordRef>,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, artifact_type: impl Into<String>, record: Option<RecordRef>, message: impl Into<String>) -> Self {
        Self {
            kind,
            artifact_type: artifact_type.into(),
            record,
            message: message.into(),
        }
    }
}

/// Outcome for exactly one input record. Exactly one of statement/error is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationOutcome {
    record: RecordRef,
    status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    statement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

impl TranslationOutcome {
    pub fn success(record: RecordRef, statement: impl Into<String>) -> Self {
        Self {
            record,
            status: OutcomeStatus::Success,
            statement: Some(statement.into()),
            error: None,
        }
    }

    /// Error outcome; the error is bound to this outcome's record
    pub fn failure(record: RecordRef, kind: ErrorKind, artifact_type: &str, message: impl Into<String>) -> Self {
        let error = ErrorInfo::new(kind, artifact_type, Some(record.clone()), message);
        Self {
            record,
            status: OutcomeStatus::TranslationError,
            statement: None,
            error: Some(error),
        }
    }

    /// Bind a translator reply to its record
    pub fn from_reply(record: RecordRef, artifact_type: &str, reply: TranslationReply) -> Self {
        match reply {
            TranslationReply::Translated(statement) => Self::success(record, statement),
            TranslationReply::Rejected(reason) => Self::failure(record, ErrorKind::TranslationError, artifact_type, reason),
        }
    }

    pub fn record(&self) -> &RecordRef {
        &self.record
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }
}
