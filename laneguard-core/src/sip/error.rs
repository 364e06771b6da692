use std::path::PathBuf;

use thiserror::Error;

use crate::governance::OperationKind;

/// Failures while applying a Safe Idempotent Patch. Every variant except
/// [`SipError::Integrity`] guarantees the target was left untouched.
#[derive(Debug, Error)]
pub enum SipError {
    #[error("I/O error while {stage} '{path}': {source}")]
    Io {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {waited_ms} ms waiting for the lock on '{path}'")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("integrity fault on '{path}': expected {expected}, found {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("SIP compliance check failed for '{path}': {issues}")]
    Compliance { path: PathBuf, issues: String },

    #[error("cannot {operation} '{path}': target does not exist")]
    MissingTarget {
        operation: OperationKind,
        path: PathBuf,
    },

    #[error("{operation} on '{path}' requires content")]
    MissingContent {
        operation: OperationKind,
        path: PathBuf,
    },

    #[error("'{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    #[error("invalid SIP request for '{path}': {reason}")]
    InvalidRequest { path: PathBuf, reason: String },
}

impl SipError {
    pub(crate) fn io(stage: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    /// A committed write whose bytes do not match what was written.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, SipError::Integrity { .. })
    }
}
