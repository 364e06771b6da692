use std::path::PathBuf;

use thiserror::Error;

use crate::governance::{OperationKind, RiskLevel, World};

/// Structural problems with a work order. Any of these rejects the whole
/// order before a single operation runs.
#[derive(Debug, Error)]
pub enum WorkOrderError {
    #[error("failed to read work order '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} work order '{path}': {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("work order id must not be empty")]
    EmptyId,

    #[error("work order id '{wo_id}' may only contain letters, digits, '.', '-' and '_'")]
    InvalidId { wo_id: String },

    #[error("work order '{wo_id}' has no operations")]
    NoOperations { wo_id: String },

    #[error("work order '{wo_id}': {operation} on '{path}' requires content")]
    MissingContent {
        wo_id: String,
        path: String,
        operation: OperationKind,
    },

    #[error("work order '{wo_id}': move to '{path}' requires source_path")]
    MissingSource { wo_id: String, path: String },

    #[error("work order '{wo_id}': invalid path '{path}': {reason}")]
    InvalidPath {
        wo_id: String,
        path: String,
        reason: String,
    },

    #[error("work order '{wo_id}' targets DANGER zone path '{path}'")]
    DangerZoneTarget { wo_id: String, path: String },

    #[error("work order '{wo_id}' is {risk} risk but declares no rollback strategy")]
    MissingRollbackStrategy { wo_id: String, risk: RiskLevel },

    #[error("work order '{wo_id}' originates from {world}; only BACKGROUND orders are executed")]
    NotBackground { wo_id: String, world: World },
}

/// Failures moving work order files between inbox directories.
#[derive(Debug, Error)]
pub enum InboxError {
    #[error("I/O error while {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize work order '{wo_id}': {message}")]
    Serialize { wo_id: String, message: String },

    #[error("'{path}' has no file name")]
    NoFileName { path: PathBuf },
}
