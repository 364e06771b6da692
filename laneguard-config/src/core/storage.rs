use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::storage;

/// Audit trail sinks.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// When false no audit records are written, and privileged auto-approval
    /// is never granted.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_audit_dir")]
    pub directory: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            directory: default_audit_dir(),
        }
    }
}

/// Work Order inbox layout. All paths are relative to the installation root
/// unless absolute.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WorkOrdersConfig {
    #[serde(default = "default_inbox")]
    pub inbox: PathBuf,

    #[serde(default = "default_processed")]
    pub processed: PathBuf,

    #[serde(default = "default_error")]
    pub error: PathBuf,

    /// Inbox consumed by the CLC executor (STRICT lane).
    #[serde(default = "default_clc_inbox")]
    pub clc_inbox: PathBuf,

    /// Rollback snapshots, one subdirectory per Work Order.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

impl Default for WorkOrdersConfig {
    fn default() -> Self {
        Self {
            inbox: default_inbox(),
            processed: default_processed(),
            error: default_error(),
            clc_inbox: default_clc_inbox(),
            backup_dir: default_backup_dir(),
        }
    }
}

#[inline]
const fn default_true() -> bool {
    true
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from(storage::AUDIT_DIR)
}

fn default_inbox() -> PathBuf {
    PathBuf::from(storage::INBOX_DIR)
}

fn default_processed() -> PathBuf {
    PathBuf::from(storage::PROCESSED_DIR)
}

fn default_error() -> PathBuf {
    PathBuf::from(storage::ERROR_DIR)
}

fn default_clc_inbox() -> PathBuf {
    PathBuf::from(storage::CLC_INBOX_DIR)
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(storage::BACKUP_DIR)
}
