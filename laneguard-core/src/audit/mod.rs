//! Audit trail: write-once execution records and the hash-chained decision
//! log.

mod decision_log;
mod execution_log;

use std::path::{Path, PathBuf};

use laneguard_config::GovernanceConfig;
use thiserror::Error;
use tracing::warn;

pub use decision_log::{DecisionEntry, DecisionKind, DecisionLog};
pub use execution_log::{ExecutionAuditLog, ExecutionRecord};

pub const EXECUTIONS_DIR: &str = "executions";
pub const DECISIONS_FILE: &str = "decisions.jsonl";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error while {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit record: {message}")]
    Serialize { message: String },

    #[error("malformed audit record in '{path}' at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl AuditError {
    pub(crate) fn io(action: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Both audit sinks behind the `[audit] enabled` switch.
#[derive(Debug)]
pub struct AuditTrail {
    executions: ExecutionAuditLog,
    decisions: DecisionLog,
    enabled: bool,
}

impl AuditTrail {
    pub fn open(dir: &Path, enabled: bool) -> Result<Self, AuditError> {
        Ok(Self {
            executions: ExecutionAuditLog::new(dir.join(EXECUTIONS_DIR)),
            decisions: DecisionLog::open(dir.join(DECISIONS_FILE))?,
            enabled,
        })
    }

    pub fn from_config(config: &GovernanceConfig) -> Result<Self, AuditError> {
        Self::open(&config.audit_dir(), config.audit.enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn executions(&self) -> &ExecutionAuditLog {
        &self.executions
    }

    pub fn decisions(&self) -> &DecisionLog {
        &self.decisions
    }

    /// Persist an execution record. `Ok(None)` when auditing is disabled.
    pub fn record_execution(&self, record: &ExecutionRecord) -> Result<Option<PathBuf>, AuditError> {
        if !self.enabled {
            return Ok(None);
        }
        self.executions.write(record).map(Some)
    }

    /// Append to the decision log. A failed append is logged and swallowed;
    /// the caller's result already carries the decision itself.
    pub fn note(&self, entry: DecisionEntry) {
        if !self.enabled {
            return;
        }
        let kind = entry.kind;
        if let Err(err) = self.decisions.log(entry) {
            warn!(%kind, error = %err, "failed to append to decision log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_trail_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let trail = AuditTrail::open(dir.path(), false).unwrap();
        trail.note(DecisionEntry::fault("a", "CLC", "IO", "boom"));
        let record = ExecutionRecord::from_result(
            &crate::work_order::ExecutionResult::rejected("WO-1", "bad"),
            None,
            "processor",
        );
        assert_eq!(trail.record_execution(&record).unwrap(), None);
        assert!(!dir.path().join(DECISIONS_FILE).exists());
        assert!(!dir.path().join(EXECUTIONS_DIR).exists());
    }

    #[test]
    fn enabled_trail_writes_both_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let trail = AuditTrail::open(dir.path(), true).unwrap();
        trail.note(DecisionEntry::fault("a", "CLC", "IO", "boom"));
        let record = ExecutionRecord::from_result(
            &crate::work_order::ExecutionResult::rejected("WO-1", "bad"),
            None,
            "processor",
        );
        let path = trail.record_execution(&record).unwrap().unwrap();
        assert!(path.starts_with(dir.path().join(EXECUTIONS_DIR)));
        assert_eq!(trail.decisions().entries().unwrap().len(), 1);
        assert!(trail.decisions().verify_integrity().unwrap());
    }
}
