use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::governance::{Lane, OperationKind, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Completed,
    Failed,
    Rejected,
    /// Some operations were handed to the STRICT lane and have not finished.
    Executing,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Rejected => "REJECTED",
            ExecutionStatus::Executing => "EXECUTING",
        };
        f.write_str(label)
    }
}

/// What happened to a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    Committed,
    Failed,
    Rejected,
    Delegated,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReport {
    pub path: String,
    pub operation: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<Lane>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    pub disposition: Disposition,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_after: Option<String>,
}

impl OperationReport {
    pub fn new(path: impl Into<String>, operation: OperationKind, disposition: Disposition) -> Self {
        Self {
            path: path.into(),
            operation,
            lane: None,
            zone: None,
            disposition,
            detail: String::new(),
            checksum_before: None,
            checksum_after: None,
        }
    }

    pub fn routed(mut self, lane: Lane, zone: Zone) -> Self {
        self.lane = Some(lane);
        self.zone = Some(zone);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_checksums(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.checksum_before = before;
        self.checksum_after = after;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegationState {
    Pending,
    Completed,
    Failed,
}

/// Operations handed to the STRICT lane as a derived work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEntry {
    pub wo_id: String,
    pub paths: Vec<String>,
    pub state: DelegationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Per-state operation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub committed: usize,
    pub failed: usize,
    pub rejected: usize,
    pub delegated: usize,
    pub rolled_back: usize,
    pub pending_delegations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub wo_id: String,
    pub status: ExecutionStatus,
    pub files_modified: Vec<String>,
    /// path -> (before, after); `None` stands for an absent file.
    pub checksums: IndexMap<String, (Option<String>, Option<String>)>,
    /// Wall-clock seconds.
    pub execution_time: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_log_path: Option<PathBuf>,
    #[serde(default)]
    pub operations: Vec<OperationReport>,
    #[serde(default)]
    pub delegated: Vec<DelegationEntry>,
}

impl ExecutionResult {
    pub fn new(wo_id: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            wo_id: wo_id.into(),
            status,
            files_modified: Vec::new(),
            checksums: IndexMap::new(),
            execution_time: 0.0,
            errors: Vec::new(),
            warnings: Vec::new(),
            audit_log_path: None,
            operations: Vec::new(),
            delegated: Vec::new(),
        }
    }

    /// A result for a work order that never reached execution.
    pub fn rejected(wo_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(wo_id, ExecutionStatus::Rejected);
        result.errors.push(error.into());
        result
    }

    /// Record a committed change: the path joins `files_modified` once and
    /// its checksum pair spans from the first before to the latest after.
    pub fn record_commit(&mut self, path: &str, before: Option<String>, after: Option<String>) {
        if !self.files_modified.iter().any(|existing| existing == path) {
            self.files_modified.push(path.to_string());
        }
        match self.checksums.get_mut(path) {
            Some(entry) => entry.1 = after,
            None => {
                self.checksums.insert(path.to_string(), (before, after));
            }
        }
    }

    /// Drop a path recorded by [`Self::record_commit`] once its write has
    /// been undone.
    pub fn forget_commit(&mut self, path: &str) {
        self.files_modified.retain(|existing| existing != path);
        self.checksums.shift_remove(path);
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn summary(&self) -> ResultSummary {
        let mut summary = ResultSummary::default();
        for op in &self.operations {
            match op.disposition {
                Disposition::Committed => summary.committed += 1,
                Disposition::Failed => summary.failed += 1,
                Disposition::Rejected => summary.rejected += 1,
                Disposition::Delegated => summary.delegated += 1,
                Disposition::RolledBack => summary.rolled_back += 1,
            }
        }
        summary.pending_delegations = self
            .delegated
            .iter()
            .filter(|entry| entry.state == DelegationState::Pending)
            .count();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repeated_commits_keep_first_before_and_latest_after() {
        let mut result = ExecutionResult::new("WO-1", ExecutionStatus::Completed);
        result.record_commit("apps/a.py", None, Some("h1".into()));
        result.record_commit("apps/a.py", Some("h1".into()), Some("h2".into()));
        assert_eq!(result.files_modified, vec!["apps/a.py".to_string()]);
        assert_eq!(result.checksums["apps/a.py"], (None, Some("h2".to_string())));
    }

    #[test]
    fn checksums_serialize_as_pairs() {
        let mut result = ExecutionResult::new("WO-1", ExecutionStatus::Failed);
        result.record_commit("a", Some("b".into()), None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["checksums"]["a"], serde_json::json!(["b", null]));
    }

    #[test]
    fn summary_counts_dispositions() {
        let mut result = ExecutionResult::new("WO-1", ExecutionStatus::Executing);
        result.operations = vec![
            OperationReport::new("a", OperationKind::Add, Disposition::Committed),
            OperationReport::new("b", OperationKind::Add, Disposition::Committed),
            OperationReport::new("c", OperationKind::Modify, Disposition::Delegated),
        ];
        result.delegated.push(DelegationEntry {
            wo_id: "WO-1-strict".into(),
            paths: vec!["c".into()],
            state: DelegationState::Pending,
            detail: None,
        });
        let summary = result.summary();
        assert_eq!(summary.committed, 2);
        assert_eq!(summary.delegated, 1);
        assert_eq!(summary.pending_delegations, 1);
    }
}
