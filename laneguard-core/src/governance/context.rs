use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{RiskLevel, RollbackStrategy};

/// Kind of filesystem mutation requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[serde(alias = "create")]
    Add,
    #[serde(alias = "update", alias = "write")]
    Modify,
    #[serde(alias = "remove")]
    Delete,
    #[serde(alias = "rename")]
    Move,
}

impl OperationKind {
    /// Whether the operation writes new bytes to its target path.
    pub const fn writes_content(self) -> bool {
        matches!(self, OperationKind::Add | OperationKind::Modify)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Add => write!(f, "add"),
            OperationKind::Modify => write!(f, "modify"),
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::Move => write!(f, "move"),
        }
    }
}

/// Evidence that a write is being carried out through SIP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipMetadata {
    pub temp_file: Option<PathBuf>,
    pub checksum_before: Option<String>,
    pub checksum_after: Option<String>,
}

/// Caller-supplied facts about a request. Everything is optional; absent
/// facts count against auto-approval rather than for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Present for requests that belong to a Work Order; forces BACKGROUND.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_strategy: Option<RollbackStrategy>,
    #[serde(default)]
    pub similar_change_approved: bool,
    /// Set once the router has granted Mission-Scope auto-approval. Turns
    /// content-scan matches into warnings.
    #[serde(default)]
    pub auto_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sip: Option<SipMetadata>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wo_id(mut self, wo_id: impl Into<String>) -> Self {
        self.wo_id = Some(wo_id.into());
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk_level = Some(risk);
        self
    }

    pub fn with_rollback(mut self, strategy: RollbackStrategy) -> Self {
        self.rollback_strategy = Some(strategy);
        self
    }

    pub fn with_rollback_opt(mut self, strategy: Option<RollbackStrategy>) -> Self {
        self.rollback_strategy = strategy;
        self
    }

    pub fn similar_change_approved(mut self, approved: bool) -> Self {
        self.similar_change_approved = approved;
        self
    }

    pub fn auto_approved(mut self, approved: bool) -> Self {
        self.auto_approved = approved;
        self
    }

    pub fn with_sip(mut self, sip: SipMetadata) -> Self {
        self.sip = Some(sip);
        self
    }

    pub fn has_work_order(&self) -> bool {
        self.wo_id
            .as_deref()
            .is_some_and(|wo_id| !wo_id.trim().is_empty())
    }
}
