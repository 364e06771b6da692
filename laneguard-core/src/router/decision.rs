use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::auto_approve::AutoApproveConditions;
use crate::governance::{Lane, World, Zone};

pub const CLI_POLICY_DOCUMENTS: &[&str] = &[
    "governance/cli_world_policy.md",
    "governance/mission_scope.md",
];

pub const BACKGROUND_POLICY_DOCUMENTS: &[&str] = &[
    "governance/background_world_policy.md",
    "governance/sip_protocol.md",
    "governance/work_order_schema.md",
];

pub fn policy_documents(world: World) -> Vec<String> {
    let documents = match world {
        World::Cli => CLI_POLICY_DOCUMENTS,
        World::Background => BACKGROUND_POLICY_DOCUMENTS,
    };
    documents.iter().map(|doc| (*doc).to_string()).collect()
}

/// Outcome of routing one write request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub world: World,
    pub zone: Zone,
    pub lane: Lane,
    /// Lexically normalized absolute target.
    pub target: PathBuf,
    /// Target relative to the installation root, when inside it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    pub primary_writer: Option<String>,
    pub auto_approve_allowed: bool,
    /// Only evaluated for the privileged writer on the WARN lane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approve_conditions: Option<AutoApproveConditions>,
    pub rollback_required: bool,
    pub policy_documents: Vec<String>,
    pub reason: String,
}

impl RoutingDecision {
    pub fn is_blocked(&self) -> bool {
        self.lane == Lane::Blocked
    }
}
