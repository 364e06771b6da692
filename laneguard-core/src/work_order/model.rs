use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::WorkOrderError;
use crate::governance::{
    OperationKind, RequestContext, RiskLevel, RollbackStrategy, World, Zone, canonical_actor,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub world: World,
    pub actor: String,
}

/// One requested file mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub path: String,
    pub operation: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl Operation {
    pub fn add(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: OperationKind::Add,
            content: Some(content.into()),
            source_path: None,
        }
    }

    pub fn modify(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            operation: OperationKind::Modify,
            ..Self::add(path, content)
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: OperationKind::Delete,
            content: None,
            source_path: None,
        }
    }

    pub fn move_from(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            path: destination.into(),
            operation: OperationKind::Move,
            content: None,
            source_path: Some(source.into()),
        }
    }

    /// Every path this operation touches: the target, then the move source.
    pub fn touched_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.path.as_str()).chain(self.source_path.as_deref())
    }
}

/// A batch of file operations with declared risk and rollback. Values are
/// never mutated once built; derived work orders are new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub wo_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub origin: Origin,
    #[serde(default)]
    pub target_paths: Vec<String>,
    #[serde(default)]
    pub zone_summary: IndexMap<String, Zone>,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_strategy: Option<RollbackStrategy>,
    #[serde(default)]
    pub similar_change_approved: bool,
    pub operations: Vec<Operation>,
}

impl WorkOrder {
    pub fn new(
        wo_id: impl Into<String>,
        world: World,
        actor: impl Into<String>,
        risk_level: RiskLevel,
        operations: Vec<Operation>,
    ) -> Self {
        let target_paths = operations.iter().map(|op| op.path.clone()).collect();
        Self {
            wo_id: wo_id.into(),
            created_at: Utc::now(),
            origin: Origin {
                world,
                actor: actor.into(),
            },
            target_paths,
            zone_summary: IndexMap::new(),
            risk_level,
            desired_state: None,
            change_type: None,
            rollback_strategy: None,
            similar_change_approved: false,
            operations,
        }
    }

    pub fn with_rollback(mut self, strategy: RollbackStrategy) -> Self {
        self.rollback_strategy = Some(strategy);
        self
    }

    pub fn with_similar_change_approved(mut self, approved: bool) -> Self {
        self.similar_change_approved = approved;
        self
    }

    pub fn with_desired_state(mut self, desired_state: impl Into<String>) -> Self {
        self.desired_state = Some(desired_state.into());
        self
    }

    /// Parse a work order, choosing the format from the file extension.
    /// Unknown extensions are read as YAML, which also accepts JSON.
    pub fn parse(content: &str, source: &Path) -> Result<Self, WorkOrderError> {
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => serde_json::from_str(content).map_err(|err| WorkOrderError::Parse {
                path: source.to_path_buf(),
                format: "json",
                message: err.to_string(),
            }),
            _ => serde_yaml::from_str(content).map_err(|err| WorkOrderError::Parse {
                path: source.to_path_buf(),
                format: "yaml",
                message: err.to_string(),
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, WorkOrderError> {
        let content = std::fs::read_to_string(path).map_err(|source| WorkOrderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Declared targets plus every path the operations touch, de-duplicated
    /// in first-seen order.
    pub fn all_paths(&self) -> Vec<&str> {
        let mut seen = indexmap::IndexSet::new();
        for path in self.target_paths.iter().map(String::as_str) {
            seen.insert(path);
        }
        for op in &self.operations {
            for path in op.touched_paths() {
                seen.insert(path);
            }
        }
        seen.into_iter().collect()
    }

    /// Request context the work order's operations are routed with.
    pub fn request_context(&self) -> RequestContext {
        let context = RequestContext::new()
            .with_risk(self.risk_level)
            .with_rollback_opt(self.rollback_strategy)
            .similar_change_approved(self.similar_change_approved);
        match self.origin.world {
            World::Background => context.with_wo_id(self.wo_id.clone()),
            World::Cli => context,
        }
    }

    /// A new BACKGROUND work order carrying `operations`, for the STRICT
    /// lane consumer.
    pub fn derive_strict(&self, operations: Vec<Operation>, background_executor: &str) -> Self {
        let target_paths: Vec<String> = operations.iter().map(|op| op.path.clone()).collect();
        let zone_summary = self
            .zone_summary
            .iter()
            .filter(|(path, _)| {
                operations
                    .iter()
                    .any(|op| op.touched_paths().any(|touched| touched == path.as_str()))
            })
            .map(|(path, zone)| (path.clone(), *zone))
            .collect();
        Self {
            wo_id: format!("{}-strict", self.wo_id),
            created_at: Utc::now(),
            origin: Origin {
                world: World::Background,
                actor: canonical_actor(background_executor),
            },
            target_paths,
            zone_summary,
            risk_level: self.risk_level,
            desired_state: self.desired_state.clone(),
            change_type: self.change_type.clone(),
            rollback_strategy: self.rollback_strategy,
            similar_change_approved: self.similar_change_approved,
            operations,
        }
    }
}
