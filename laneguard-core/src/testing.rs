//! Deterministic stand-ins for [`Router`] and [`SandboxGuard`], for callers
//! that want to exercise orchestration without real policy tables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::governance::{Lane, OperationKind, RequestContext, World, Zone, canonical_actor};
use crate::router::{Router, RoutingDecision, RoutingError, policy_documents};
use crate::sandbox::{SandboxGuard, SecurityCheckResult, SipComplianceReport, ViolationKind};

/// Router that answers from a fixed table keyed by the raw path.
#[derive(Debug, Clone)]
pub struct FixedRouter {
    world: World,
    default_zone: Zone,
    zones: HashMap<String, Zone>,
    auto_approve: bool,
    background_executor: String,
}

impl FixedRouter {
    pub fn new(world: World) -> Self {
        Self {
            world,
            default_zone: Zone::Open,
            zones: HashMap::new(),
            auto_approve: false,
            background_executor: "CLC".to_string(),
        }
    }

    pub fn with_zone(mut self, path: impl Into<String>, zone: Zone) -> Self {
        self.zones.insert(path.into(), zone);
        self
    }

    pub fn with_default_zone(mut self, zone: Zone) -> Self {
        self.default_zone = zone;
        self
    }

    /// Grant auto-approval to every WARN decision.
    pub fn auto_approving(mut self) -> Self {
        self.auto_approve = true;
        self
    }
}

impl Router for FixedRouter {
    fn route(
        &self,
        _trigger: &str,
        actor: &str,
        path: &str,
        _operation: OperationKind,
        context: &RequestContext,
    ) -> Result<RoutingDecision, RoutingError> {
        if path.trim().is_empty() {
            return Err(RoutingError::EmptyPath);
        }
        let world = if context.has_work_order() {
            World::Background
        } else {
            self.world
        };
        let zone = self.zones.get(path).copied().unwrap_or(self.default_zone);
        let lane = Lane::select(world, zone);
        let auto_approve_allowed = self.auto_approve && lane == Lane::Warn;
        let primary_writer = match (lane, world) {
            (Lane::Blocked, _) => None,
            (_, World::Background) => Some(self.background_executor.clone()),
            (_, World::Cli) => Some(canonical_actor(actor)),
        };
        Ok(RoutingDecision {
            world,
            zone,
            lane,
            target: PathBuf::from(path),
            relative_path: Some(path.to_string()),
            primary_writer,
            auto_approve_allowed,
            auto_approve_conditions: None,
            rollback_required: lane == Lane::Strict || auto_approve_allowed,
            policy_documents: policy_documents(world),
            reason: format!("fixed route: {zone} -> {lane}"),
        })
    }
}

/// Guard that admits or denies everything, with optional per-path denials.
#[derive(Debug, Clone)]
pub struct FixedGuard {
    allow: bool,
    denied_paths: HashMap<String, ViolationKind>,
    zones: HashMap<String, Zone>,
    compliant: bool,
    root: Option<PathBuf>,
}

impl FixedGuard {
    pub fn allow_all() -> Self {
        Self {
            allow: true,
            denied_paths: HashMap::new(),
            zones: HashMap::new(),
            compliant: true,
            root: None,
        }
    }

    pub fn deny_all() -> Self {
        Self {
            allow: false,
            ..Self::allow_all()
        }
    }

    /// Resolve relative paths against `root` in admitted results.
    pub fn rooted_at(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn deny_path(mut self, path: impl Into<String>, violation: ViolationKind) -> Self {
        self.denied_paths.insert(path.into(), violation);
        self
    }

    /// Admit `path` in `zone` instead of OPEN.
    pub fn with_zone(mut self, path: impl Into<String>, zone: Zone) -> Self {
        self.zones.insert(path.into(), zone);
        self
    }

    /// Report every SIP compliance check as failed.
    pub fn non_compliant(mut self) -> Self {
        self.compliant = false;
        self
    }
}

impl SandboxGuard for FixedGuard {
    fn check_write_allowed(
        &self,
        path: &str,
        _actor: &str,
        _operation: OperationKind,
        _content: Option<&str>,
        _context: &RequestContext,
    ) -> SecurityCheckResult {
        if let Some(violation) = self.denied_paths.get(path) {
            return SecurityCheckResult::denied(*violation, format!("fixed denial for {path}"));
        }
        if !self.allow {
            return SecurityCheckResult::denied(ViolationKind::DangerZone, "fixed guard denies all");
        }
        let normalized = match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        };
        let zone = self.zones.get(path).copied().unwrap_or(Zone::Open);
        SecurityCheckResult::allowed(zone, normalized)
    }

    fn validate_sip_compliance(
        &self,
        path: &Path,
        _temp_file: Option<&Path>,
        _checksum_before: Option<&str>,
        _checksum_after: Option<&str>,
    ) -> SipComplianceReport {
        SipComplianceReport {
            compliant: self.compliant,
            path: path.display().to_string(),
            issues: if self.compliant {
                Vec::new()
            } else {
                vec!["fixed guard reports non-compliance".to_string()]
            },
        }
    }
}
