use std::path::Path;

use laneguard_commons::{InstallationPaths, canonicalize_allow_missing, expand_home};
use laneguard_config::GovernanceConfig;
use tracing::{debug, info};

use super::auto_approve::{AutoApproveConditions, MissionScope};
use super::decision::{RoutingDecision, policy_documents};
use super::{Router, RoutingError};
use crate::governance::{
    ActorRegistry, Lane, OperationKind, RequestContext, RiskLevel, TriggerTable, World, Zone,
    ZoneClassifier, ZoneResolution,
};
use crate::sandbox::decode_path;

/// Table-driven router. Holds no mutable state, so one instance can serve
/// any number of threads.
#[derive(Debug, Clone)]
pub struct LaneRouter {
    triggers: TriggerTable,
    zones: ZoneClassifier,
    actors: ActorRegistry,
    mission_scope: MissionScope,
    audit_enabled: bool,
}

impl LaneRouter {
    pub fn new(config: &GovernanceConfig) -> Self {
        Self {
            triggers: TriggerTable::from_config(&config.triggers),
            zones: ZoneClassifier::new(config.installation_root(), &config.zones),
            actors: ActorRegistry::from_config(&config.actors),
            mission_scope: MissionScope::from_config(&config.mission_scope),
            audit_enabled: config.audit.enabled,
        }
    }

    pub fn zones(&self) -> &ZoneClassifier {
        &self.zones
    }

    fn resolve_world(&self, trigger: &str, context: &RequestContext) -> Result<World, RoutingError> {
        if context.has_work_order() {
            return Ok(World::Background);
        }
        self.triggers
            .lookup(trigger)
            .ok_or_else(|| RoutingError::UnknownTrigger {
                trigger: trigger.to_string(),
            })
    }

    /// Undecodable paths are treated as outside the root.
    fn resolve_zone(&self, path: &str) -> ZoneResolution {
        match decode_path(path) {
            Ok(decoded) => self.resolve_links(self.zones.classify_with_relative(&expand_home(&decoded))),
            Err(_) => outside(self.zones.classify_with_relative(Path::new(path))),
        }
    }

    /// Classify the symlink-resolved target too; the stricter zone wins. A
    /// path that cannot be resolved is treated as outside the root.
    fn resolve_links(&self, lexical: ZoneResolution) -> ZoneResolution {
        if lexical.zone == Zone::Danger {
            return lexical;
        }
        match canonicalize_allow_missing(&lexical.normalized) {
            Ok(resolved) if resolved == lexical.normalized => lexical,
            Ok(resolved) => {
                let resolved = self.zones.classify_with_relative(&resolved);
                if resolved.zone >= lexical.zone {
                    debug!(
                        path = %lexical.normalized.display(),
                        target = %resolved.normalized.display(),
                        zone = %resolved.zone,
                        "path resolves through a symlink"
                    );
                    resolved
                } else {
                    lexical
                }
            }
            Err(_) => outside(lexical),
        }
    }

    fn evaluate_auto_approve(
        &self,
        actor: &str,
        resolution: &ZoneResolution,
        context: &RequestContext,
    ) -> AutoApproveConditions {
        let relative = resolution.relative.as_deref().unwrap_or_default();
        let inside = resolution.relative.is_some();
        AutoApproveConditions {
            actor_is_privileged: self.actors.is_privileged(actor),
            zone_is_locked: resolution.zone == Zone::Locked,
            path_in_whitelist: inside && self.mission_scope.in_whitelist(relative),
            path_not_in_blacklist: inside && !self.mission_scope.in_blacklist(relative),
            risk_is_low: context.risk_level == Some(RiskLevel::Low),
            rollback_strategy_present: context.rollback_strategy.is_some(),
            audit_log_enabled: self.audit_enabled,
            similar_change_approved: context.similar_change_approved,
        }
    }
}

fn outside(mut resolution: ZoneResolution) -> ZoneResolution {
    resolution.zone = Zone::Danger;
    resolution.relative = None;
    resolution
}

impl Router for LaneRouter {
    fn route(
        &self,
        trigger: &str,
        actor: &str,
        path: &str,
        operation: OperationKind,
        context: &RequestContext,
    ) -> Result<RoutingDecision, RoutingError> {
        if path.trim().is_empty() {
            return Err(RoutingError::EmptyPath);
        }
        let world = self.resolve_world(trigger, context)?;
        let resolution = self.resolve_zone(path);
        let zone = resolution.zone;
        let lane = Lane::select(world, zone);

        let primary_writer = match (lane, world) {
            (Lane::Blocked, _) => None,
            (_, World::Background) => Some(self.actors.background_executor().to_string()),
            (_, World::Cli) => self
                .actors
                .is_writer(actor)
                .then(|| actor.trim().to_ascii_uppercase()),
        };

        let mut auto_approve_conditions = None;
        let mut auto_approve_allowed = false;
        let reason = match lane {
            Lane::Blocked => format!("{} is in the DANGER zone; writes are blocked", resolution.normalized.display()),
            Lane::Strict => format!(
                "BACKGROUND {zone} write; delegated to {} on the STRICT lane",
                self.actors.background_executor()
            ),
            Lane::Fast => match &primary_writer {
                Some(writer) => format!("CLI write to OPEN zone by writer {writer}"),
                None => format!("CLI write to OPEN zone, but '{actor}' is not a writer"),
            },
            Lane::Warn if self.actors.is_privileged(actor) => {
                let conditions = self.evaluate_auto_approve(actor, &resolution, context);
                auto_approve_allowed = conditions.all_met();
                auto_approve_conditions = Some(conditions);
                if auto_approve_allowed {
                    "LOCKED zone write auto-approved under Mission Scope".to_string()
                } else {
                    format!(
                        "LOCKED zone write needs review; auto-approve refused: {}",
                        conditions.failed().join(", ")
                    )
                }
            }
            Lane::Warn => match &primary_writer {
                Some(writer) => format!("LOCKED zone write by {writer} needs review"),
                None => format!("LOCKED zone write, but '{actor}' is not a writer"),
            },
        };

        let decision = RoutingDecision {
            world,
            zone,
            lane,
            target: resolution.normalized,
            relative_path: resolution.relative,
            primary_writer,
            auto_approve_allowed,
            auto_approve_conditions,
            rollback_required: lane == Lane::Strict || auto_approve_allowed,
            policy_documents: policy_documents(world),
            reason,
        };

        if decision.is_blocked() {
            info!(path, actor, %world, %zone, %lane, %operation, "write routed to BLOCKED lane");
        } else {
            debug!(
                path,
                actor,
                %world,
                %zone,
                %lane,
                %operation,
                auto_approve = decision.auto_approve_allowed,
                "write routed"
            );
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::RollbackStrategy;
    use pretty_assertions::assert_eq;

    fn router() -> LaneRouter {
        LaneRouter::new(&GovernanceConfig::default().with_root("/srv/platform"))
    }

    fn approved_context() -> RequestContext {
        RequestContext::new()
            .with_risk(RiskLevel::Low)
            .with_rollback(RollbackStrategy::GitRevert)
            .similar_change_approved(true)
    }

    #[test]
    fn cli_open_write_is_fast() {
        let decision = router()
            .route("cli", "codex", "apps/a.py", OperationKind::Add, &RequestContext::new())
            .unwrap();
        assert_eq!(decision.lane, Lane::Fast);
        assert_eq!(decision.primary_writer.as_deref(), Some("CODEX"));
        assert!(!decision.rollback_required);
        assert_eq!(decision.policy_documents.len(), 2);
    }

    #[test]
    fn wo_id_forces_background_even_for_unknown_trigger() {
        let context = RequestContext::new().with_wo_id("WO-1");
        let decision = router()
            .route("mystery", "CLS", "apps/a.py", OperationKind::Modify, &context)
            .unwrap();
        assert_eq!(decision.world, World::Background);
        assert_eq!(decision.lane, Lane::Strict);
        assert_eq!(decision.primary_writer.as_deref(), Some("CLC"));
        assert!(decision.rollback_required);
    }

    #[test]
    fn unknown_trigger_fails_closed() {
        let err = router()
            .route("mystery", "CLS", "apps/a.py", OperationKind::Add, &RequestContext::new())
            .unwrap_err();
        assert!(matches!(err, RoutingError::UnknownTrigger { .. }));
    }

    #[test]
    fn planners_and_router_never_write() {
        for actor in ["GG", "GC", "LIAM", "MARY"] {
            for trigger in ["cli", "cursor"] {
                let decision = router()
                    .route(trigger, actor, "apps/a.py", OperationKind::Add, &RequestContext::new())
                    .unwrap();
                assert_eq!(decision.primary_writer, None, "{actor}");
            }
        }
    }

    #[test]
    fn privileged_locked_write_without_rollback_names_the_gap() {
        let context = RequestContext::new()
            .with_risk(RiskLevel::Low)
            .similar_change_approved(true);
        let decision = router()
            .route("cli", "CLS", "core/config.yaml", OperationKind::Modify, &context)
            .unwrap();
        assert_eq!(decision.lane, Lane::Warn);
        assert!(!decision.auto_approve_allowed);
        assert!(!decision.rollback_required);
        assert!(decision.reason.contains("rollback_strategy_present"), "{}", decision.reason);
    }

    #[test]
    fn privileged_locked_write_with_full_context_is_auto_approved() {
        let decision = router()
            .route("cli", "CLS", "core/config.yaml", OperationKind::Modify, &approved_context())
            .unwrap();
        assert!(decision.auto_approve_allowed);
        assert!(decision.rollback_required);
        assert!(decision.auto_approve_conditions.is_some_and(|c| c.all_met()));
    }

    #[test]
    fn blacklisted_path_is_never_auto_approved() {
        let decision = router()
            .route("cli", "CLS", "core/secrets/api.key", OperationKind::Modify, &approved_context())
            .unwrap();
        assert_eq!(decision.lane, Lane::Warn);
        assert!(!decision.auto_approve_allowed);
        let conditions = decision.auto_approve_conditions.unwrap();
        assert!(!conditions.path_not_in_blacklist);
        assert!(!conditions.path_in_whitelist);
    }

    #[test]
    fn non_privileged_writer_is_not_evaluated() {
        let decision = router()
            .route("cli", "CODEX", "core/config.yaml", OperationKind::Modify, &approved_context())
            .unwrap();
        assert_eq!(decision.lane, Lane::Warn);
        assert!(decision.auto_approve_conditions.is_none());
        assert!(!decision.auto_approve_allowed);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_into_locked_directory_routes_by_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernanceConfig::default().with_root(dir.path());
        let root = config.installation_root().to_path_buf();
        std::fs::create_dir_all(root.join("core")).unwrap();
        std::fs::create_dir_all(root.join("apps")).unwrap();
        std::os::unix::fs::symlink(root.join("core"), root.join("apps/link")).unwrap();

        let decision = LaneRouter::new(&config)
            .route("cli", "CODEX", "apps/link/config.yaml", OperationKind::Modify, &RequestContext::new())
            .unwrap();
        assert_eq!(decision.zone, Zone::Locked);
        assert_eq!(decision.lane, Lane::Warn);
        assert_eq!(decision.relative_path.as_deref(), Some("core/config.yaml"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernanceConfig::default().with_root(dir.path());
        let root = config.installation_root().to_path_buf();
        std::fs::create_dir_all(root.join("apps")).unwrap();
        std::os::unix::fs::symlink(root.join("nowhere"), root.join("apps/ghost")).unwrap();

        let decision = LaneRouter::new(&config)
            .route("cli", "CODEX", "apps/ghost/a.py", OperationKind::Add, &RequestContext::new())
            .unwrap();
        assert_eq!(decision.zone, Zone::Danger);
        assert_eq!(decision.lane, Lane::Blocked);
    }

    #[test]
    fn danger_priority_over_locked() {
        for path in ["/etc/hosts", "../outside/core/x", "%2e%2e/core/x", "apps/%ff"] {
            let decision = router()
                .route("cli", "CLS", path, OperationKind::Modify, &approved_context())
                .unwrap();
            assert_eq!(decision.zone, Zone::Danger, "{path}");
            assert_eq!(decision.lane, Lane::Blocked);
            assert_eq!(decision.primary_writer, None);
            assert!(!decision.auto_approve_allowed);
        }
    }
}
