use std::path::Path;

use indexmap::IndexMap;
use laneguard_commons::expand_home;
use tracing::debug;

use super::error::WorkOrderError;
use super::model::WorkOrder;
use crate::governance::{OperationKind, World, Zone, ZoneClassifier};
use crate::sandbox::decode_path;

/// Structural invariants every work order must satisfy before any of its
/// operations is routed.
#[derive(Debug, Clone)]
pub struct WorkOrderValidator {
    zones: ZoneClassifier,
}

impl WorkOrderValidator {
    pub fn new(zones: ZoneClassifier) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &ZoneClassifier {
        &self.zones
    }

    /// Check ids, operation shape, DANGER targets and the rollback
    /// requirement. Returns the zone of every touched path.
    pub fn validate_structure(&self, wo: &WorkOrder) -> Result<IndexMap<String, Zone>, WorkOrderError> {
        validate_id(&wo.wo_id)?;
        if wo.operations.is_empty() {
            return Err(WorkOrderError::NoOperations {
                wo_id: wo.wo_id.clone(),
            });
        }

        for op in &wo.operations {
            if op.operation.writes_content() && op.content.is_none() {
                return Err(WorkOrderError::MissingContent {
                    wo_id: wo.wo_id.clone(),
                    path: op.path.clone(),
                    operation: op.operation,
                });
            }
            if op.operation == OperationKind::Move
                && op.source_path.as_deref().is_none_or(|src| src.trim().is_empty())
            {
                return Err(WorkOrderError::MissingSource {
                    wo_id: wo.wo_id.clone(),
                    path: op.path.clone(),
                });
            }
        }

        let mut zones = IndexMap::new();
        for path in wo.all_paths() {
            let zone = self.classify(&wo.wo_id, path)?;
            if zone == Zone::Danger {
                return Err(WorkOrderError::DangerZoneTarget {
                    wo_id: wo.wo_id.clone(),
                    path: path.to_string(),
                });
            }
            zones.insert(path.to_string(), zone);
        }

        if wo.risk_level.requires_rollback() && wo.rollback_strategy.is_none() {
            return Err(WorkOrderError::MissingRollbackStrategy {
                wo_id: wo.wo_id.clone(),
                risk: wo.risk_level,
            });
        }

        debug!(wo_id = %wo.wo_id, paths = zones.len(), "work order structure valid");
        Ok(zones)
    }

    /// Structural checks plus the executor's own requirement: the order must
    /// come from the BACKGROUND world.
    pub fn validate_for_execution(
        &self,
        wo: &WorkOrder,
    ) -> Result<IndexMap<String, Zone>, WorkOrderError> {
        let zones = self.validate_structure(wo)?;
        if wo.origin.world != World::Background {
            return Err(WorkOrderError::NotBackground {
                wo_id: wo.wo_id.clone(),
                world: wo.origin.world,
            });
        }
        Ok(zones)
    }

    fn classify(&self, wo_id: &str, path: &str) -> Result<Zone, WorkOrderError> {
        if path.trim().is_empty() {
            return Err(WorkOrderError::InvalidPath {
                wo_id: wo_id.to_string(),
                path: path.to_string(),
                reason: "path is empty".to_string(),
            });
        }
        let decoded = decode_path(path).map_err(|reason| WorkOrderError::InvalidPath {
            wo_id: wo_id.to_string(),
            path: path.to_string(),
            reason,
        })?;
        Ok(self.zones.classify(&expand_home(&decoded)))
    }
}

fn validate_id(wo_id: &str) -> Result<(), WorkOrderError> {
    if wo_id.trim().is_empty() {
        return Err(WorkOrderError::EmptyId);
    }
    let safe = wo_id.chars().all(is_id_char) && !wo_id.starts_with('.');
    if !safe {
        return Err(WorkOrderError::InvalidId {
            wo_id: wo_id.to_string(),
        });
    }
    Ok(())
}

fn is_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')
}

/// `wo_id` reduced to a single safe file name component. Identical to the
/// id for anything [`WorkOrderValidator`] accepts.
pub fn file_safe_id(wo_id: &str) -> String {
    let mut label: String = wo_id
        .chars()
        .map(|ch| if is_id_char(ch) { ch } else { '_' })
        .collect();
    if label.starts_with('.') {
        label.replace_range(..1, "_");
    }
    if label.is_empty() {
        label.push_str("unnamed");
    }
    label
}

/// True when `path` names a work order file by extension.
pub fn is_work_order_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml" | "json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::{RiskLevel, RollbackStrategy};
    use crate::work_order::Operation;
    use laneguard_config::ZonesConfig;

    fn validator() -> WorkOrderValidator {
        WorkOrderValidator::new(ZoneClassifier::new("/srv/platform", &ZonesConfig::default()))
    }

    fn wo(ops: Vec<Operation>) -> WorkOrder {
        WorkOrder::new("WO-1", World::Background, "scheduler", RiskLevel::Low, ops)
    }

    #[test]
    fn summarises_zones_of_every_touched_path() {
        let order = wo(vec![
            Operation::add("apps/a.py", "x"),
            Operation::move_from("apps/old.py", "core/new.py"),
        ]);
        let zones = validator().validate_structure(&order).unwrap();
        assert_eq!(zones.get("apps/a.py"), Some(&Zone::Open));
        assert_eq!(zones.get("core/new.py"), Some(&Zone::Locked));
        assert_eq!(zones.get("apps/old.py"), Some(&Zone::Open));
    }

    #[test]
    fn danger_anywhere_invalidates() {
        let order = wo(vec![
            Operation::add("apps/a.py", "x"),
            Operation::modify("/etc/hosts", "127.0.0.1 evil\n"),
        ]);
        let err = validator().validate_structure(&order).unwrap_err();
        assert!(matches!(err, WorkOrderError::DangerZoneTarget { ref path, .. } if path == "/etc/hosts"));

        let sneaky = wo(vec![Operation::move_from("%2e%2e/secrets", "apps/x")]);
        assert!(matches!(
            validator().validate_structure(&sneaky).unwrap_err(),
            WorkOrderError::DangerZoneTarget { .. }
        ));
    }

    #[test]
    fn high_risk_needs_rollback() {
        let mut order = wo(vec![Operation::add("apps/a.py", "x")]);
        order.risk_level = RiskLevel::High;
        assert!(matches!(
            validator().validate_structure(&order).unwrap_err(),
            WorkOrderError::MissingRollbackStrategy { .. }
        ));
        let order = order.with_rollback(RollbackStrategy::BackupRestore);
        assert!(validator().validate_structure(&order).is_ok());
    }

    #[test]
    fn shape_errors_are_reported() {
        assert!(matches!(
            validator().validate_structure(&wo(Vec::new())).unwrap_err(),
            WorkOrderError::NoOperations { .. }
        ));

        let mut bad = Operation::add("apps/a.py", "x");
        bad.content = None;
        assert!(matches!(
            validator().validate_structure(&wo(vec![bad])).unwrap_err(),
            WorkOrderError::MissingContent { .. }
        ));

        let mut order = wo(vec![Operation::delete("apps/a.py")]);
        order.wo_id = "../escape".to_string();
        assert!(matches!(
            validator().validate_structure(&order).unwrap_err(),
            WorkOrderError::InvalidId { .. }
        ));
    }

    #[test]
    fn execution_requires_background_origin() {
        let mut order = wo(vec![Operation::add("apps/a.py", "x")]);
        order.origin.world = World::Cli;
        assert!(validator().validate_structure(&order).is_ok());
        assert!(matches!(
            validator().validate_for_execution(&order).unwrap_err(),
            WorkOrderError::NotBackground { .. }
        ));
    }

    #[test]
    fn recognises_work_order_extensions() {
        assert!(is_work_order_file(Path::new("a/WO-1.YAML")));
        assert!(is_work_order_file(Path::new("WO-1.json")));
        assert!(!is_work_order_file(Path::new("WO-1.txt")));
    }

    #[test]
    fn file_safe_id_flattens_hostile_ids() {
        assert_eq!(file_safe_id("WO-2026.1_a"), "WO-2026.1_a");
        assert_eq!(file_safe_id("../../../apps/planted"), "_._.._.._apps_planted");
        assert_eq!(file_safe_id(".hidden"), "_hidden");
        assert_eq!(file_safe_id(""), "unnamed");
        assert!(!file_safe_id("a/b\\c").contains(['/', '\\']));
    }
}
