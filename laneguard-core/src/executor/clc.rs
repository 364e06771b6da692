use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use super::rollback::RollbackJournal;
use crate::audit::{AuditTrail, DecisionEntry, ExecutionRecord};
use crate::governance::{OperationKind, RequestContext, SipMetadata};
use crate::sandbox::SandboxGuard;
use crate::sip::{SipEngine, SipError};
use crate::work_order::{
    Disposition, ExecutionResult, ExecutionStatus, InboxError, Operation, OperationReport, WorkOrder,
    WorkOrderInbox, WorkOrderValidator, file_safe_id,
};

const CONSUMER: &str = "clc";

/// Sole consumer of STRICT-lane work orders. Applies every operation through
/// SIP in order and rolls the whole order back on the first failure when a
/// strategy was declared.
pub struct ClcExecutor {
    guard: Arc<dyn SandboxGuard>,
    sip: SipEngine,
    validator: WorkOrderValidator,
    audit: Arc<AuditTrail>,
    identity: String,
    backup_dir: PathBuf,
    root: PathBuf,
}

impl std::fmt::Debug for ClcExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClcExecutor")
            .field("identity", &self.identity)
            .field("backup_dir", &self.backup_dir)
            .field("root", &self.root)
            .finish()
    }
}

/// A write that passed admission, ready for SIP.
struct AdmittedOperation<'a> {
    op: &'a Operation,
    target: PathBuf,
    source: Option<PathBuf>,
}

/// A committed operation and the files it changed, for rollback accounting.
struct Applied {
    index: usize,
    targets: Vec<PathBuf>,
    paths: Vec<String>,
}

impl ClcExecutor {
    pub fn new(
        guard: Arc<dyn SandboxGuard>,
        sip: SipEngine,
        validator: WorkOrderValidator,
        audit: Arc<AuditTrail>,
        identity: impl Into<String>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        let root = validator.zones().root().to_path_buf();
        Self {
            guard,
            sip,
            validator,
            audit,
            identity: identity.into(),
            backup_dir: backup_dir.into(),
            root,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn execute_work_order(&self, wo: &WorkOrder) -> ExecutionResult {
        let started = Instant::now();
        let mut result = match self.validator.validate_for_execution(wo) {
            Ok(_) => self.run(wo),
            Err(err) => {
                warn!(wo_id = %wo.wo_id, error = %err, "work order rejected by executor");
                self.audit.note(
                    DecisionEntry::fault("", &self.identity, "INVALID_WORK_ORDER", err.to_string())
                        .with_wo_id(&wo.wo_id),
                );
                ExecutionResult::rejected(&wo.wo_id, err.to_string())
            }
        };
        result.execution_time = started.elapsed().as_secs_f64();
        self.finish(&mut result, Some(wo));
        result
    }

    /// Load, execute and archive one work order file.
    pub fn execute_file(&self, path: &Path, inbox: &WorkOrderInbox) -> Result<ExecutionResult, InboxError> {
        let result = match inbox.load(path) {
            Ok(wo) => self.execute_work_order(&wo),
            Err(err) => {
                let wo_id = file_stem(path);
                let mut result = ExecutionResult::rejected(&wo_id, err.to_string());
                self.audit.note(
                    DecisionEntry::fault(&path.display().to_string(), &self.identity, "UNREADABLE_WORK_ORDER", err.to_string())
                        .with_wo_id(&wo_id),
                );
                self.finish(&mut result, None);
                result
            }
        };

        match result.status {
            ExecutionStatus::Completed => inbox.archive_processed(path)?,
            _ => inbox.archive_failed(path)?,
        };
        Ok(result)
    }

    fn run(&self, wo: &WorkOrder) -> ExecutionResult {
        let mut result = ExecutionResult::new(&wo.wo_id, ExecutionStatus::Completed);
        let context = wo.request_context().with_sip(SipMetadata::default());
        let mut journal = wo
            .rollback_strategy
            .map(|strategy| RollbackJournal::new(self.backup_dir.join(file_safe_id(&wo.wo_id)), strategy, &self.root));

        let mut failed_at = None;
        let mut applied = Vec::new();
        for (index, op) in wo.operations.iter().enumerate() {
            match self.apply_operation(wo, op, &context, journal.as_mut(), &mut result) {
                Ok((report, targets)) => {
                    applied.push(Applied {
                        index: result.operations.len(),
                        targets,
                        paths: std::iter::once(op.path.clone()).chain(op.source_path.clone()).collect(),
                    });
                    result.operations.push(report);
                }
                Err(report) => {
                    result.errors.push(format!("{}: {}", report.path, report.detail));
                    result.operations.push(report);
                    failed_at = Some(index);
                    break;
                }
            }
        }

        let Some(failed_at) = failed_at else {
            if let Some(journal) = journal {
                journal.discard();
            }
            info!(wo_id = %wo.wo_id, files = result.files_modified.len(), "work order completed");
            return result;
        };

        result.status = ExecutionStatus::Failed;
        for op in wo.operations.iter().skip(failed_at + 1) {
            result.operations.push(
                OperationReport::new(&op.path, op.operation, Disposition::Rejected)
                    .with_detail("not attempted after an earlier failure"),
            );
        }

        match journal {
            Some(journal) => {
                let report = journal.rollback(&self.sip);
                for entry in &applied {
                    let stuck: Vec<String> = entry
                        .targets
                        .iter()
                        .filter(|target| report.unrestored.contains(target))
                        .map(|target| target.display().to_string())
                        .collect();
                    if stuck.is_empty() {
                        if let Some(op) = result.operations.get_mut(entry.index) {
                            op.disposition = Disposition::RolledBack;
                        }
                        for path in &entry.paths {
                            result.forget_commit(path);
                        }
                    } else if let Some(op) = result.operations.get_mut(entry.index) {
                        op.detail = format!("rollback failed for {}", stuck.join(", "));
                    }
                }
                if report.is_clean() {
                    result.warnings.push(format!(
                        "rolled back with {:?}: {} restored, {} removed",
                        journal.strategy(),
                        report.restored.len(),
                        report.removed.len()
                    ));
                } else {
                    error!(wo_id = %wo.wo_id, failures = report.failures.len(), "rollback incomplete");
                    result.errors.extend(report.failures);
                }
            }
            None => {
                let committed = result
                    .operations
                    .iter()
                    .filter(|op| op.disposition == Disposition::Committed)
                    .count();
                warn!(wo_id = %wo.wo_id, committed, "failure without rollback strategy");
                result.warnings.push(format!(
                    "no rollback strategy declared; {committed} committed operation(s) left in place"
                ));
            }
        }
        result
    }

    fn apply_operation(
        &self,
        wo: &WorkOrder,
        op: &Operation,
        context: &RequestContext,
        journal: Option<&mut RollbackJournal>,
        result: &mut ExecutionResult,
    ) -> Result<(OperationReport, Vec<PathBuf>), OperationReport> {
        let admitted = self.admit(wo, op, context, &mut result.warnings)?;
        let targets: Vec<PathBuf> = std::iter::once(admitted.target.clone())
            .chain(admitted.source.clone())
            .collect();
        let fail = |err: SipError| {
            let tag = if err.is_integrity_fault() { "INTEGRITY_FAULT" } else { "SIP_FAILED" };
            self.audit.note(
                DecisionEntry::fault(&op.path, &self.identity, tag, err.to_string()).with_wo_id(&wo.wo_id),
            );
            OperationReport::new(&op.path, op.operation, Disposition::Failed).with_detail(err.to_string())
        };

        if let Some(journal) = journal {
            for path in &targets {
                journal.capture(path).map_err(fail)?;
            }
        }

        let report = OperationReport::new(&op.path, op.operation, Disposition::Committed);
        match (op.operation, &admitted.source) {
            (OperationKind::Move, Some(source)) => {
                let moved = self.sip.apply_move(source, &admitted.target).map_err(fail)?;
                let source_path = admitted.op.source_path.as_deref().unwrap_or_default();
                result.record_commit(&op.path, moved.destination.checksum_before.clone(), moved.destination.checksum_after.clone());
                result.record_commit(source_path, moved.source.checksum_before, None);
                let report = report
                    .with_detail(format!("moved from {source_path}"))
                    .with_checksums(moved.destination.checksum_before, moved.destination.checksum_after);
                Ok((report, targets))
            }
            (kind, _) => {
                let content = admitted.op.content.as_deref().map(str::as_bytes);
                let outcome = self.sip.apply_sip(&admitted.target, content, kind).map_err(fail)?;
                result.record_commit(&op.path, outcome.checksum_before.clone(), outcome.checksum_after.clone());
                Ok((report.with_checksums(outcome.checksum_before, outcome.checksum_after), targets))
            }
        }
    }

    fn admit<'a>(
        &self,
        wo: &WorkOrder,
        op: &'a Operation,
        context: &RequestContext,
        warnings: &mut Vec<String>,
    ) -> Result<AdmittedOperation<'a>, OperationReport> {
        let target = self.check(wo, op, &op.path, op.content.as_deref(), context, warnings)?;
        let source = match op.source_path.as_deref() {
            Some(source) if op.operation == OperationKind::Move => {
                Some(self.check(wo, op, source, None, context, warnings)?)
            }
            _ => None,
        };
        Ok(AdmittedOperation { op, target, source })
    }

    fn check(
        &self,
        wo: &WorkOrder,
        op: &Operation,
        path: &str,
        content: Option<&str>,
        context: &RequestContext,
        warnings: &mut Vec<String>,
    ) -> Result<PathBuf, OperationReport> {
        let check = self
            .guard
            .check_write_allowed(path, &self.identity, op.operation, content, context);
        warnings.extend(check.warnings.iter().cloned());
        match check.normalized_path.clone().filter(|_| check.allowed) {
            Some(normalized) => Ok(normalized),
            None => {
                self.audit
                    .note(DecisionEntry::denial(path, &self.identity, &check).with_wo_id(&wo.wo_id));
                Err(OperationReport::new(&op.path, op.operation, Disposition::Rejected)
                    .with_detail(format!("{path}: {}", check.reason)))
            }
        }
    }

    fn finish(&self, result: &mut ExecutionResult, wo: Option<&WorkOrder>) {
        let record = ExecutionRecord::from_result(result, wo, CONSUMER);
        match self.audit.record_execution(&record) {
            Ok(path) => result.audit_log_path = path,
            Err(err) => {
                warn!(wo_id = %result.wo_id, error = %err, "failed to write execution record");
                result.warnings.push(format!("audit record not written: {err}"));
            }
        }
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}
