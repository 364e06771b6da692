use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use laneguard_config::constants::actors;
use tracing::{debug, info, warn};

use super::delegation::StrictLaneSink;
use super::quota::AutoApproveQuota;
use crate::audit::{AuditTrail, DecisionEntry, DecisionKind, ExecutionRecord};
use crate::executor::file_stem;
use crate::governance::{Lane, OperationKind, RequestContext, SipMetadata, Zone};
use crate::router::{Router, RoutingDecision, RoutingError};
use crate::sandbox::SandboxGuard;
use crate::sip::{SipEngine, SipError};
use crate::work_order::{
    DelegationState, Disposition, ExecutionResult, ExecutionStatus, InboxError, Operation,
    OperationReport, WorkOrder, WorkOrderError, WorkOrderInbox, WorkOrderValidator,
};

const CONSUMER: &str = "processor";

/// Where one operation ends up after routing.
enum Plan {
    Reject(String),
    Local { auto_approved: bool },
    Strict,
}

/// Fans a work order out across the lanes: FAST and auto-approved WARN
/// operations run here through SIP, STRICT operations go to the
/// [`StrictLaneSink`] as one derived work order, BLOCKED operations are
/// rejected.
pub struct WorkOrderProcessor {
    router: Arc<dyn Router>,
    guard: Arc<dyn SandboxGuard>,
    sip: SipEngine,
    validator: WorkOrderValidator,
    audit: Arc<AuditTrail>,
    strict: Arc<dyn StrictLaneSink>,
    quota: Arc<AutoApproveQuota>,
    background_executor: String,
}

impl std::fmt::Debug for WorkOrderProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkOrderProcessor")
            .field("sip", &self.sip)
            .field("quota", &self.quota)
            .field("background_executor", &self.background_executor)
            .finish_non_exhaustive()
    }
}

impl WorkOrderProcessor {
    pub fn new(
        router: Arc<dyn Router>,
        guard: Arc<dyn SandboxGuard>,
        sip: SipEngine,
        validator: WorkOrderValidator,
        audit: Arc<AuditTrail>,
        strict: Arc<dyn StrictLaneSink>,
    ) -> Self {
        Self {
            router,
            guard,
            sip,
            validator,
            audit,
            strict,
            quota: Arc::new(AutoApproveQuota::unlimited()),
            background_executor: actors::BACKGROUND_EXECUTOR.to_string(),
        }
    }

    pub fn with_quota(mut self, quota: Arc<AutoApproveQuota>) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_background_executor(mut self, identity: impl Into<String>) -> Self {
        self.background_executor = identity.into();
        self
    }

    pub fn quota(&self) -> &AutoApproveQuota {
        &self.quota
    }

    pub fn process_wo_with_lane_routing(&self, wo: &WorkOrder) -> ExecutionResult {
        let started = Instant::now();
        let mut result = match self.validator.validate_structure(wo) {
            Ok(zones) => self.dispatch(wo, zones),
            Err(err) => {
                warn!(wo_id = %wo.wo_id, error = %err, "work order rejected");
                self.audit
                    .note(rejection_entry(&err, &wo.origin.actor).with_wo_id(&wo.wo_id));
                ExecutionResult::rejected(&wo.wo_id, err.to_string())
            }
        };
        result.execution_time = started.elapsed().as_secs_f64();
        self.finish(&mut result, Some(wo));
        info!(
            wo_id = %wo.wo_id,
            status = %result.status,
            files = result.files_modified.len(),
            delegated = result.delegated.len(),
            "work order processed"
        );
        result
    }

    /// Load, process and archive one work order file. Rejected and failed
    /// orders land in the error directory.
    pub fn process_file(&self, path: &Path, inbox: &WorkOrderInbox) -> Result<ExecutionResult, InboxError> {
        let result = match inbox.load(path) {
            Ok(wo) => self.process_wo_with_lane_routing(&wo),
            Err(err) => {
                let wo_id = file_stem(path);
                warn!(path = %path.display(), error = %err, "unreadable work order");
                self.audit.note(
                    DecisionEntry::fault(&path.display().to_string(), "", "UNREADABLE_WORK_ORDER", err.to_string())
                        .with_wo_id(&wo_id),
                );
                let mut result = ExecutionResult::rejected(wo_id, err.to_string());
                self.finish(&mut result, None);
                result
            }
        };

        match result.status {
            ExecutionStatus::Completed | ExecutionStatus::Executing => inbox.archive_processed(path)?,
            ExecutionStatus::Rejected | ExecutionStatus::Failed => inbox.archive_failed(path)?,
        };
        Ok(result)
    }

    fn dispatch(&self, wo: &WorkOrder, zones: IndexMap<String, Zone>) -> ExecutionResult {
        let mut result = ExecutionResult::new(&wo.wo_id, ExecutionStatus::Completed);
        let context = wo.request_context();
        let trigger = wo.origin.world.canonical_trigger();
        let actor = wo.origin.actor.as_str();
        let strict_id = format!("{}-strict", wo.wo_id);
        let mut strict_ops: Vec<Operation> = Vec::new();

        for op in &wo.operations {
            let (decision, auto_approved) = match self.route(trigger, actor, op, &context) {
                Ok(routed) => routed,
                Err(err) => {
                    result.errors.push(format!("{}: {err}", op.path));
                    result.operations.push(
                        OperationReport::new(&op.path, op.operation, Disposition::Rejected)
                            .with_detail(err.to_string()),
                    );
                    continue;
                }
            };
            self.audit
                .note(DecisionEntry::routing(&op.path, actor, &decision).with_wo_id(&wo.wo_id));

            let plan = match decision.lane {
                Lane::Blocked => Plan::Reject(decision.reason.clone()),
                _ if decision.primary_writer.is_none() => {
                    Plan::Reject(format!("actor '{actor}' may not write on the {} lane", decision.lane))
                }
                Lane::Fast => Plan::Local { auto_approved: false },
                Lane::Warn if auto_approved => {
                    if self.quota.try_consume() {
                        Plan::Local { auto_approved: true }
                    } else {
                        result
                            .warnings
                            .push(format!("{}: auto-approve quota exhausted, delegating to STRICT", op.path));
                        Plan::Strict
                    }
                }
                Lane::Warn | Lane::Strict => Plan::Strict,
            };
            debug!(wo_id = %wo.wo_id, path = %op.path, lane = %decision.lane, zone = %decision.zone, "operation routed");

            let report = match plan {
                Plan::Reject(reason) => {
                    self.audit.note(
                        DecisionEntry::new(DecisionKind::Denial, &op.path, actor, decision.lane.to_string())
                            .with_detail(reason.clone())
                            .with_wo_id(&wo.wo_id),
                    );
                    result.errors.push(format!("{}: {reason}", op.path));
                    OperationReport::new(&op.path, op.operation, Disposition::Rejected).with_detail(reason)
                }
                Plan::Local { auto_approved } => {
                    let local_context = context
                        .clone()
                        .auto_approved(auto_approved)
                        .with_sip(SipMetadata::default());
                    self.execute_locally(wo, op, decision.zone, &local_context, &mut result)
                }
                Plan::Strict => {
                    strict_ops.push(op.clone());
                    OperationReport::new(&op.path, op.operation, Disposition::Delegated)
                        .with_detail(format!("delegated to {strict_id}"))
                }
            };
            result.operations.push(report.routed(decision.lane, decision.zone));
        }

        if !strict_ops.is_empty() {
            let annotated = WorkOrder {
                zone_summary: zones,
                ..wo.clone()
            };
            let derived = annotated.derive_strict(strict_ops, &self.background_executor);
            let entry = self.strict.delegate(&derived);
            if entry.state == DelegationState::Failed {
                result.errors.push(format!(
                    "STRICT delegation {} failed: {}",
                    entry.wo_id,
                    entry.detail.as_deref().unwrap_or("unknown error")
                ));
            }
            result.delegated.push(entry);
        }

        result.status = aggregate_status(&result);
        result
    }

    /// Route every path the operation touches; the most restrictive decision
    /// wins and auto-approval must hold for all of them.
    fn route(
        &self,
        trigger: &str,
        actor: &str,
        op: &Operation,
        context: &RequestContext,
    ) -> Result<(RoutingDecision, bool), RoutingError> {
        let mut decisions = Vec::new();
        for path in op.touched_paths() {
            decisions.push(self.router.route(trigger, actor, path, op.operation, context)?);
        }
        let auto_approved = decisions
            .iter()
            .all(|decision| decision.lane == Lane::Fast || decision.auto_approve_allowed);
        let decision = decisions
            .into_iter()
            .max_by_key(|decision| decision.lane)
            .ok_or(RoutingError::EmptyPath)?;
        let auto_approved = auto_approved && decision.lane == Lane::Warn;
        Ok((decision, auto_approved))
    }

    fn execute_locally(
        &self,
        wo: &WorkOrder,
        op: &Operation,
        routed_zone: Zone,
        context: &RequestContext,
        result: &mut ExecutionResult,
    ) -> OperationReport {
        let actor = wo.origin.actor.as_str();
        let target = match self.admit(wo, &op.path, op, routed_zone, op.content.as_deref(), context, result) {
            Ok(target) => target,
            Err(report) => return report,
        };
        let source = match (op.operation, op.source_path.as_deref()) {
            (OperationKind::Move, Some(source_path)) => {
                match self.admit(wo, source_path, op, routed_zone, None, context, result) {
                    Ok(source) => Some(source),
                    Err(report) => return report,
                }
            }
            _ => None,
        };

        let applied = match source {
            Some(source) => self.sip.apply_move(&source, &target).map(|moved| {
                let source_path = op.source_path.as_deref().unwrap_or_default();
                result.record_commit(source_path, moved.source.checksum_before, None);
                (moved.destination.checksum_before, moved.destination.checksum_after)
            }),
            None => self
                .sip
                .apply_sip(&target, op.content.as_deref().map(str::as_bytes), op.operation)
                .map(|outcome| (outcome.checksum_before, outcome.checksum_after)),
        };

        match applied {
            Ok((before, after)) => {
                result.record_commit(&op.path, before.clone(), after.clone());
                OperationReport::new(&op.path, op.operation, Disposition::Committed).with_checksums(before, after)
            }
            Err(err) => self.fail(wo, op, actor, err, result),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn admit(
        &self,
        wo: &WorkOrder,
        path: &str,
        op: &Operation,
        routed_zone: Zone,
        content: Option<&str>,
        context: &RequestContext,
        result: &mut ExecutionResult,
    ) -> Result<PathBuf, OperationReport> {
        let actor = wo.origin.actor.as_str();
        let check = self
            .guard
            .check_write_allowed(path, actor, op.operation, content, context);
        result.warnings.extend(check.warnings.iter().map(|warning| format!("{path}: {warning}")));
        let normalized = match check.normalized_path.clone().filter(|_| check.allowed) {
            Some(normalized) => normalized,
            None => {
                self.audit
                    .note(DecisionEntry::denial(path, actor, &check).with_wo_id(&wo.wo_id));
                result.errors.push(format!("{path}: {}", check.reason));
                return Err(OperationReport::new(&op.path, op.operation, Disposition::Rejected)
                    .with_detail(check.reason));
            }
        };

        // The target may have changed under a symlink since routing.
        if let Some(zone) = check.zone.filter(|zone| *zone > routed_zone) {
            let reason = format!(
                "{} resolves into the {zone} zone but was routed as {routed_zone}",
                normalized.display()
            );
            warn!(wo_id = %wo.wo_id, path, %zone, %routed_zone, "zone changed after routing");
            self.audit.note(
                DecisionEntry::new(DecisionKind::Denial, path, actor, "ZONE_MISMATCH")
                    .with_detail(reason.clone())
                    .with_wo_id(&wo.wo_id),
            );
            result.errors.push(format!("{path}: {reason}"));
            return Err(OperationReport::new(&op.path, op.operation, Disposition::Rejected).with_detail(reason));
        }
        Ok(normalized)
    }

    fn fail(
        &self,
        wo: &WorkOrder,
        op: &Operation,
        actor: &str,
        err: SipError,
        result: &mut ExecutionResult,
    ) -> OperationReport {
        let tag = if err.is_integrity_fault() {
            "INTEGRITY_FAULT"
        } else {
            "SIP_FAILED"
        };
        warn!(wo_id = %wo.wo_id, path = %op.path, error = %err, "local SIP apply failed");
        self.audit
            .note(DecisionEntry::fault(&op.path, actor, tag, err.to_string()).with_wo_id(&wo.wo_id));
        result.errors.push(format!("{}: {err}", op.path));
        OperationReport::new(&op.path, op.operation, Disposition::Failed).with_detail(err.to_string())
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

fn rejection_entry(err: &WorkOrderError, actor: &str) -> DecisionEntry {
    match err {
        WorkOrderError::DangerZoneTarget { path, .. } => {
            DecisionEntry::new(DecisionKind::Denial, path.as_str(), actor, "DANGER_ZONE")
                .with_detail(err.to_string())
        }
        _ => DecisionEntry::fault("", actor, "INVALID_WORK_ORDER", err.to_string()),
    }
}

/// REJECTED when nothing got past routing, FAILED on any local failure or
/// partial rejection, EXECUTING while STRICT work is pending.
fn aggregate_status(result: &ExecutionResult) -> ExecutionStatus {
    let summary = result.summary();
    let delegation_failed = result
        .delegated
        .iter()
        .any(|entry| entry.state == DelegationState::Failed);
    if summary.committed == 0 && summary.delegated == 0 && summary.failed == 0 {
        ExecutionStatus::Rejected
    } else if summary.failed > 0 || summary.rejected > 0 || delegation_failed {
        ExecutionStatus::Failed
    } else if summary.pending_delegations > 0 {
        ExecutionStatus::Executing
    } else {
        ExecutionStatus::Completed
    }
}
