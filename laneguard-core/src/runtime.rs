//! Production wiring of router, guard, SIP engine, audit trail, processor
//! and executor from one [`GovernanceConfig`].

use std::sync::Arc;

use laneguard_commons::InstallationPaths;
use laneguard_config::GovernanceConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audit::{AuditTrail, DecisionEntry};
use crate::error::{GovernanceError, Result};
use crate::executor::ClcExecutor;
use crate::governance::{OperationKind, RequestContext, RiskLevel, World, ZoneClassifier};
use crate::processor::{
    AutoApproveQuota, InboxDelegation, InlineDelegation, StrictLaneSink, WorkOrderProcessor,
};
use crate::router::{LaneRouter, Router, RoutingDecision};
use crate::sandbox::{PathSandboxGuard, SandboxGuard, SecurityCheckResult};
use crate::sip::{PathLockManager, SipEngine};
use crate::work_order::{ExecutionResult, Operation, WorkOrder, WorkOrderInbox, WorkOrderValidator};

/// How the processor hands STRICT-lane work to the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationMode {
    /// Enqueue into the CLC inbox and report the delegation as pending.
    #[default]
    Inbox,
    /// Run the executor before returning.
    Inline,
}

pub struct GovernanceRuntime {
    config: Arc<GovernanceConfig>,
    router: Arc<LaneRouter>,
    guard: Arc<PathSandboxGuard>,
    sip: SipEngine,
    audit: Arc<AuditTrail>,
    executor: Arc<ClcExecutor>,
    processor: WorkOrderProcessor,
}

impl std::fmt::Debug for GovernanceRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceRuntime")
            .field("root", &self.config.installation_root())
            .field("executor", &self.executor)
            .field("processor", &self.processor)
            .finish_non_exhaustive()
    }
}

impl GovernanceRuntime {
    pub fn from_config(config: Arc<GovernanceConfig>, mode: DelegationMode) -> Result<Self> {
        config.validate().map_err(|err| GovernanceError::Config {
            message: format!("{err:#}"),
        })?;

        let router = Arc::new(LaneRouter::new(&config));
        let guard = Arc::new(PathSandboxGuard::new(&config));
        let sip = SipEngine::new(
            PathLockManager::new(config.lock_dir(), &config.locks),
            guard.clone(),
        );
        let audit = Arc::new(AuditTrail::from_config(&config)?);
        let validator = WorkOrderValidator::new(ZoneClassifier::new(
            config.installation_root(),
            &config.zones,
        ));

        let executor = Arc::new(ClcExecutor::new(
            guard.clone(),
            sip.clone(),
            validator.clone(),
            audit.clone(),
            &config.actors.background_executor,
            config.backup_dir(),
        ));

        let strict: Arc<dyn StrictLaneSink> = match mode {
            DelegationMode::Inbox => Arc::new(InboxDelegation::new(clc_inbox(&config))),
            DelegationMode::Inline => Arc::new(InlineDelegation::new(executor.clone())),
        };
        let processor = WorkOrderProcessor::new(
            router.clone(),
            guard.clone(),
            sip.clone(),
            validator,
            audit.clone(),
            strict,
        )
        .with_quota(Arc::new(AutoApproveQuota::new(&config.policy_limits)))
        .with_background_executor(&config.actors.background_executor);

        info!(
            root = %config.installation_root().display(),
            ?mode,
            audit = audit.is_enabled(),
            "governance runtime ready"
        );
        Ok(Self {
            config,
            router,
            guard,
            sip,
            audit,
            executor,
            processor,
        })
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn router(&self) -> &LaneRouter {
        &self.router
    }

    pub fn guard(&self) -> &PathSandboxGuard {
        &self.guard
    }

    pub fn sip(&self) -> &SipEngine {
        &self.sip
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn executor(&self) -> &ClcExecutor {
        &self.executor
    }

    pub fn processor(&self) -> &WorkOrderProcessor {
        &self.processor
    }

    /// The processor's inbox and archive directories.
    pub fn processor_inbox(&self) -> WorkOrderInbox {
        WorkOrderInbox::new(
            self.config.inbox_dir(),
            self.config.processed_dir(),
            self.config.error_dir(),
        )
    }

    pub fn clc_inbox(&self) -> WorkOrderInbox {
        clc_inbox(&self.config)
    }

    /// Route a single request and record the decision.
    pub fn route(
        &self,
        trigger: &str,
        actor: &str,
        path: &str,
        operation: OperationKind,
        context: &RequestContext,
    ) -> Result<RoutingDecision> {
        let decision = self.router.route(trigger, actor, path, operation, context)?;
        let mut entry = DecisionEntry::routing(path, actor, &decision);
        if let Some(wo_id) = &context.wo_id {
            entry = entry.with_wo_id(wo_id);
        }
        self.audit.note(entry);
        Ok(decision)
    }

    /// Run the admission check and record denials.
    pub fn check_write_allowed(
        &self,
        path: &str,
        actor: &str,
        operation: OperationKind,
        content: Option<&str>,
        context: &RequestContext,
    ) -> SecurityCheckResult {
        let check = self
            .guard
            .check_write_allowed(path, actor, operation, content, context);
        if !check.allowed {
            self.audit.note(DecisionEntry::denial(path, actor, &check));
        }
        check
    }

    /// Apply one interactive write through the processor as a single-operation
    /// CLI work order.
    pub fn apply_cli_write(&self, actor: &str, operation: Operation, risk: RiskLevel) -> ExecutionResult {
        let short = uuid::Uuid::new_v4().simple().to_string();
        let wo_id = format!("CLI-{}", short.get(..12).unwrap_or(&short));
        debug!(%wo_id, path = %operation.path, "wrapping interactive write");
        let wo = WorkOrder::new(wo_id, World::Cli, actor, risk, vec![operation]);
        self.processor.process_wo_with_lane_routing(&wo)
    }
}

fn clc_inbox(config: &GovernanceConfig) -> WorkOrderInbox {
    WorkOrderInbox::new(
        config.clc_inbox_dir(),
        config.processed_dir(),
        config.error_dir(),
    )
}
