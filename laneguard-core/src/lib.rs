//! Governance routing and sandboxed execution for filesystem writes.
//!
//! Every write an agent proposes is classified by origin ([`World`]), target
//! sensitivity ([`Zone`]) and acting identity into a [`Lane`], admitted or
//! denied by a [`SandboxGuard`], and carried out through the [`SipEngine`]
//! as an atomic, checksummed temp-write-then-rename. Batches arrive as
//! [`WorkOrder`]s: the [`WorkOrderProcessor`] splits them by lane and the
//! [`ClcExecutor`] applies STRICT-lane orders with rollback. Every decision
//! and execution lands in the [`AuditTrail`].
//!
//! [`GovernanceRuntime`] wires the production implementations from a
//! [`laneguard_config::GovernanceConfig`]; [`testing`] holds deterministic
//! doubles for the [`Router`] and [`SandboxGuard`] seams.

pub mod audit;
pub mod error;
pub mod executor;
pub mod governance;
pub mod processor;
pub mod router;
pub mod runtime;
pub mod sandbox;
pub mod sip;
pub mod testing;
pub mod work_order;

pub use audit::{AuditError, AuditTrail, DecisionEntry, DecisionKind, DecisionLog, ExecutionRecord};
pub use error::{GovernanceError, Result};
pub use executor::{ClcExecutor, RollbackJournal, RollbackReport};
pub use governance::{
    ActorRegistry, ActorRole, Lane, OperationKind, RequestContext, RiskLevel, RollbackStrategy,
    SipMetadata, World, Zone, ZoneClassifier,
};
pub use processor::{
    AutoApproveQuota, InboxDelegation, InlineDelegation, StrictLaneSink, WorkOrderProcessor,
};
pub use router::{AutoApproveConditions, LaneRouter, Router, RoutingDecision, RoutingError};
pub use runtime::{DelegationMode, GovernanceRuntime};
pub use sandbox::{
    ContentFinding, PathSandboxGuard, PathValidator, SandboxGuard, SecurityCheckResult,
    SipComplianceReport, ViolationKind, scan_content_for_forbidden_patterns,
};
pub use sip::{PathLockManager, SipEngine, SipError, SipInterceptor, SipOutcome, SipStage};
pub use work_order::{
    DelegationEntry, DelegationState, Disposition, ExecutionResult, ExecutionStatus, InboxError,
    Operation, OperationReport, WorkOrder, WorkOrderError, WorkOrderInbox, WorkOrderValidator,
};
