//! Lane routing: (trigger, actor, path, operation, context) to a World,
//! Zone, Lane and primary writer.

mod auto_approve;
mod decision;
mod lane_router;

use thiserror::Error;

use crate::governance::{OperationKind, RequestContext};

pub use auto_approve::{AutoApproveConditions, MissionScope};
pub use decision::{
    BACKGROUND_POLICY_DOCUMENTS, CLI_POLICY_DOCUMENTS, RoutingDecision, policy_documents,
};
pub use lane_router::LaneRouter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("unknown trigger '{trigger}' and no work order in context")]
    UnknownTrigger { trigger: String },
    #[error("cannot route an empty path")]
    EmptyPath,
}

/// Stateless routing. Implementations must be deterministic for a given
/// configuration.
pub trait Router: Send + Sync {
    fn route(
        &self,
        trigger: &str,
        actor: &str,
        path: &str,
        operation: OperationKind,
        context: &RequestContext,
    ) -> Result<RoutingDecision, RoutingError>;
}
