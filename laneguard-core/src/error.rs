use thiserror::Error;

use crate::audit::AuditError;
use crate::router::RoutingError;
use crate::sip::SipError;
use crate::work_order::{InboxError, WorkOrderError};

/// Any failure surfaced by the engine as an error rather than as a result
/// value.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Sip(#[from] SipError),

    #[error(transparent)]
    WorkOrder(#[from] WorkOrderError),

    #[error(transparent)]
    Inbox(#[from] InboxError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
