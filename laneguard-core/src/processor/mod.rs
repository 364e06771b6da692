//! The WO processor: routes every operation of a work order and executes,
//! delegates or rejects it by lane.

mod delegation;
mod lane_processor;
mod quota;

pub use delegation::{InboxDelegation, InlineDelegation, StrictLaneSink};
pub use lane_processor::WorkOrderProcessor;
pub use quota::{AutoApproveQuota, QuotaUsage};
