//! Work orders: the batch request format shared by the processor and the
//! CLC executor, its validation rules, inbox handling and result values.

mod error;
mod inbox;
mod model;
mod result;
mod validation;

pub use error::{InboxError, WorkOrderError};
pub use inbox::WorkOrderInbox;
pub use model::{Operation, Origin, WorkOrder};
pub use result::{
    DelegationEntry, DelegationState, Disposition, ExecutionResult, ExecutionStatus,
    OperationReport, ResultSummary,
};
pub use validation::{WorkOrderValidator, file_safe_id, is_work_order_file};
