use std::sync::Arc;

use tracing::{info, warn};

use crate::executor::ClcExecutor;
use crate::work_order::{DelegationEntry, DelegationState, ExecutionStatus, WorkOrder, WorkOrderInbox};

/// Where STRICT-lane operations go once the processor has split them off.
pub trait StrictLaneSink: Send + Sync {
    fn delegate(&self, derived: &WorkOrder) -> DelegationEntry;
}

fn entry(derived: &WorkOrder, state: DelegationState, detail: Option<String>) -> DelegationEntry {
    DelegationEntry {
        wo_id: derived.wo_id.clone(),
        paths: derived.target_paths.clone(),
        state,
        detail,
    }
}

/// Drop the derived order into the CLC inbox; the executor picks it up
/// later, so the entry stays pending.
#[derive(Debug, Clone)]
pub struct InboxDelegation {
    inbox: WorkOrderInbox,
}

impl InboxDelegation {
    pub fn new(inbox: WorkOrderInbox) -> Self {
        Self { inbox }
    }
}

impl StrictLaneSink for InboxDelegation {
    fn delegate(&self, derived: &WorkOrder) -> DelegationEntry {
        match self.inbox.enqueue(derived) {
            Ok(path) => entry(
                derived,
                DelegationState::Pending,
                Some(format!("queued at {}", path.display())),
            ),
            Err(err) => {
                warn!(wo_id = %derived.wo_id, error = %err, "failed to queue STRICT work order");
                entry(derived, DelegationState::Failed, Some(err.to_string()))
            }
        }
    }
}

/// Run the derived order through the executor before returning.
#[derive(Debug, Clone)]
pub struct InlineDelegation {
    executor: Arc<ClcExecutor>,
}

impl InlineDelegation {
    pub fn new(executor: Arc<ClcExecutor>) -> Self {
        Self { executor }
    }
}

impl StrictLaneSink for InlineDelegation {
    fn delegate(&self, derived: &WorkOrder) -> DelegationEntry {
        let result = self.executor.execute_work_order(derived);
        info!(wo_id = %derived.wo_id, status = %result.status, "inline STRICT execution finished");
        match result.status {
            ExecutionStatus::Completed => entry(derived, DelegationState::Completed, None),
            _ => entry(derived, DelegationState::Failed, Some(result.errors.join("; "))),
        }
    }
}
