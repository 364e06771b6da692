//! Safe Idempotent Patch: atomic temp-write-then-rename with before/after
//! checksums and per-path locking.

mod engine;
mod error;
mod lock;

pub use engine::{MoveOutcome, SipEngine, SipInterceptor, SipOutcome, SipStage};
pub use error::SipError;
pub use lock::{LockRecord, PathLock, PathLockManager};
