//! Admission checks for governed writes: path syntax, root containment,
//! zone rules and content signatures.

mod content_scanner;
mod guard;
mod path_validator;
mod violation;

pub use content_scanner::{ContentFinding, scan_content_for_forbidden_patterns, signature_names};
pub use guard::{PathSandboxGuard, SandboxGuard};
pub use path_validator::{PathSyntaxCheck, PathValidator, RootCheck, decode_path};
pub use violation::{SecurityCheckResult, SipComplianceReport, ViolationKind};
