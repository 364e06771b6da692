use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::content_scanner::ContentFinding;
use crate::governance::Zone;

/// Why a write was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    EmptyPath,
    PathTraversal,
    ControlCharacter,
    ForbiddenCharacter,
    ForbiddenPrefix,
    InvalidEncoding,
    OutsideRoot,
    ForbiddenContent,
    DangerZone,
}

impl ViolationKind {
    pub const fn code(self) -> &'static str {
        match self {
            ViolationKind::EmptyPath => "EMPTY_PATH",
            ViolationKind::PathTraversal => "PATH_TRAVERSAL",
            ViolationKind::ControlCharacter => "CONTROL_CHARACTER",
            ViolationKind::ForbiddenCharacter => "FORBIDDEN_CHARACTER",
            ViolationKind::ForbiddenPrefix => "FORBIDDEN_PREFIX",
            ViolationKind::InvalidEncoding => "INVALID_ENCODING",
            ViolationKind::OutsideRoot => "OUTSIDE_ROOT",
            ViolationKind::ForbiddenContent => "FORBIDDEN_CONTENT",
            ViolationKind::DangerZone => "DANGER_ZONE",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Admission verdict for a single write. Denials are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityCheckResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<ViolationKind>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<ContentFinding>,
}

impl SecurityCheckResult {
    pub fn denied(violation: ViolationKind, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            zone: None,
            normalized_path: None,
            violation: Some(violation),
            reason: reason.into(),
            warnings: Vec::new(),
            findings: Vec::new(),
        }
    }

    pub fn allowed(zone: Zone, normalized_path: PathBuf) -> Self {
        Self {
            allowed: true,
            zone: Some(zone),
            normalized_path: Some(normalized_path),
            violation: None,
            reason: format!("write admitted in {zone} zone"),
            warnings: Vec::new(),
            findings: Vec::new(),
        }
    }

    pub fn with_location(mut self, zone: Option<Zone>, normalized_path: Option<PathBuf>) -> Self {
        self.zone = zone;
        self.normalized_path = normalized_path;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_findings(mut self, findings: Vec<ContentFinding>) -> Self {
        self.findings = findings;
        self
    }
}

/// Outcome of checking that a write is carried out through SIP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipComplianceReport {
    pub compliant: bool,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl SipComplianceReport {
    pub fn summary(&self) -> String {
        if self.compliant {
            format!("{} is SIP compliant", self.path)
        } else {
            format!("{} is not SIP compliant: {}", self.path, self.issues.join("; "))
        }
    }
}
