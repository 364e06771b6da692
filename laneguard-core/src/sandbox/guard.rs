use std::path::{Path, PathBuf};

use laneguard_commons::InstallationPaths;
use laneguard_config::GovernanceConfig;
use tracing::{debug, warn};

use super::content_scanner::scan_content_for_forbidden_patterns;
use super::path_validator::PathValidator;
use super::violation::{SecurityCheckResult, SipComplianceReport, ViolationKind};
use crate::governance::{
    ActorRegistry, ActorRole, OperationKind, RequestContext, Zone, ZoneClassifier,
};

/// Admission control for governed writes.
pub trait SandboxGuard: Send + Sync {
    /// Decide whether `actor` may perform `operation` on `path`.
    fn check_write_allowed(
        &self,
        path: &str,
        actor: &str,
        operation: OperationKind,
        content: Option<&str>,
        context: &RequestContext,
    ) -> SecurityCheckResult;

    /// A write is SIP compliant only with an existing temp file and both
    /// checksums in hand.
    fn validate_sip_compliance(
        &self,
        path: &Path,
        temp_file: Option<&Path>,
        checksum_before: Option<&str>,
        checksum_after: Option<&str>,
    ) -> SipComplianceReport {
        let mut issues = Vec::new();
        match temp_file {
            None => issues.push("no temp file reference".to_string()),
            Some(temp) if !temp.exists() => {
                issues.push(format!("temp file {} does not exist", temp.display()));
            }
            Some(_) => {}
        }
        for (label, checksum) in [("before", checksum_before), ("after", checksum_after)] {
            match checksum {
                None => issues.push(format!("checksum_{label} missing")),
                Some(value) if !is_sha256_hex(value) => {
                    issues.push(format!("checksum_{label} is not a SHA-256 hex digest"));
                }
                Some(_) => {}
            }
        }
        SipComplianceReport {
            compliant: issues.is_empty(),
            path: path.display().to_string(),
            issues,
        }
    }
}

/// Production guard: syntax, containment, zone, content and zone rules, in
/// that order, failing fast on the first two.
#[derive(Debug, Clone)]
pub struct PathSandboxGuard {
    validator: PathValidator,
    zones: ZoneClassifier,
    actors: ActorRegistry,
}

impl PathSandboxGuard {
    pub fn new(config: &GovernanceConfig) -> Self {
        let root = config.installation_root().to_path_buf();
        Self {
            validator: PathValidator::new(root.clone(), &config.zones),
            zones: ZoneClassifier::new(root, &config.zones),
            actors: ActorRegistry::from_config(&config.actors),
        }
    }

    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    fn actor_warning(&self, actor: &str) -> Option<String> {
        match self.actors.role(actor) {
            ActorRole::Writer | ActorRole::BackgroundExecutor => None,
            ActorRole::Planner => Some(format!("actor '{actor}' is a planner and never writes")),
            ActorRole::RouterOnly => Some(format!("actor '{actor}' is router-only and never writes")),
            ActorRole::Unknown => Some(format!("actor '{actor}' is not in the capability table")),
        }
    }
}

impl SandboxGuard for PathSandboxGuard {
    fn check_write_allowed(
        &self,
        path: &str,
        actor: &str,
        operation: OperationKind,
        content: Option<&str>,
        context: &RequestContext,
    ) -> SecurityCheckResult {
        let syntax = self.validator.validate_path_syntax(path);
        if !syntax.is_valid {
            let violation = syntax.violation.unwrap_or(ViolationKind::PathTraversal);
            warn!(path, actor, %violation, reason = %syntax.reason, "write denied by path syntax check");
            return SecurityCheckResult::denied(violation, syntax.reason);
        }

        let containment = self.validator.validate_path_within_root(path);
        let Some(normalized) = containment.normalized_path.clone().filter(|_| containment.is_within) else {
            warn!(path, actor, reason = %containment.reason, "write denied outside installation root");
            return SecurityCheckResult::denied(ViolationKind::OutsideRoot, containment.reason)
                .with_location(Some(Zone::Danger), containment.normalized_path);
        };

        let zone = self.zones.classify(&normalized);
        let mut warnings: Vec<String> = self.actor_warning(actor).into_iter().collect();

        let findings = content
            .map(scan_content_for_forbidden_patterns)
            .unwrap_or_default();
        if !findings.is_empty() {
            let names: Vec<&str> = findings.iter().map(|f| f.pattern.as_str()).collect();
            // Only the Locked auto-approval path lets a privileged writer
            // through with a warning.
            if context.auto_approved && zone == Zone::Locked && self.actors.is_privileged(actor) {
                warnings.push(format!(
                    "content matches forbidden signatures on an auto-approved path: {}",
                    names.join(", ")
                ));
            } else {
                warn!(path, actor, signatures = ?names, "write denied by content scan");
                return SecurityCheckResult::denied(
                    ViolationKind::ForbiddenContent,
                    format!("content matches forbidden signatures: {}", names.join(", ")),
                )
                .with_location(Some(zone), Some(normalized))
                .with_warnings(warnings)
                .with_findings(findings);
            }
        }

        if zone == Zone::Danger {
            warn!(path, actor, %operation, "write denied in DANGER zone");
            return SecurityCheckResult::denied(
                ViolationKind::DangerZone,
                format!("{} is in the DANGER zone", normalized.display()),
            )
            .with_location(Some(zone), Some(normalized))
            .with_warnings(warnings)
            .with_findings(findings);
        }

        if (zone == Zone::Locked || context.has_work_order()) && context.sip.is_none() {
            warnings.push(format!(
                "{operation} on {} requires SIP metadata (temp file and checksums)",
                display_relative(self.validator.root(), &normalized)
            ));
        }

        debug!(path, actor, %zone, %operation, warnings = warnings.len(), "write admitted");
        SecurityCheckResult::allowed(zone, normalized)
            .with_warnings(warnings)
            .with_findings(findings)
    }
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(path))
        .display()
        .to_string()
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
