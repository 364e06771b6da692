//! Syntax and containment checks for candidate write paths.
//!
//! Hidden traversal is handled by decoding first and validating the decoded
//! form: percent-encoding is peeled until it reaches a fixed point (at most
//! three layers) and backslashes are read as separators. Unicode look-alikes
//! such as full-width dots or overlong UTF-8 sequences are not folded; the
//! containment check still catches any of them that would actually escape.

use std::path::{Path, PathBuf};

use laneguard_commons::{
    canonicalize_allow_missing, expand_home, normalize_path, to_slash_string,
};
use laneguard_config::ZonesConfig;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use super::violation::ViolationKind;

/// Encoding layers peeled before a path is considered deliberately obscured.
const MAX_DECODE_ROUNDS: usize = 3;

/// Characters never allowed in a governed path.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSyntaxCheck {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<ViolationKind>,
    pub reason: String,
}

impl PathSyntaxCheck {
    fn valid() -> Self {
        Self {
            is_valid: true,
            violation: None,
            reason: "path syntax is valid".to_string(),
        }
    }

    fn invalid(violation: ViolationKind, reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            violation: Some(violation),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCheck {
    pub is_within: bool,
    /// Canonical absolute path (symlinks resolved, missing tail appended).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    pub reason: String,
}

impl RootCheck {
    fn outside(normalized_path: Option<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            is_within: false,
            normalized_path,
            relative_path: None,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathValidator {
    root: PathBuf,
    forbidden_prefixes: Vec<PathBuf>,
}

impl PathValidator {
    /// `root` must already be canonical.
    pub fn new(root: impl Into<PathBuf>, zones: &ZonesConfig) -> Self {
        let forbidden_prefixes = zones
            .danger_prefixes
            .iter()
            .map(|prefix| normalize_path(Path::new(prefix.trim())))
            .chain(
                zones
                    .credential_dirs
                    .iter()
                    .map(|dir| normalize_path(&expand_home(dir.trim()))),
            )
            .collect();
        Self {
            root: root.into(),
            forbidden_prefixes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validate_path_syntax(&self, raw: &str) -> PathSyntaxCheck {
        if raw.trim().is_empty() {
            return PathSyntaxCheck::invalid(ViolationKind::EmptyPath, "path is empty");
        }
        if has_parent_component(raw) {
            return PathSyntaxCheck::invalid(
                ViolationKind::PathTraversal,
                "path contains a '..' component",
            );
        }

        let decoded = match decode_path(raw) {
            Ok(decoded) => decoded,
            Err(reason) => return PathSyntaxCheck::invalid(ViolationKind::InvalidEncoding, reason),
        };
        if has_parent_component(&decoded) {
            return PathSyntaxCheck::invalid(
                ViolationKind::PathTraversal,
                "path contains an encoded '..' component",
            );
        }
        if let Some(ch) = decoded.chars().find(char::is_ascii_control) {
            return PathSyntaxCheck::invalid(
                ViolationKind::ControlCharacter,
                format!("path contains control character U+{:04X}", u32::from(ch)),
            );
        }
        if let Some(ch) = decoded.chars().find(|ch| FORBIDDEN_CHARS.contains(ch)) {
            return PathSyntaxCheck::invalid(
                ViolationKind::ForbiddenCharacter,
                format!("path contains forbidden character '{ch}'"),
            );
        }

        let expanded = expand_home(&decoded);
        if expanded.is_absolute() {
            let normalized = normalize_path(&expanded);
            if let Some(prefix) = self.forbidden_prefix_for(&normalized) {
                return PathSyntaxCheck::invalid(
                    ViolationKind::ForbiddenPrefix,
                    format!("path is under forbidden prefix {}", prefix.display()),
                );
            }
        }

        PathSyntaxCheck::valid()
    }

    pub fn validate_path_within_root(&self, raw: &str) -> RootCheck {
        let decoded = match decode_path(raw) {
            Ok(decoded) => decoded,
            Err(reason) => return RootCheck::outside(None, reason),
        };
        let expanded = expand_home(&decoded);
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        };

        let resolved = match canonicalize_allow_missing(&normalize_path(&absolute)) {
            Ok(resolved) => resolved,
            Err(error) => {
                return RootCheck::outside(
                    None,
                    format!("cannot resolve {}: {error}", absolute.display()),
                );
            }
        };

        match resolved.strip_prefix(&self.root) {
            Ok(relative) => RootCheck {
                is_within: true,
                relative_path: Some(to_slash_string(relative)),
                normalized_path: Some(resolved),
                reason: "path resolves inside the installation root".to_string(),
            },
            Err(_) => RootCheck::outside(
                Some(resolved.clone()),
                format!(
                    "{} resolves outside the installation root {}",
                    resolved.display(),
                    self.root.display()
                ),
            ),
        }
    }

    fn forbidden_prefix_for(&self, path: &Path) -> Option<&Path> {
        self.forbidden_prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix) && !self.root.starts_with(prefix))
            .map(PathBuf::as_path)
    }
}

/// Percent-decode until stable and fold `\` into `/`.
pub fn decode_path(raw: &str) -> Result<String, String> {
    let mut current = raw.to_string();
    for _ in 0..=MAX_DECODE_ROUNDS {
        let decoded = percent_decode_str(&current)
            .decode_utf8()
            .map_err(|_| "path decodes to invalid UTF-8".to_string())?
            .into_owned();
        if decoded == current {
            return Ok(current.replace('\\', "/"));
        }
        current = decoded;
    }
    Err(format!(
        "path is percent-encoded more than {MAX_DECODE_ROUNDS} times"
    ))
}

fn has_parent_component(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn validator(root: &Path) -> PathValidator {
        PathValidator::new(root.to_path_buf(), &ZonesConfig::default())
    }

    fn violation(raw: &str) -> Option<ViolationKind> {
        validator(Path::new("/srv/platform"))
            .validate_path_syntax(raw)
            .violation
    }

    #[test]
    fn traversal_variants_are_rejected() {
        for raw in [
            "../etc/passwd",
            "apps/../../etc",
            "apps\\..\\..\\etc",
            "%2e%2e/etc",
            "%2E%2E%2Fetc",
            "%252e%252e/etc",
            "apps%5c..%5cetc",
            "..%2fapps",
        ] {
            assert_eq!(violation(raw), Some(ViolationKind::PathTraversal), "{raw}");
        }
    }

    #[test]
    fn dotted_names_are_not_traversal() {
        assert_eq!(violation("apps/..hidden/x"), None);
        assert_eq!(violation("apps/v1..2/x"), None);
    }

    #[test]
    fn excessive_encoding_is_rejected() {
        assert_eq!(violation("%2525252e"), Some(ViolationKind::InvalidEncoding));
        assert_eq!(violation("apps/%ff"), Some(ViolationKind::InvalidEncoding));
    }

    #[test]
    fn hostile_characters_are_rejected() {
        assert_eq!(violation(""), Some(ViolationKind::EmptyPath));
        assert_eq!(violation("   "), Some(ViolationKind::EmptyPath));
        assert_eq!(violation("apps/a\0b"), Some(ViolationKind::ControlCharacter));
        assert_eq!(violation("apps/a%0ab"), Some(ViolationKind::ControlCharacter));
        assert_eq!(violation("apps/a\u{7f}"), Some(ViolationKind::ControlCharacter));
        assert_eq!(violation("apps/a|b"), Some(ViolationKind::ForbiddenCharacter));
        assert_eq!(violation("apps/*.py"), Some(ViolationKind::ForbiddenCharacter));
    }

    #[test]
    fn system_and_credential_prefixes_are_rejected() {
        assert_eq!(violation("/etc/hosts"), Some(ViolationKind::ForbiddenPrefix));
        assert_eq!(violation("%2Fetc%2Fshadow"), Some(ViolationKind::ForbiddenPrefix));
        assert_eq!(violation("/etcetera/file"), None);
        if expand_home("~") != Path::new("~") {
            assert_eq!(
                violation("~/.ssh/authorized_keys"),
                Some(ViolationKind::ForbiddenPrefix)
            );
        }
    }

    #[test]
    fn root_under_a_system_prefix_is_exempt() {
        let validator = validator(Path::new("/var/folders/ab/install"));
        assert!(validator.validate_path_syntax("/var/folders/ab/install/x").is_valid);
        assert!(!validator.validate_path_syntax("/etc/passwd").is_valid);
    }

    #[test]
    fn within_root_resolves_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let root = laneguard_commons::canonicalize_root(dir.path());
        let check = validator(&root).validate_path_within_root("apps/new/file.py");
        assert!(check.is_within, "{}", check.reason);
        assert_eq!(check.relative_path.as_deref(), Some("apps/new/file.py"));
        assert_eq!(check.normalized_path, Some(root.join("apps/new/file.py")));
    }

    #[test]
    fn absolute_path_elsewhere_is_outside() {
        let dir = tempfile::tempdir().unwrap();
        let root = laneguard_commons::canonicalize_root(dir.path());
        let other = tempfile::tempdir().unwrap();
        let raw = other.path().join("x.txt");
        let check = validator(&root).validate_path_within_root(&raw.to_string_lossy());
        assert!(!check.is_within);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_ancestor_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = laneguard_commons::canonicalize_root(dir.path());
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("escape")).unwrap();

        let check = validator(&root).validate_path_within_root("escape/not-yet/file.txt");
        assert!(!check.is_within);
        assert!(check.reason.contains("outside"));
    }
}
