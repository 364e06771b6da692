//! Zone classification.
//!
//! Classification is lexical: it operates on the normalized absolute form of
//! the path and never touches the filesystem. Callers that need the zone of
//! the real target (the router and the sandbox guard) classify the
//! symlink-resolved path as well.

use std::path::{Path, PathBuf};

use laneguard_commons::{expand_home, matches_prefix, normalize_path, to_slash_string};
use laneguard_config::ZonesConfig;
use serde::{Deserialize, Serialize};

/// Sensitivity of a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Zone {
    Open,
    Locked,
    Danger,
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Zone::Open => write!(f, "OPEN"),
            Zone::Locked => write!(f, "LOCKED"),
            Zone::Danger => write!(f, "DANGER"),
        }
    }
}

/// Zone plus the path forms it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneResolution {
    pub zone: Zone,
    /// Absolute, lexically normalized path.
    pub normalized: PathBuf,
    /// `/`-separated path relative to the installation root, when inside it.
    pub relative: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ZoneClassifier {
    root: PathBuf,
    locked_prefixes: Vec<String>,
    danger_prefixes: Vec<PathBuf>,
    credential_dirs: Vec<PathBuf>,
}

impl ZoneClassifier {
    pub fn new(root: impl Into<PathBuf>, config: &ZonesConfig) -> Self {
        let root = normalize_path(&root.into());
        Self {
            root,
            locked_prefixes: config
                .locked_prefixes
                .iter()
                .map(|prefix| prefix.trim().to_string())
                .collect(),
            danger_prefixes: config
                .danger_prefixes
                .iter()
                .map(|prefix| normalize_path(Path::new(prefix.trim())))
                .collect(),
            credential_dirs: config
                .credential_dirs
                .iter()
                .map(|dir| normalize_path(&expand_home(dir.trim())))
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classify(&self, path: &Path) -> Zone {
        self.classify_with_relative(path).zone
    }

    pub fn classify_with_relative(&self, path: &Path) -> ZoneResolution {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let normalized = normalize_path(&absolute);
        let relative = normalized
            .strip_prefix(&self.root)
            .ok()
            .map(to_slash_string);

        let zone = match relative.as_deref() {
            _ if self.is_danger(&normalized) => Zone::Danger,
            None => Zone::Danger,
            Some(rel) if self.is_locked(rel) => Zone::Locked,
            Some(_) => Zone::Open,
        };

        ZoneResolution {
            zone,
            normalized,
            relative,
        }
    }

    fn is_danger(&self, normalized: &Path) -> bool {
        if self
            .credential_dirs
            .iter()
            .any(|dir| normalized.starts_with(dir))
        {
            return true;
        }
        // A system prefix that contains the installation root itself (for
        // instance a root under /var) cannot make the whole root DANGER.
        self.danger_prefixes
            .iter()
            .any(|prefix| normalized.starts_with(prefix) && !self.root.starts_with(prefix))
    }

    fn is_locked(&self, relative: &str) -> bool {
        self.locked_prefixes
            .iter()
            .any(|prefix| matches_prefix(relative, prefix))
    }
}
