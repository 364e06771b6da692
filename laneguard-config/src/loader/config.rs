use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use laneguard_commons::{InstallationPaths, canonicalize_root};
use serde::{Deserialize, Serialize};

use crate::core::{
    ActorsConfig, AuditConfig, InstallationConfig, LocksConfig, MissionScopeConfig,
    PolicyLimitsConfig, TriggersConfig, WorkOrdersConfig, ZonesConfig,
};
use crate::debug::DebugConfig;

/// Complete engine configuration, read once at startup and shared
/// read-only afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub installation: InstallationConfig,

    #[serde(default)]
    pub actors: ActorsConfig,

    #[serde(default)]
    pub triggers: TriggersConfig,

    #[serde(default)]
    pub zones: ZonesConfig,

    #[serde(default)]
    pub mission_scope: MissionScopeConfig,

    #[serde(default)]
    pub policy_limits: PolicyLimitsConfig,

    #[serde(default)]
    pub locks: LocksConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub work_orders: WorkOrdersConfig,

    #[serde(default)]
    pub debug: DebugConfig,

    /// Absolute installation root, filled in by [`GovernanceConfig::anchor`].
    #[serde(skip)]
    resolved_root: PathBuf,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        let installation = InstallationConfig::default();
        let resolved_root = installation.root.clone();
        Self {
            installation,
            actors: ActorsConfig::default(),
            triggers: TriggersConfig::default(),
            zones: ZonesConfig::default(),
            mission_scope: MissionScopeConfig::default(),
            policy_limits: PolicyLimitsConfig::default(),
            locks: LocksConfig::default(),
            audit: AuditConfig::default(),
            work_orders: WorkOrdersConfig::default(),
            debug: DebugConfig::default(),
            resolved_root,
        }
    }
}

impl GovernanceConfig {
    /// Parse a TOML document. The result is not anchored yet.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse laneguard configuration")
    }

    /// Resolve `installation.root` against `base_dir` and canonicalize it.
    pub fn anchor(mut self, base_dir: &Path) -> Self {
        let root = if self.installation.root.is_absolute() {
            self.installation.root.clone()
        } else {
            base_dir.join(&self.installation.root)
        };
        self.resolved_root = canonicalize_root(&root);
        self
    }

    /// Replace the installation root, e.g. from `--root`.
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.installation.root = root.as_ref().to_path_buf();
        self.resolved_root = canonicalize_root(root.as_ref());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.actors
            .validate()
            .context("Invalid [actors] configuration")?;
        self.triggers
            .validate()
            .context("Invalid [triggers] configuration")?;
        self.zones.validate().context("Invalid [zones] configuration")?;
        self.locks.validate().context("Invalid [locks] configuration")?;
        ensure!(
            !self.installation.root.as_os_str().is_empty(),
            "installation.root must not be empty"
        );
        ensure!(
            !self.installation.state_dir.as_os_str().is_empty(),
            "installation.state_dir must not be empty"
        );
        Ok(())
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.resolve(&self.audit.directory)
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.resolve(&self.work_orders.inbox)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.resolve(&self.work_orders.processed)
    }

    pub fn error_dir(&self) -> PathBuf {
        self.resolve(&self.work_orders.error)
    }

    pub fn clc_inbox_dir(&self) -> PathBuf {
        self.resolve(&self.work_orders.clc_inbox)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.resolve(&self.work_orders.backup_dir)
    }
}

impl InstallationPaths for GovernanceConfig {
    fn installation_root(&self) -> &Path {
        &self.resolved_root
    }

    fn state_dir(&self) -> PathBuf {
        self.resolve(&self.installation.state_dir)
    }
}
