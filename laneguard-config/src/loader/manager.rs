use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::constants::{CONFIG_FILE_NAME, CONFIG_PATH_ENV, ROOT_ENV};
use crate::loader::config::GovernanceConfig;

/// Locates, parses, anchors and validates the configuration.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: GovernanceConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Resolution order: `LANEGUARD_CONFIG_PATH`, then
    /// `LANEGUARD_ROOT/laneguard.toml`, then `./laneguard.toml`, then
    /// compiled-in defaults rooted at the current directory.
    pub fn load() -> Result<Self> {
        if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
            let trimmed = config_path.trim();
            if !trimmed.is_empty() {
                return Self::load_from_file(trimmed).with_context(|| {
                    format!("Failed to load configuration from {CONFIG_PATH_ENV}={trimmed}")
                });
            }
        }

        if let Ok(root) = std::env::var(ROOT_ENV) {
            let trimmed = root.trim();
            if !trimmed.is_empty() {
                return Self::load_from_root(trimmed).with_context(|| {
                    format!("Failed to load configuration from {ROOT_ENV}={trimmed}")
                });
            }
        }

        let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
        Self::load_from_root(cwd)
    }

    /// Load `<root>/laneguard.toml` if present, otherwise defaults rooted at
    /// `root`.
    pub fn load_from_root(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Self::load_from_file(&candidate);
        }

        debug!(root = %root.display(), "no configuration file found, using defaults");
        let config = GovernanceConfig::default().with_root(root);
        config
            .validate()
            .context("Default configuration failed validation")?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// Load a specific file. A relative `installation.root` resolves against
    /// the file's directory.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let config = GovernanceConfig::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?
            .anchor(&base_dir);
        config
            .validate()
            .with_context(|| format!("Failed to validate config file {}", path.display()))?;

        debug!(path = %path.display(), "loaded configuration");
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Override the installation root after loading (CLI `--root`).
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config = self.config.with_root(root);
        self
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn into_config(self) -> GovernanceConfig {
        self.config
    }
}
