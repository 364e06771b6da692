//! Actor capability table and trigger vocabulary.

use anyhow::{Result, bail};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::constants::{actors, triggers};

/// Static capability table. Membership is explicit; nothing is inferred
/// from how an identity is spelled.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActorsConfig {
    /// Identities that may be the primary writer of a CLI write.
    #[serde(default = "default_writers")]
    pub writers: IndexSet<String>,

    /// Identities that plan work but may never write.
    #[serde(default = "default_planners")]
    pub planners: IndexSet<String>,

    /// The routing identity. Never writes.
    #[serde(default = "default_router_only")]
    pub router_only: String,

    /// Sole primary writer for STRICT / BACKGROUND lanes.
    #[serde(default = "default_background_executor")]
    pub background_executor: String,

    /// Writer allowed to request Mission-Scope auto-approval in LOCKED zones.
    #[serde(default = "default_privileged_writer")]
    pub privileged_writer: String,
}

impl Default for ActorsConfig {
    fn default() -> Self {
        Self {
            writers: default_writers(),
            planners: default_planners(),
            router_only: default_router_only(),
            background_executor: default_background_executor(),
            privileged_writer: default_privileged_writer(),
        }
    }
}

impl ActorsConfig {
    pub fn validate(&self) -> Result<()> {
        let norm = |value: &str| value.trim().to_ascii_uppercase();
        let writers: IndexSet<String> = self.writers.iter().map(|w| norm(w)).collect();
        let planners: IndexSet<String> = self.planners.iter().map(|p| norm(p)).collect();

        if self.background_executor.trim().is_empty() {
            bail!("actors.background_executor must not be empty");
        }
        if let Some(overlap) = writers.intersection(&planners).next() {
            bail!("actor '{overlap}' cannot be both a writer and a planner");
        }
        let router = norm(&self.router_only);
        if writers.contains(&router) || planners.contains(&router) {
            bail!("router-only actor '{router}' must not appear in writers or planners");
        }
        let executor = norm(&self.background_executor);
        if writers.contains(&executor) || planners.contains(&executor) || executor == router {
            bail!("background executor '{executor}' must be a dedicated identity");
        }
        if !writers.contains(&norm(&self.privileged_writer)) {
            bail!(
                "privileged writer '{}' must be listed in actors.writers",
                self.privileged_writer
            );
        }
        Ok(())
    }
}

/// Known trigger tokens for each world.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TriggersConfig {
    #[serde(default = "default_cli_triggers")]
    pub cli: IndexSet<String>,

    #[serde(default = "default_background_triggers")]
    pub background: IndexSet<String>,
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            cli: default_cli_triggers(),
            background: default_background_triggers(),
        }
    }
}

impl TriggersConfig {
    pub fn validate(&self) -> Result<()> {
        let cli: IndexSet<String> = self.cli.iter().map(|t| t.trim().to_ascii_lowercase()).collect();
        if let Some(shared) = self
            .background
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .find(|t| cli.contains(t))
        {
            bail!("trigger '{shared}' is declared for both the CLI and background worlds");
        }
        Ok(())
    }
}

fn to_set(values: &[&str]) -> IndexSet<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn default_writers() -> IndexSet<String> {
    to_set(actors::WRITERS)
}

fn default_planners() -> IndexSet<String> {
    to_set(actors::PLANNERS)
}

fn default_router_only() -> String {
    actors::ROUTER_ONLY.to_string()
}

fn default_background_executor() -> String {
    actors::BACKGROUND_EXECUTOR.to_string()
}

fn default_privileged_writer() -> String {
    actors::PRIVILEGED_WRITER.to_string()
}

fn default_cli_triggers() -> IndexSet<String> {
    to_set(triggers::CLI)
}

fn default_background_triggers() -> IndexSet<String> {
    to_set(triggers::BACKGROUND)
}
