use std::collections::HashSet;

use laneguard_config::ActorsConfig;
use serde::{Deserialize, Serialize};

/// Capability class of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Writer,
    Planner,
    RouterOnly,
    BackgroundExecutor,
    Unknown,
}

/// Static capability table built from `[actors]`. Identities compare as
/// trimmed ASCII upper case.
#[derive(Debug, Clone)]
pub struct ActorRegistry {
    writers: HashSet<String>,
    planners: HashSet<String>,
    router_only: String,
    background_executor: String,
    privileged_writer: String,
}

impl ActorRegistry {
    pub fn from_config(config: &ActorsConfig) -> Self {
        Self {
            writers: config.writers.iter().map(|w| canonical_actor(w)).collect(),
            planners: config.planners.iter().map(|p| canonical_actor(p)).collect(),
            router_only: canonical_actor(&config.router_only),
            background_executor: canonical_actor(&config.background_executor),
            privileged_writer: canonical_actor(&config.privileged_writer),
        }
    }

    pub fn role(&self, actor: &str) -> ActorRole {
        let actor = canonical_actor(actor);
        if actor == self.background_executor {
            ActorRole::BackgroundExecutor
        } else if actor == self.router_only {
            ActorRole::RouterOnly
        } else if self.planners.contains(&actor) {
            ActorRole::Planner
        } else if self.writers.contains(&actor) {
            ActorRole::Writer
        } else {
            ActorRole::Unknown
        }
    }

    pub fn is_writer(&self, actor: &str) -> bool {
        self.role(actor) == ActorRole::Writer
    }

    pub fn is_privileged(&self, actor: &str) -> bool {
        canonical_actor(actor) == self.privileged_writer
    }

    pub fn background_executor(&self) -> &str {
        &self.background_executor
    }

    pub fn privileged_writer(&self) -> &str {
        &self.privileged_writer
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::from_config(&ActorsConfig::default())
    }
}

pub fn canonical_actor(actor: &str) -> String {
    actor.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_come_from_the_table_only() {
        let registry = ActorRegistry::default();
        assert_eq!(registry.role("cls"), ActorRole::Writer);
        assert_eq!(registry.role("GG"), ActorRole::Planner);
        assert_eq!(registry.role("Mary"), ActorRole::RouterOnly);
        assert_eq!(registry.role("CLC"), ActorRole::BackgroundExecutor);
        // Looks like a writer name, but is not in the table.
        assert_eq!(registry.role("CLS2"), ActorRole::Unknown);
    }

    #[test]
    fn privileged_writer_is_case_insensitive() {
        let registry = ActorRegistry::default();
        assert!(registry.is_privileged(" cls "));
        assert!(!registry.is_privileged("CODEX"));
    }
}
