use laneguard_commons::matches_prefix;
use laneguard_config::MissionScopeConfig;
use serde::{Deserialize, Serialize};

/// Whitelist / blacklist prefix policy for privileged auto-approval.
#[derive(Debug, Clone, Default)]
pub struct MissionScope {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl MissionScope {
    pub fn from_config(config: &MissionScopeConfig) -> Self {
        Self {
            whitelist: config.whitelist.iter().map(|p| p.trim().to_string()).collect(),
            blacklist: config.blacklist.iter().map(|p| p.trim().to_string()).collect(),
        }
    }

    pub fn in_whitelist(&self, relative: &str) -> bool {
        self.whitelist.iter().any(|prefix| matches_prefix(relative, prefix))
    }

    pub fn in_blacklist(&self, relative: &str) -> bool {
        self.blacklist.iter().any(|prefix| matches_prefix(relative, prefix))
    }
}

/// The eight predicates behind a Mission-Scope auto-approval. Approval is
/// their strict conjunction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoApproveConditions {
    pub actor_is_privileged: bool,
    pub zone_is_locked: bool,
    pub path_in_whitelist: bool,
    pub path_not_in_blacklist: bool,
    pub risk_is_low: bool,
    pub rollback_strategy_present: bool,
    pub audit_log_enabled: bool,
    pub similar_change_approved: bool,
}

impl AutoApproveConditions {
    fn named(&self) -> [(&'static str, bool); 8] {
        [
            ("actor_is_privileged", self.actor_is_privileged),
            ("zone_is_locked", self.zone_is_locked),
            ("path_in_whitelist", self.path_in_whitelist),
            ("path_not_in_blacklist", self.path_not_in_blacklist),
            ("risk_is_low", self.risk_is_low),
            ("rollback_strategy_present", self.rollback_strategy_present),
            ("audit_log_enabled", self.audit_log_enabled),
            ("similar_change_approved", self.similar_change_approved),
        ]
    }

    pub fn all_met(&self) -> bool {
        self.named().iter().all(|(_, met)| *met)
    }

    /// Names of the predicates that are false, in declaration order.
    pub fn failed(&self) -> Vec<&'static str> {
        self.named()
            .into_iter()
            .filter_map(|(name, met)| (!met).then_some(name))
            .collect()
    }
}
