//! Tracing configuration

use serde::{Deserialize, Serialize};

/// Verbosity for the structured log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl TraceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TraceLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DebugConfig {
    #[serde(default)]
    pub trace_level: TraceLevel,

    /// Extra targets, e.g. `laneguard_core::sip=debug`.
    #[serde(default)]
    pub trace_targets: Vec<String>,
}

impl DebugConfig {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(&self) -> String {
        let mut directive = self.trace_level.as_str().to_string();
        for target in &self.trace_targets {
            let target = target.trim();
            if target.is_empty() {
                continue;
            }
            directive.push(',');
            directive.push_str(target);
        }
        directive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_falls_back_to_default() {
        let config: DebugConfig = toml::from_str("trace_level = \"loud\"").unwrap();
        assert_eq!(config.trace_level, TraceLevel::Warn);
    }

    #[test]
    fn directive_appends_targets() {
        let config = DebugConfig {
            trace_level: TraceLevel::Info,
            trace_targets: vec!["laneguard_core::sip=trace".into(), " ".into()],
        };
        assert_eq!(config.filter_directive(), "info,laneguard_core::sip=trace");
    }
}
