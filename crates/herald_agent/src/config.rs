//! Agent configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::agent::DEFAULT_CHECK_INTERVAL_SECS;
use herald_discovery::DEFAULT_BROADCAST_LIST;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Addresses searched for registries.
    #[serde(default = "default_broadcast_list")]
    pub broadcast_list: Vec<String>,
    /// Seconds between registration checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Optional identifier suffix distinguishing this registrant.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_broadcast_list() -> Vec<String> {
    DEFAULT_BROADCAST_LIST.iter().map(|s| s.to_string()).collect()
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            broadcast_list: default_broadcast_list(),
            check_interval_secs: default_check_interval(),
            name: None,
        }
    }
}

/// Read configuration from a TOML file, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if path.exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let config: AgentConfig =
            toml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        Ok(config)
    } else {
        Ok(AgentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_missing_fields() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config.check_interval_secs, 15);
        assert_eq!(config.broadcast_list, vec!["255.255.255.255", "localhost"]);
        assert!(config.name.is_none());
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
            broadcast_list = ["192.0.2.255"]
            check_interval_secs = 5
            name = "blue"
            "#,
        )
        .unwrap();
        assert_eq!(config.broadcast_list, vec!["192.0.2.255"]);
        assert_eq!(config.check_interval_secs, 5);
        assert_eq!(config.name.as_deref(), Some("blue"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/herald.toml")).unwrap();
        assert_eq!(config.check_interval_secs, 15);
    }
}
