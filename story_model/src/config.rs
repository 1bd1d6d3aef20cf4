//! Engine configuration, loaded from TOML.
//!
//! Every section and field is optional; missing values fall back to the defaults
//! below, which reproduce the authoring tool's behavior.
//!
//! ```toml
//! [branch]
//! loop_budget_factor = 2
//!
//! [replay]
//! script_roles = ["assistant"]
//! initial_time = 0
//!
//! [script]
//! max_operations = 1000000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::structure::Role;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub branch: BranchConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub script: ScriptConfig,
}

impl EngineConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Branch walker limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Loop detection gives up after `factor × message count` message visits.
    /// A revisit ends the walk sooner for any factor of 1 or more.
    pub loop_budget_factor: usize,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            loop_budget_factor: 2,
        }
    }
}

impl BranchConfig {
    /// Iteration budget for a story with `message_count` messages.
    pub fn budget(&self, message_count: usize) -> usize {
        self.loop_budget_factor.saturating_mul(message_count)
    }
}

/// Script replay policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Only scripts on messages with these roles run during a cache recompute.
    pub script_roles: Vec<Role>,
    /// `currentTime` when neither the global script nor a chapter sets one.
    pub initial_time: i64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            script_roles: vec![Role::Assistant],
            initial_time: 0,
        }
    }
}

impl ReplayConfig {
    pub fn replays_role(&self, role: Role) -> bool {
        self.script_roles.contains(&role)
    }
}

/// Limits applied to script evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Upper bound on interpreter operations per script run; 0 disables the limit.
    pub max_operations: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.branch.budget(10), 20);
        assert!(config.replay.replays_role(Role::Assistant));
        assert!(!config.replay.replays_role(Role::User));
        assert_eq!(config.replay.initial_time, 0);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [branch]
            loop_budget_factor = 3

            [replay]
            script_roles = ["assistant", "user"]
            "#,
        )
        .unwrap();

        assert_eq!(config.branch.loop_budget_factor, 3);
        assert!(config.replay.replays_role(Role::User));
        assert_eq!(config.replay.initial_time, 0);
        assert_eq!(config.script.max_operations, 1_000_000);
    }

    #[test]
    fn test_invalid_toml() {
        let result = EngineConfig::from_toml_str("[branch]\nloop_budget_factor = \"many\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = EngineConfig::from_path("/definitely/not/here/storyloom.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
