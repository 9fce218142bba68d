use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Upper bound on retained undo snapshots.
pub const MAX_HISTORY_DEPTH: usize = 4096;

pub const DEFAULT_HISTORY_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How a derived selection behaves when none of its previously selected refs survive an
/// edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Fall back to the first candidate whenever the candidate pool is non-empty.
    #[default]
    NeverEmpty,
    /// Keep the selection empty until the consumer picks something.
    AllowEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StateConfig {
    /// Number of previous trees kept for undo. Zero disables history.
    pub history_depth: usize,
    pub selection_policy: SelectionPolicy,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            selection_policy: SelectionPolicy::default(),
        }
    }
}

impl StateConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: StateConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth > MAX_HISTORY_DEPTH {
            return Err(ConfigError::InvalidValue {
                name: "history-depth",
                reason: format!("must be at most {MAX_HISTORY_DEPTH}"),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct StateConfigBuilder {
    history_depth: Option<usize>,
    selection_policy: Option<SelectionPolicy>,
}

impl StateConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_depth(mut self, depth: usize) -> Self {
        self.history_depth = Some(depth);
        self
    }
    pub fn selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selection_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<StateConfig, ConfigError> {
        let config = StateConfig {
            history_depth: self.history_depth.unwrap_or(DEFAULT_HISTORY_DEPTH),
            selection_policy: self.selection_policy.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn builder_fills_defaults() {
        let config = StateConfigBuilder::new().build().unwrap();
        assert_eq!(config, StateConfig::default());
        assert_eq!(config.selection_policy, SelectionPolicy::NeverEmpty);
    }

    #[test]
    fn builder_rejects_oversized_history() {
        let err = StateConfigBuilder::new()
            .history_depth(MAX_HISTORY_DEPTH + 1)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "history-depth",
                ..
            }
        ));
    }

    #[test]
    fn parses_kebab_case_toml() {
        let config = StateConfig::from_toml_str(
            "history-depth = 8\nselection-policy = \"allow-empty\"\n",
        )
        .unwrap();
        assert_eq!(config.history_depth, 8);
        assert_eq!(config.selection_policy, SelectionPolicy::AllowEmpty);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = StateConfig::from_toml_str("history-depth = 3").unwrap();
        assert_eq!(config.selection_policy, SelectionPolicy::NeverEmpty);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = StateConfig::from_toml_str("history-depht = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "history-depth = 2").unwrap();
        writeln!(file, "selection-policy = \"never-empty\"").unwrap();
        let config = StateConfig::load(file.path()).unwrap();
        assert_eq!(config.history_depth, 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StateConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
