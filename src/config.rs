//! Broker configuration.
//!
//! Loaded from YAML, falling back to defaults for missing keys, then
//! optionally overridden from the environment:
//!
//! ```yaml
//! pictures_dir: /data/user/0/com.example.game/files/Pictures
//! provider_authority: com.example.game.fileprovider
//! mime_filter: "image/*"
//! grant_policy: resume
//! history_capacity: 32
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `BROKER_PICTURES_DIR` | `pictures_dir` |
//! | `BROKER_PROVIDER_AUTHORITY` | `provider_authority` |
//! | `BROKER_GRANT_POLICY` | `grant_policy` (`resume` / `await_caller`) |

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dispatch::IMAGE_MIME_FILTER;

/// What happens after the user grants a prompted permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPolicy {
    /// Dispatch the gated action under the same correlation.
    #[default]
    Resume,
    /// Drop the request without an event; the caller re-initiates it.
    AwaitCaller,
}

impl FromStr for GrantPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resume" => Ok(GrantPolicy::Resume),
            "await_caller" | "await-caller" => Ok(GrantPolicy::AwaitCaller),
            other => Err(ConfigError::InvalidValue {
                key: "grant_policy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Directory capture files are allocated in.
    pub pictures_dir: PathBuf,
    /// File-provider authority used to build sharable capture handles.
    pub provider_authority: String,
    /// MIME filter handed to the picker.
    pub mime_filter: String,
    pub grant_policy: GrantPolicy,
    /// Emission records kept for inspection. `0` disables the history.
    pub history_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            pictures_dir: std::env::temp_dir().join("Pictures"),
            provider_authority: "com.example.app.fileprovider".to_string(),
            mime_filter: IMAGE_MIME_FILTER.to_string(),
            grant_policy: GrantPolicy::default(),
            history_capacity: 32,
        }
    }
}

impl BrokerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `BROKER_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(std::env::vars())
    }

    /// Apply `BROKER_*` overrides from `vars`; unrelated keys are ignored.
    pub fn apply_vars<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            if !key.starts_with("BROKER_") {
                continue;
            }
            let value: String = value.into();
            match key {
                "BROKER_PICTURES_DIR" => self.pictures_dir = PathBuf::from(value),
                "BROKER_PROVIDER_AUTHORITY" => self.provider_authority = value,
                "BROKER_GRANT_POLICY" => self.grant_policy = value.parse()?,
                _ => {}
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.mime_filter, "image/*");
        assert_eq!(config.grant_policy, GrantPolicy::Resume);
        assert_eq!(config.history_capacity, 32);
        assert_eq!(BrokerConfig::from_yaml_str("").unwrap(), config);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = BrokerConfig::from_yaml_str(
            "provider_authority: com.example.game.fileprovider\ngrant_policy: await_caller\n",
        )
        .unwrap();
        assert_eq!(config.provider_authority, "com.example.game.fileprovider");
        assert_eq!(config.grant_policy, GrantPolicy::AwaitCaller);
        assert_eq!(config.mime_filter, "image/*");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            BrokerConfig::from_yaml_str("grant_policy: sometimes"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.yaml");
        fs::write(&path, "history_capacity: 4\n").unwrap();
        assert_eq!(BrokerConfig::from_file(&path).unwrap().history_capacity, 4);

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            BrokerConfig::from_file(&missing),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = BrokerConfig::default()
            .apply_vars([
                ("BROKER_PICTURES_DIR", "/tmp/shots"),
                ("BROKER_GRANT_POLICY", "await-caller"),
                ("HOME", "/root"),
            ])
            .unwrap();
        assert_eq!(config.pictures_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.grant_policy, GrantPolicy::AwaitCaller);

        let err = BrokerConfig::default()
            .apply_vars([("BROKER_GRANT_POLICY", "never")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
