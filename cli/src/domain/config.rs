//! Domain types and validators for plugin-setup configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::layout::{DEFAULT_AGENT_ROOT, DEFAULT_REPOSITORY_URL};
use crate::domain::validation::UnparseablePolicy;

// ── Constants ────────────────────────────────────────────────────────────────

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "PLUGIN_SETUP_CONFIG";

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "agent.root",
    "repository.url",
    "python.pip",
    "python.interpreter",
    "validation.unparseable",
    "timeouts.command_secs",
];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.plugin-setup/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub repository: RepositoryConfig,
    pub python: PythonConfig,
    pub validation: ValidationConfig,
    pub timeouts: TimeoutConfig,
}

/// Agent installation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent root; staging and plugin directories live below it.
    pub root: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_AGENT_ROOT.to_string(),
        }
    }
}

/// Where plugin artifacts are downloaded from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REPOSITORY_URL.to_string(),
        }
    }
}

/// Python tooling used by the dependency install and interpreter pinning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PythonConfig {
    pub pip: String,
    pub interpreter: String,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            pip: "pip3".to_string(),
            interpreter: "/usr/bin/python3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// What to do with plugin output that is not JSON: `accept` or `reject`.
    pub unparseable: UnparseablePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for any single external command.
    pub command_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { command_secs: 120 }
    }
}

impl AppConfig {
    /// Current value of `key` as a display string.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not in the allowed list.
    pub fn get(&self, key: &str) -> Result<String> {
        validate_config_key(key)?;
        Ok(match key {
            "agent.root" => self.agent.root.clone(),
            "repository.url" => self.repository.url.clone(),
            "python.pip" => self.python.pip.clone(),
            "python.interpreter" => self.python.interpreter.clone(),
            "validation.unparseable" => self.validation.unparseable.as_str().to_string(),
            _ => self.timeouts.command_secs.to_string(),
        })
    }

    /// Validate and assign `value` to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid for it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "agent.root" => self.agent.root = value.to_string(),
            "repository.url" => self.repository.url = value.to_string(),
            "python.pip" => self.python.pip = value.to_string(),
            "python.interpreter" => self.python.interpreter = value.to_string(),
            "validation.unparseable" => {
                if let Some(policy) = UnparseablePolicy::parse(value) {
                    self.validation.unparseable = policy;
                }
            }
            _ => {
                if let Ok(secs) = value.parse() {
                    self.timeouts.command_secs = secs;
                }
            }
        }
        Ok(())
    }

    /// Check every key's current value with the same rules `set` applies.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value, in key order.
    pub fn validate(&self) -> Result<()> {
        for key in VALID_CONFIG_KEYS {
            validate_config_value(key, &self.get(key)?)?;
        }
        Ok(())
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |valid: &str| -> anyhow::Error {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            valid: valid.to_string(),
        }
        .into()
    };
    match key {
        "validation.unparseable" if UnparseablePolicy::parse(value).is_none() => {
            Err(invalid(&UnparseablePolicy::VALUES.join(", ")))
        }
        "timeouts.command_secs" if value.parse::<u64>().map_or(true, |s| s == 0) => {
            Err(invalid("a positive number of seconds"))
        }
        "repository.url" if !(value.starts_with("https://") || value.starts_with("http://")) => {
            Err(invalid("an http:// or https:// URL"))
        }
        "agent.root" | "python.interpreter" if !value.starts_with('/') => {
            Err(invalid("an absolute path"))
        }
        _ if value.trim().is_empty() => Err(invalid("a non-empty value")),
        _ => Ok(()),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
