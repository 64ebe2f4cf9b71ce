//! Application service: configuration use-cases.

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use anyhow::{Context, Result};

/// Load configuration and reject values `config set` would refuse.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or holds an
/// invalid value.
pub fn load_config(store: &impl ConfigStore) -> Result<AppConfig> {
    let config = store.load()?;
    config.validate().with_context(|| match store.path() {
        Ok(path) => format!(
            "invalid configuration in {} (fix it with `plugin-setup config set`)",
            path.display()
        ),
        Err(_) => "invalid configuration".to_string(),
    })?;
    Ok(config)
}

/// Validate and persist a single `key = value` change.
///
/// Nothing is written when the key or value is rejected. Other keys are not
/// re-checked, so a bad value elsewhere in the file can be repaired one key
/// at a time.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<AppConfig> {
    let mut config = store.load()?;
    config.set(key, value)?;
    store.save(&config)?;
    Ok(config)
}
