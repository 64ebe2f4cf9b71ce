//! YAML-file `ConfigStore`.
//!
//! `load` only parses; value checks live in `AppConfig::validate` so that
//! `config set` can still repair a file holding a bad value. `save` writes a
//! sibling temp file with owner-only permissions and renames it over the
//! target.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, CONFIG_ENV};

const CONFIG_DIR: &str = ".plugin-setup";
const CONFIG_FILE: &str = "config.yaml";

pub struct YamlConfigStore;

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<AppConfig> {
        let path = self.path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => parse(&path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    fn save(&self, config: &AppConfig) -> Result<()> {
        let path = self.path()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        let staged = path.with_extension("yaml.tmp");
        std::fs::write(&staged, content)
            .with_context(|| format!("cannot write {}", staged.display()))?;
        restrict_to_owner(&staged)?;
        std::fs::rename(&staged, &path)
            .with_context(|| format!("cannot replace {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(val) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(val));
        }
        let home = dirs::home_dir().context("cannot determine home directory")?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}

/// An empty file means defaults, like a missing one.
fn parse(path: &Path, content: &str) -> Result<AppConfig> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(content).with_context(|| format!("cannot parse {}", path.display()))
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("cannot set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}
