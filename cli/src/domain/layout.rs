//! Agent directory layout, artifact locations and the plugin config format.

use std::path::{Path, PathBuf};

use crate::domain::engine::EngineProfile;
use crate::domain::request::PluginArgument;

/// Default agent installation root.
pub const DEFAULT_AGENT_ROOT: &str = "/opt/site24x7/monagent";

/// Default artifact repository.
pub const DEFAULT_REPOSITORY_URL: &str = "https://raw.githubusercontent.com/site24x7/plugins/master/";

/// Fixed paths under the agent root.
///
/// ```text
/// <root>/temp/                     agent temp dir (must exist)
/// <root>/temp/plugins/<plugin>/    staging
/// <root>/plugins/                  agent plugin dir (must exist)
/// <root>/plugins/<plugin>/         final location
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLayout {
    root: PathBuf,
}

impl Default for AgentLayout {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_ROOT)
    }
}

impl AgentLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    #[must_use]
    pub fn staging_root(&self) -> PathBuf {
        self.temp_dir().join("plugins")
    }

    #[must_use]
    pub fn staging_dir(&self, plugin: &str) -> PathBuf {
        self.staging_root().join(plugin)
    }

    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    #[must_use]
    pub fn installed_dir(&self, plugin: &str) -> PathBuf {
        self.plugins_dir().join(plugin)
    }
}

/// The two files fetched for a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginArtifact {
    pub plugin_name: &'static str,
    pub script_file: String,
    pub template_file: String,
    pub script_url: String,
    pub template_url: String,
}

impl PluginArtifact {
    /// Locate the artifact under `repository_url/<prefix>/`.
    #[must_use]
    pub fn locate(profile: &EngineProfile, repository_url: &str) -> Self {
        let base = format!(
            "{}/{}",
            repository_url.trim_end_matches('/'),
            profile.repository_prefix.trim_matches('/')
        );
        let script_file = profile.script_file_name();
        let template_file = profile.config_file_name();
        Self {
            plugin_name: profile.plugin_name,
            script_url: format!("{base}/{script_file}"),
            template_url: format!("{base}/{template_file}"),
            script_file,
            template_file,
        }
    }
}

/// Render the plugin configuration: a `[section]` header, then one
/// `key value` line per argument in argument order.
#[must_use]
pub fn render_plugin_config(section: &str, arguments: &[PluginArgument]) -> String {
    let mut out = format!("[{section}]\n");
    for arg in arguments {
        out.push_str(arg.key);
        out.push(' ');
        out.push_str(&arg.value);
        out.push('\n');
    }
    out
}
