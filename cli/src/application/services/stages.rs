//! Stage bodies for the provisioning pipeline.
//!
//! Each function does one stage's work and returns `anyhow::Result`; the
//! pipeline converts errors into `StageFailure` at the stage boundary.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::{Context, Result};

use crate::application::ports::{ArtifactFetcher, CommandRunner, PluginFs, ProgressReporter};
use crate::domain::{
    AgentLayout, EngineProfile, PluginArgument, PluginArtifact, ProvisioningRequest,
    UnparseablePolicy, ValidationResult, parse_plugin_output, render_plugin_config,
};

/// Mode applied to the plugin script: owner rwx, group/other read.
pub const EXECUTABLE_MODE: u32 = 0o744;

// ── Dependency install ────────────────────────────────────────────────────────

/// Install the engine's Python driver with pip.
///
/// # Errors
///
/// Returns an error if pip cannot be spawned or exits non-zero.
pub async fn install_dependency(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    pip: &str,
    profile: &EngineProfile,
) -> Result<()> {
    let package = profile.driver_package;
    reporter.step(&format!("installing {package} python module..."));
    let output = runner
        .run(pip, &["install", package])
        .await
        .with_context(|| format!("running {pip} install {package}"))?;
    ensure_success(&output, &format!("{pip} install {package}"))?;
    reporter.success(&format!("installed {package} python module"));
    Ok(())
}

// ── Artifact retrieval ────────────────────────────────────────────────────────

/// The plugin's staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staging {
    pub path: PathBuf,
    /// `false` when the directory was already there before this run.
    pub created: bool,
}

/// Make sure `<root>/temp/plugins/<plugin>/` exists.
///
/// The agent temp directory itself must already be there; only the two
/// levels below it are created.
///
/// # Errors
///
/// Returns an error if the agent temp directory is missing or a directory
/// cannot be created.
pub fn ensure_staging(fs: &impl PluginFs, layout: &AgentLayout, plugin: &str) -> Result<Staging> {
    let temp = layout.temp_dir();
    if !fs.is_dir(&temp) {
        anyhow::bail!("agent directory {} does not exist", temp.display());
    }
    let path = layout.staging_dir(plugin);
    let mut created = false;
    for dir in [layout.staging_root(), path.clone()] {
        if !fs.is_dir(&dir) {
            fs.create_dir(&dir)?;
            tracing::debug!(path = %dir.display(), "created directory");
            created = dir == path;
        }
    }
    Ok(Staging { path, created })
}

/// Download the script, then the template, into `staging`.
///
/// # Errors
///
/// Returns an error on transport failure or when either transfer does not
/// report HTTP 200; the template is not requested if the script fails.
pub async fn fetch_artifacts(
    fetcher: &impl ArtifactFetcher,
    reporter: &impl ProgressReporter,
    artifact: &PluginArtifact,
    staging: &Path,
) -> Result<()> {
    reporter.step("downloading plugin files...");
    for (url, file) in [
        (&artifact.script_url, &artifact.script_file),
        (&artifact.template_url, &artifact.template_file),
    ] {
        let outcome = fetcher
            .fetch(url, &staging.join(file))
            .await
            .with_context(|| format!("downloading {url}"))?;
        if !outcome.is_ok() {
            anyhow::bail!(
                "{file} download failed with response code {}",
                outcome.status
            );
        }
        reporter.success(&format!("{file} downloaded"));
    }
    Ok(())
}

// ── Executable setup ──────────────────────────────────────────────────────────

/// Pin the interpreter line if the engine asks for it, then mark the script
/// executable.
///
/// # Errors
///
/// Returns an error if the script cannot be read, rewritten, or chmodded.
pub fn prepare_executable(
    fs: &impl PluginFs,
    reporter: &impl ProgressReporter,
    profile: &EngineProfile,
    interpreter: &str,
    script: &Path,
) -> Result<()> {
    if profile.pin_interpreter {
        reporter.step(&format!(
            "setting the python3 path in {}",
            profile.script_file_name()
        ));
        let source = fs.read_to_string(script)?;
        fs.write(script, &pin_interpreter(&source, interpreter))?;
    }
    fs.set_mode(script, EXECUTABLE_MODE)?;
    reporter.success("created executable plugin file");
    Ok(())
}

/// Replace the first line with `#! <interpreter>` if it is a shebang,
/// otherwise insert one.
#[must_use]
pub fn pin_interpreter(source: &str, interpreter: &str) -> String {
    let shebang = format!("#! {interpreter}");
    let body = if source.starts_with("#!") {
        source.split_once('\n').map_or("", |(_, rest)| rest)
    } else {
        source
    };
    format!("{shebang}\n{body}")
}

// ── Output validation ─────────────────────────────────────────────────────────

/// Run the staged plugin once with the request's arguments and classify
/// the output.
///
/// # Errors
///
/// Returns an error if the plugin cannot be run, exits non-zero, reports
/// the failure sentinel, or prints unparseable output under a `Reject`
/// policy.
pub async fn validate_output(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    request: &ProvisioningRequest,
    script: &Path,
    policy: UnparseablePolicy,
) -> Result<ValidationResult> {
    reporter.step("validating the python plugin output...");
    let flags: Vec<String> = request
        .plugin_arguments()
        .iter()
        .map(PluginArgument::as_flag)
        .collect();
    let args: Vec<&str> = flags.iter().map(String::as_str).collect();
    let env = request.client_environment();
    let env: Vec<(&str, &str)> = env.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let program = script.to_string_lossy();
    let output = runner
        .run_with_env(&program, &args, &env)
        .await
        .with_context(|| format!("running {}", script.display()))?;
    ensure_success(&output, &program)?;

    let result = parse_plugin_output(&output.stdout);
    if let Err(reason) = result.verdict(policy) {
        anyhow::bail!(reason);
    }
    if let ValidationResult::Unparseable { reason } = &result {
        reporter.warn(&format!("plugin output is not JSON ({reason}); accepted"));
    }
    reporter.success("plugin output validated successfully");
    Ok(result)
}

// ── Configuration persistence ─────────────────────────────────────────────────

/// Write `<plugin>.cfg` beside the staged script, replacing the template.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn persist_config(
    fs: &impl PluginFs,
    reporter: &impl ProgressReporter,
    profile: &EngineProfile,
    request: &ProvisioningRequest,
    staging: &Path,
) -> Result<PathBuf> {
    let path = staging.join(profile.config_file_name());
    let content = render_plugin_config(profile.section_tag, &request.plugin_arguments());
    fs.write(&path, &content)?;
    reporter.success("plugin configuration set successfully");
    Ok(path)
}

// ── Relocation ────────────────────────────────────────────────────────────────

/// Move the staged plugin directory into the agent plugin directory.
///
/// # Errors
///
/// Returns an error if the agent plugin directory is missing, the plugin is
/// already installed there, or the move fails. The staged directory is left
/// in place on every error.
pub fn relocate(
    fs: &impl PluginFs,
    reporter: &impl ProgressReporter,
    layout: &AgentLayout,
    plugin: &str,
) -> Result<PathBuf> {
    let plugins = layout.plugins_dir();
    if !fs.is_dir(&plugins) {
        anyhow::bail!("{} agent plugins directory not present", plugins.display());
    }
    let dest = layout.installed_dir(plugin);
    if fs.exists(&dest) {
        anyhow::bail!("{} already exists", dest.display());
    }
    fs.rename(&layout.staging_dir(plugin), &dest)?;
    reporter.success("moved the plugin into the agent directory");
    Ok(dest)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn ensure_success(output: &Output, what: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let code = output
        .status
        .code()
        .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        anyhow::bail!("{what} exited with {code}");
    }
    anyhow::bail!("{what} exited with {code}: {stderr}")
}
