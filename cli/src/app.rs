//! Application context: unified state passed to every command handler.
//!
//! Adding a new cross-cutting concern requires only one field change here;
//! command signatures stay the same.

use anyhow::Result;

use crate::application::ports::StageGate;
use crate::domain::{Engine, Stage};
use crate::infra::config::YamlConfigStore;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Environment variable that, when set, disables every prompt.
pub const YES_ENV: &str = "PLUGIN_SETUP_YES";

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `PLUGIN_SETUP_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Tool configuration file.
    pub config_store: YamlConfigStore,
    /// When `true`, never prompt: confirmations take their default and
    /// missing required values are errors.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or
    /// `PLUGIN_SETUP_YES` environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var(YES_ENV).is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            config_store: YamlConfigStore,
            non_interactive,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` returns `default` immediately
    /// without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    /// Resolve a required value: the flag if given, else a prompt.
    ///
    /// `default` is offered at the prompt and used as-is when
    /// non-interactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is missing while non-interactive, or
    /// the terminal prompt fails.
    pub fn require_text(
        &self,
        value: Option<String>,
        flag: &str,
        prompt: &str,
        default: Option<&str>,
    ) -> Result<String> {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            return Ok(v);
        }
        if self.non_interactive {
            return default
                .map(str::to_owned)
                .ok_or_else(|| anyhow::anyhow!("--{flag} is required when prompts are disabled"));
        }
        let mut input = dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .validate_with(|s: &String| -> Result<(), &str> {
                if s.trim().is_empty() {
                    Err("a value is required")
                } else {
                    Ok(())
                }
            });
        if let Some(d) = default {
            input = input.default(d.to_owned());
        }
        Ok(input.interact_text()?)
    }

    /// Resolve a port: the flag if given, else a prompt offering `default`.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer is not a valid port or the prompt fails.
    pub fn require_port(&self, value: Option<u16>, prompt: &str, default: u16) -> Result<u16> {
        if let Some(port) = value {
            return Ok(port);
        }
        let answer = self.require_text(None, "port", prompt, Some(&default.to_string()))?;
        answer
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid port '{answer}': expected 1-65535"))
    }

    /// Resolve a required secret: the flag if given, else a hidden prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is missing while non-interactive, or
    /// the terminal prompt fails.
    pub fn require_secret(&self, value: Option<String>, flag: &str, prompt: &str) -> Result<String> {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            return Ok(v);
        }
        if self.non_interactive {
            anyhow::bail!("--{flag} is required when prompts are disabled");
        }
        let secret = dialoguer::Password::new()
            .with_prompt(prompt)
            .validate_with(|s: &String| -> Result<(), &str> {
                if s.is_empty() {
                    Err("a value is required")
                } else {
                    Ok(())
                }
            })
            .interact()?;
        Ok(secret)
    }
}

impl StageGate for AppContext {
    fn approve(&self, engine: Engine, stage: Stage) -> Result<bool> {
        self.confirm(&format!("{engine}: run {stage}? Do you want to continue"), true)
    }
}
