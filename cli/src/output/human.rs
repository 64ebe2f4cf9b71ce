//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::application::services::pipeline::RunReport;
use crate::domain::config::{AppConfig, CONFIG_ENV, VALID_CONFIG_KEYS};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        println!("plugin-setup {version}");
    }

    /// Render the closing banner and, on failure, what was left behind.
    ///
    /// The failure line goes to stderr and is never suppressed.
    pub fn render_report(&self, report: &RunReport) {
        if let Some(failure) = &report.failure {
            println!();
            self.ctx.error(&failure.to_string());
            if !report.residue.is_empty() && !self.ctx.quiet {
                println!();
                println!("  {}", "Left in place:".style(self.ctx.styles.bold));
                for item in &report.residue {
                    println!("    - {item}");
                }
            }
            self.ctx.banner("Plugin Automation Failed");
            return;
        }

        if let Some(path) = &report.installed_path {
            println!();
            self.ctx.kv("Installed:", &path.display().to_string());
        }
        self.ctx.banner(&format!(
            "{} plugin installed successfully",
            report.engine
        ));
    }

    /// Render the configuration file contents.
    pub fn render_config(&self, config: &AppConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for key in VALID_CONFIG_KEYS {
            let value = config.get(key).unwrap_or_default();
            println!("  {:<26} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in [CONFIG_ENV, "NO_COLOR", "RUST_LOG"] {
            println!(
                "    {:<22} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!();
    }
}
