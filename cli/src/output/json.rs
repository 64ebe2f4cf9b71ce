//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed object on
//! stdout. Failures use the error object from [`format_error`].

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::services::pipeline::RunReport;
use crate::domain::AppConfig;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Renders domain types as JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_report(&self, report: &RunReport) -> Result<()> {
        println!("{}", report_json(report)?);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &AppConfig, path: &Path) -> Result<()> {
        let obj = serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&obj).context("JSON serialization failed")?
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        let obj = serde_json::json!({ "version": version });
        println!(
            "{}",
            serde_json::to_string_pretty(&obj).context("JSON serialization failed")?
        );
        Ok(())
    }
}

/// Pretty JSON for a run report, with a top-level `success` flag.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn report_json(report: &RunReport) -> Result<String> {
    let mut value = serde_json::to_value(report).context("JSON serialization failed")?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("success".into(), serde_json::Value::Bool(report.succeeded()));
    }
    serde_json::to_string_pretty(&value).context("JSON serialization failed")
}
