//! Plugin output validation.
//!
//! A plugin run prints one JSON object. `"status": 0` is the failure
//! sentinel and `"msg"` carries the reason. Output that is not a JSON object
//! is neither a pass nor a fail on its own; `UnparseablePolicy` decides.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value of `status` that marks a failed plugin run.
pub const FAILURE_STATUS: i64 = 0;

/// Outcome of parsing one plugin run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Success,
    Failure { message: Option<String> },
    Unparseable { reason: String },
}

/// How to treat output that is not a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnparseablePolicy {
    #[default]
    Accept,
    Reject,
}

impl UnparseablePolicy {
    pub const VALUES: &[&str] = &["accept", "reject"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Classify raw plugin stdout.
#[must_use]
pub fn parse_plugin_output(stdout: &[u8]) -> ValidationResult {
    let value: Value = match serde_json::from_slice(stdout) {
        Ok(v) => v,
        Err(e) => {
            return ValidationResult::Unparseable {
                reason: e.to_string(),
            };
        }
    };
    let Value::Object(map) = value else {
        return ValidationResult::Unparseable {
            reason: "expected a JSON object".to_string(),
        };
    };

    let failed = match map.get("status") {
        Some(Value::Number(n)) => n.as_i64() == Some(FAILURE_STATUS),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok() == Some(FAILURE_STATUS),
        _ => false,
    };
    if !failed {
        return ValidationResult::Success;
    }

    let message = map.get("msg").map(|m| match m {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    ValidationResult::Failure { message }
}

impl ValidationResult {
    /// Decide whether the pipeline may continue.
    ///
    /// # Errors
    ///
    /// Returns the failure reason for `Failure`, and for `Unparseable` when
    /// the policy is `Reject`.
    pub fn verdict(&self, policy: UnparseablePolicy) -> Result<(), String> {
        match self {
            Self::Success => Ok(()),
            Self::Failure { message } => Err(match message {
                Some(msg) => format!("plugin execution encountered an error: {msg}"),
                None => "plugin execution encountered an error".to_string(),
            }),
            Self::Unparseable { reason } => match policy {
                UnparseablePolicy::Accept => Ok(()),
                UnparseablePolicy::Reject => {
                    Err(format!("plugin output is not a JSON object: {reason}"))
                }
            },
        }
    }
}
