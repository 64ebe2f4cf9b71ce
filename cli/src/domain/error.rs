//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Request errors ────────────────────────────────────────────────────────────

/// Errors raised while building a `ProvisioningRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must not contain line breaks or control characters")]
    ControlCharacter(&'static str),

    #[error(
        "Invalid monitoring user name '{0}': must match ^[A-Za-z_][A-Za-z0-9_$]{{0,62}}$"
    )]
    InvalidUserName(String),

    #[error("Oracle passwords must not contain double quotes")]
    QuotedPassword,

    #[error("A wallet location is required when TLS is enabled")]
    MissingWallet,

    #[error("Port must be between 1 and 65535")]
    InvalidPort,
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
