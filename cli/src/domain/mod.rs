//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod request;
pub mod stage;
pub mod validation;

pub use config::{AppConfig, validate_config_key, validate_config_value};
pub use engine::{DEFAULT_MONITORING_USER, Engine, EngineProfile, ExistingUserPolicy};
pub use error::{ConfigError, RequestError};
pub use layout::{AgentLayout, PluginArtifact, render_plugin_config};
pub use request::{
    ConnectionParams, Credentials, EngineOptions, MongoOptions, MongoTls, OracleOptions,
    PluginArgument, PostgresOptions, ProvisioningRequest,
};
pub use stage::{PipelineState, Stage, StageFailure, StateMachine};
pub use validation::{UnparseablePolicy, ValidationResult, parse_plugin_output};
