//! Engine profiles: the per-database constants that shape a pipeline run.
//!
//! Pure data only. Every engine-specific string the pipeline needs (plugin
//! name, driver package, config section, privilege set) lives here so the
//! stage bodies stay engine-agnostic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::stage::Stage;

/// Monitoring user created when the operator does not name one.
pub const DEFAULT_MONITORING_USER: &str = "site24x7_plugin";

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Document store.
    MongoDb,
    /// Relational engine with enterprise tooling.
    Oracle,
    /// Open-source relational engine.
    Postgres,
}

impl Engine {
    /// All engines, in CLI listing order.
    pub const ALL: [Self; 3] = [Self::MongoDb, Self::Oracle, Self::Postgres];

    /// Static profile for this engine.
    #[must_use]
    pub fn profile(self) -> &'static EngineProfile {
        match self {
            Self::MongoDb => &MONGODB,
            Self::Oracle => &ORACLE,
            Self::Postgres => &POSTGRES,
        }
    }

    /// Human-facing product name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MongoDb => "MongoDB",
            Self::Oracle => "Oracle",
            Self::Postgres => "PostgreSQL",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What user provisioning does when the monitoring user already exists.
///
/// The engines disagree here, so the policy travels with the request and can
/// be overridden per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExistingUserPolicy {
    /// An existing user (with the monitoring role) counts as success.
    IdempotentOk,
    /// An existing user aborts the run.
    ExistingIsFailure,
}

impl ExistingUserPolicy {
    /// Accepted spellings, for error messages and help text.
    pub const VALUES: &[&str] = &["idempotent-ok", "existing-is-failure"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdempotentOk => "idempotent-ok",
            Self::ExistingIsFailure => "existing-is-failure",
        }
    }
}

impl fmt::Display for ExistingUserPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExistingUserPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idempotent-ok" => Ok(Self::IdempotentOk),
            "existing-is-failure" => Ok(Self::ExistingIsFailure),
            other => Err(format!(
                "invalid existing-user policy '{other}' (expected one of: {})",
                Self::VALUES.join(", ")
            )),
        }
    }
}

/// Everything that differs between engines.
#[derive(Debug)]
pub struct EngineProfile {
    pub engine: Engine,
    /// Plugin name; also the artifact file stem and the directory name.
    pub plugin_name: &'static str,
    /// Python driver the plugin imports, installed with pip.
    pub driver_package: &'static str,
    /// Path below the repository URL that serves this plugin.
    pub repository_prefix: &'static str,
    /// Section header written into the plugin configuration file.
    pub section_tag: &'static str,
    pub default_port: u16,
    pub existing_user_policy: ExistingUserPolicy,
    /// Stages that need operator confirmation when running interactively.
    pub gated_stages: &'static [Stage],
    /// Rewrite the artifact's interpreter line before making it executable.
    pub pin_interpreter: bool,
    /// Roles/privileges granted to the monitoring user.
    pub privileges: &'static [&'static str],
}

impl EngineProfile {
    #[must_use]
    pub fn is_gated(&self, stage: Stage) -> bool {
        self.gated_stages.contains(&stage)
    }

    /// `<plugin>.py`
    #[must_use]
    pub fn script_file_name(&self) -> String {
        format!("{}.py", self.plugin_name)
    }

    /// `<plugin>.cfg`
    #[must_use]
    pub fn config_file_name(&self) -> String {
        format!("{}.cfg", self.plugin_name)
    }
}

const RELATIONAL_GATES: &[Stage] = &[
    Stage::DependencyInstall,
    Stage::UserProvisioning,
    Stage::ArtifactRetrieval,
];

static MONGODB: EngineProfile = EngineProfile {
    engine: Engine::MongoDb,
    plugin_name: "mongoDB",
    driver_package: "pymongo",
    repository_prefix: "mongoDB",
    section_tag: "mongoDB",
    default_port: 27017,
    existing_user_policy: ExistingUserPolicy::IdempotentOk,
    gated_stages: &[],
    pin_interpreter: false,
    privileges: &["clusterMonitor"],
};

static ORACLE: EngineProfile = EngineProfile {
    engine: Engine::Oracle,
    plugin_name: "oracle",
    driver_package: "oracledb",
    repository_prefix: "oracle",
    section_tag: "ORCL",
    default_port: 1521,
    existing_user_policy: ExistingUserPolicy::ExistingIsFailure,
    gated_stages: RELATIONAL_GATES,
    pin_interpreter: true,
    privileges: &["SELECT_CATALOG_ROLE", "CREATE SESSION"],
};

static POSTGRES: EngineProfile = EngineProfile {
    engine: Engine::Postgres,
    plugin_name: "postgres",
    driver_package: "psycopg2-binary",
    repository_prefix: "postgres",
    section_tag: "postgres",
    default_port: 5432,
    existing_user_policy: ExistingUserPolicy::ExistingIsFailure,
    gated_stages: RELATIONAL_GATES,
    pin_interpreter: true,
    privileges: &["pg_monitor"],
};
