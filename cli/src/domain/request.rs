//! `ProvisioningRequest`: the immutable input of one pipeline run.
//!
//! Built once by the CLI layer, validated on construction, then only
//! borrowed. Pure data: no I/O, no async.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::engine::{Engine, EngineProfile, ExistingUserPolicy};
use crate::domain::error::RequestError;

/// Monitoring user names are spliced into SQL and shell-client scripts as
/// identifiers, so only plain identifiers are accepted.
pub static MONITORING_USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern: cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,62}$").expect("valid regex")
});

/// A username/password pair. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where the database listens and who administers it.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub admin: Credentials,
}

/// Document-store TLS material.
#[derive(Debug, Clone, Default)]
pub struct MongoTls {
    pub certificate_key_file: Option<String>,
    pub certificate_key_file_password: Option<String>,
    pub allow_invalid_certificates: bool,
}

#[derive(Debug, Clone)]
pub struct MongoOptions {
    /// Database the monitoring user is created in.
    pub dbname: String,
    /// Authentication database for the admin login.
    pub authdb: String,
    pub tls: Option<MongoTls>,
}

#[derive(Debug, Clone)]
pub struct OracleOptions {
    /// SID / service name.
    pub sid: String,
    /// Wallet directory; `Some` switches the connection to TCPS.
    pub wallet_location: Option<String>,
    pub oracle_home: String,
}

#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub db: String,
}

/// Engine-specific part of a request. The variant decides the engine.
#[derive(Debug, Clone)]
pub enum EngineOptions {
    MongoDb(MongoOptions),
    Oracle(OracleOptions),
    Postgres(PostgresOptions),
}

impl EngineOptions {
    #[must_use]
    pub fn engine(&self) -> Engine {
        match self {
            Self::MongoDb(_) => Engine::MongoDb,
            Self::Oracle(_) => Engine::Oracle,
            Self::Postgres(_) => Engine::Postgres,
        }
    }
}

/// One `--key=value` argument handed to the plugin, and one `key value`
/// line of its configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginArgument {
    pub key: &'static str,
    pub value: String,
}

impl PluginArgument {
    fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Command-line form: `--key=value`.
    #[must_use]
    pub fn as_flag(&self) -> String {
        format!("--{}={}", self.key, self.value)
    }
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    connection: ConnectionParams,
    monitoring: Credentials,
    options: EngineOptions,
    existing_user_policy: ExistingUserPolicy,
}

impl ProvisioningRequest {
    /// Validate and assemble a request. The existing-user policy starts at
    /// the engine default.
    ///
    /// # Errors
    ///
    /// Returns a `RequestError` if a required field is empty, a field holds
    /// control characters, the monitoring user name is not a plain
    /// identifier, or engine-specific constraints fail.
    pub fn new(
        connection: ConnectionParams,
        monitoring: Credentials,
        options: EngineOptions,
    ) -> Result<Self, RequestError> {
        require("host", &connection.host)?;
        require("admin username", &connection.admin.username)?;
        require("admin password", &connection.admin.password)?;
        require("monitoring user", &monitoring.username)?;
        require("monitoring password", &monitoring.password)?;
        if connection.port == 0 {
            return Err(RequestError::InvalidPort);
        }
        if !MONITORING_USER_RE.is_match(&monitoring.username) {
            return Err(RequestError::InvalidUserName(monitoring.username.clone()));
        }
        validate_options(&options, &connection, &monitoring)?;

        let existing_user_policy = options.engine().profile().existing_user_policy;
        Ok(Self {
            connection,
            monitoring,
            options,
            existing_user_policy,
        })
    }

    /// Override the engine's existing-user policy.
    #[must_use]
    pub fn with_existing_user_policy(mut self, policy: ExistingUserPolicy) -> Self {
        self.existing_user_policy = policy;
        self
    }

    #[must_use]
    pub fn engine(&self) -> Engine {
        self.options.engine()
    }

    #[must_use]
    pub fn profile(&self) -> &'static EngineProfile {
        self.engine().profile()
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionParams {
        &self.connection
    }

    #[must_use]
    pub fn monitoring(&self) -> &Credentials {
        &self.monitoring
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn existing_user_policy(&self) -> ExistingUserPolicy {
        self.existing_user_policy
    }

    /// Arguments the plugin is invoked with, in the order the plugin's own
    /// configuration lists them. Absent optional values are left out.
    #[must_use]
    pub fn plugin_arguments(&self) -> Vec<PluginArgument> {
        let c = &self.connection;
        let m = &self.monitoring;
        match &self.options {
            EngineOptions::MongoDb(o) => {
                let mut args = vec![
                    PluginArgument::new("username", &m.username),
                    PluginArgument::new("password", &m.password),
                    PluginArgument::new("host", &c.host),
                    PluginArgument::new("port", c.port.to_string()),
                    PluginArgument::new("dbname", &o.dbname),
                    PluginArgument::new("authdb", &o.authdb),
                    PluginArgument::new("tls", python_bool(o.tls.is_some())),
                ];
                if let Some(tls) = &o.tls {
                    if let Some(file) = &tls.certificate_key_file {
                        args.push(PluginArgument::new("tlscertificatekeyfile", file));
                    }
                    if let Some(pass) = &tls.certificate_key_file_password {
                        args.push(PluginArgument::new("tlscertificatekeyfilepassword", pass));
                    }
                    args.push(PluginArgument::new(
                        "tlsallowinvalidcertificates",
                        python_bool(tls.allow_invalid_certificates),
                    ));
                }
                args
            }
            EngineOptions::Oracle(o) => {
                let mut args = vec![
                    PluginArgument::new("username", &m.username),
                    PluginArgument::new("password", &m.password),
                    PluginArgument::new("hostname", &c.host),
                    PluginArgument::new("sid", &o.sid),
                    PluginArgument::new("port", c.port.to_string()),
                    PluginArgument::new("tls", python_bool(o.wallet_location.is_some())),
                ];
                if let Some(wallet) = &o.wallet_location {
                    args.push(PluginArgument::new("wallet_location", wallet));
                }
                args.push(PluginArgument::new("oracle_home", &o.oracle_home));
                args
            }
            EngineOptions::Postgres(o) => vec![
                PluginArgument::new("host", &c.host),
                PluginArgument::new("port", c.port.to_string()),
                PluginArgument::new("username", &m.username),
                PluginArgument::new("password", &m.password),
                PluginArgument::new("db", &o.db),
            ],
        }
    }

    /// Environment the plugin and the admin client need.
    #[must_use]
    pub fn client_environment(&self) -> Vec<(&'static str, String)> {
        match &self.options {
            EngineOptions::Oracle(o) => vec![("ORACLE_HOME", o.oracle_home.clone())],
            EngineOptions::MongoDb(_) | EngineOptions::Postgres(_) => Vec::new(),
        }
    }
}

/// The plugins parse their flags with Python truthiness.
fn python_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn require(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::Empty(field));
    }
    reject_control(field, value)
}

fn reject_control(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.chars().any(char::is_control) {
        return Err(RequestError::ControlCharacter(field));
    }
    Ok(())
}

fn validate_options(
    options: &EngineOptions,
    connection: &ConnectionParams,
    monitoring: &Credentials,
) -> Result<(), RequestError> {
    match options {
        EngineOptions::MongoDb(o) => {
            require("dbname", &o.dbname)?;
            require("authdb", &o.authdb)?;
            if let Some(tls) = &o.tls {
                for (field, value) in [
                    ("TLS certificate key file", &tls.certificate_key_file),
                    ("TLS certificate key file password", &tls.certificate_key_file_password),
                ] {
                    if let Some(v) = value {
                        reject_control(field, v)?;
                    }
                }
            }
        }
        EngineOptions::Oracle(o) => {
            require("SID", &o.sid)?;
            require("ORACLE_HOME", &o.oracle_home)?;
            if let Some(wallet) = &o.wallet_location {
                if wallet.trim().is_empty() {
                    return Err(RequestError::MissingWallet);
                }
                reject_control("wallet location", wallet)?;
            }
            if monitoring.password.contains('"') || connection.admin.password.contains('"') {
                return Err(RequestError::QuotedPassword);
            }
        }
        EngineOptions::Postgres(o) => require("database", &o.db)?,
    }
    Ok(())
}
