//! `plugin-setup mongodb`: install the MongoDB plugin.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::install::{self, ExistingUserArg};
use crate::domain::{
    ConnectionParams, Credentials, DEFAULT_MONITORING_USER, Engine, EngineOptions, MongoOptions, MongoTls,
    ProvisioningRequest,
};

/// Arguments for the mongodb command.
#[derive(Args, Debug, Default)]
pub struct MongoArgs {
    /// Host the MongoDB instance runs on
    #[arg(long)]
    pub host: Option<String>,

    /// Port the MongoDB instance listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Administrator user
    #[arg(long)]
    pub admin_username: Option<String>,

    /// Administrator password
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Monitoring user to create [default: site24x7_plugin]
    #[arg(long)]
    pub user: Option<String>,

    /// Password for the monitoring user
    #[arg(long)]
    pub password: Option<String>,

    /// Database the monitoring user is created in
    #[arg(long)]
    pub dbname: Option<String>,

    /// Authentication database
    #[arg(long)]
    pub authdb: Option<String>,

    /// Connect with TLS
    #[arg(long)]
    pub tls: bool,

    /// Client certificate and key file (PEM)
    #[arg(long, requires = "tls")]
    pub tls_cert_key_file: Option<String>,

    /// Password for the client certificate key
    #[arg(long, requires = "tls")]
    pub tls_cert_key_file_password: Option<String>,

    /// Skip server certificate validation
    #[arg(long, requires = "tls")]
    pub tls_allow_invalid_certificates: bool,

    /// What to do when the monitoring user already exists
    #[arg(long, value_enum)]
    pub existing_user: Option<ExistingUserArg>,

    /// Agent installation root (overrides agent.root)
    #[arg(long)]
    pub agent_root: Option<String>,
}

/// Run the mongodb command.
///
/// # Errors
///
/// Returns an error if a required value is missing or invalid.
pub async fn run(app: &AppContext, args: MongoArgs) -> Result<ExitCode> {
    let existing_user = args.existing_user;
    let agent_root = args.agent_root.clone();
    let request = build_request(app, args)?;
    install::execute(app, request, existing_user, agent_root).await
}

fn build_request(app: &AppContext, args: MongoArgs) -> Result<ProvisioningRequest> {
    let admin_username = app.require_text(
        args.admin_username,
        "admin-username",
        "Admin user of the MongoDB instance",
        None,
    )?;
    let admin_password = app.require_secret(
        args.admin_password,
        "admin-password",
        "Password of the MongoDB admin user",
    )?;
    let user = app.require_text(
        args.user,
        "user",
        "User to create in the MongoDB instance",
        Some(DEFAULT_MONITORING_USER),
    )?;
    let password = app.require_secret(
        args.password,
        "password",
        &format!("Password for the user '{user}'"),
    )?;
    let host = app.require_text(
        args.host,
        "host",
        "Host where the MongoDB instance is running",
        Some("localhost"),
    )?;
    let port = app.require_port(
        args.port,
        "Port of the MongoDB instance",
        Engine::MongoDb.profile().default_port,
    )?;
    let dbname = app.require_text(args.dbname, "dbname", "Database to connect to", Some("admin"))?;
    let authdb = app.require_text(
        args.authdb,
        "authdb",
        "Authentication database",
        Some("admin"),
    )?;

    let tls = args.tls.then(|| MongoTls {
        certificate_key_file: args.tls_cert_key_file,
        certificate_key_file_password: args.tls_cert_key_file_password,
        allow_invalid_certificates: args.tls_allow_invalid_certificates,
    });

    let request = ProvisioningRequest::new(
        ConnectionParams {
            host,
            port,
            admin: Credentials::new(admin_username, admin_password),
        },
        Credentials::new(user, password),
        EngineOptions::MongoDb(MongoOptions {
            dbname,
            authdb,
            tls,
        }),
    )?;
    Ok(request)
}
