//! `plugin-setup postgres`: install the PostgreSQL plugin.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::install::{self, ExistingUserArg};
use crate::domain::{
    ConnectionParams, Credentials, DEFAULT_MONITORING_USER, Engine, EngineOptions,
    PostgresOptions, ProvisioningRequest,
};

/// Arguments for the postgres command.
#[derive(Args, Debug, Default)]
pub struct PostgresArgs {
    /// Superuser to connect as
    #[arg(long)]
    pub superuser: Option<String>,

    /// Superuser password
    #[arg(long)]
    pub superpass: Option<String>,

    /// Monitoring user to create [default: site24x7_plugin]
    #[arg(long)]
    pub user: Option<String>,

    /// Password for the monitoring user
    #[arg(long)]
    pub password: Option<String>,

    /// Host the PostgreSQL instance runs on
    #[arg(long)]
    pub host: Option<String>,

    /// Port the PostgreSQL instance listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Database the plugin connects to
    #[arg(long)]
    pub db: Option<String>,

    /// What to do when the monitoring user already exists
    #[arg(long, value_enum)]
    pub existing_user: Option<ExistingUserArg>,

    /// Agent installation root (overrides agent.root)
    #[arg(long)]
    pub agent_root: Option<String>,
}

/// Run the postgres command.
///
/// # Errors
///
/// Returns an error if a required value is missing or invalid.
pub async fn run(app: &AppContext, args: PostgresArgs) -> Result<ExitCode> {
    let existing_user = args.existing_user;
    let agent_root = args.agent_root.clone();
    let request = build_request(app, args)?;
    install::execute(app, request, existing_user, agent_root).await
}

fn build_request(app: &AppContext, args: PostgresArgs) -> Result<ProvisioningRequest> {
    let superuser = app.require_text(
        args.superuser,
        "superuser",
        "Super user of the PostgreSQL instance",
        None,
    )?;
    let superpass = app.require_secret(
        args.superpass,
        "superpass",
        "Password of the PostgreSQL super user",
    )?;
    let user = app.require_text(
        args.user,
        "user",
        "User to create in the PostgreSQL instance",
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
        "Host where the PostgreSQL instance is running",
        Some("localhost"),
    )?;
    let port = app.require_port(
        args.port,
        "Port of the PostgreSQL instance",
        Engine::Postgres.profile().default_port,
    )?;
    let db = app.require_text(
        args.db,
        "db",
        "Database the plugin connects to",
        Some("postgres"),
    )?;

    let request = ProvisioningRequest::new(
        ConnectionParams {
            host,
            port,
            admin: Credentials::new(superuser, superpass),
        },
        Credentials::new(user, password),
        EngineOptions::Postgres(PostgresOptions { db }),
    )?;
    Ok(request)
}
