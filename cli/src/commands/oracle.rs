//! `plugin-setup oracle`: install the Oracle plugin.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::install::{self, ExistingUserArg};
use crate::domain::{
    ConnectionParams, Credentials, DEFAULT_MONITORING_USER, Engine, EngineOptions, OracleOptions,
    ProvisioningRequest,
};

/// Arguments for the oracle command.
#[derive(Args, Debug, Default)]
pub struct OracleArgs {
    /// Administrator user
    #[arg(long)]
    pub sys_username: Option<String>,

    /// Administrator password
    #[arg(long)]
    pub sys_password: Option<String>,

    /// Monitoring user to create [default: site24x7_plugin]
    #[arg(long)]
    pub user: Option<String>,

    /// Password for the monitoring user
    #[arg(long)]
    pub password: Option<String>,

    /// SID or service name
    #[arg(long)]
    pub sid: Option<String>,

    /// Host the Oracle instance runs on
    #[arg(long)]
    pub host: Option<String>,

    /// Listener port
    #[arg(long)]
    pub port: Option<u16>,

    /// Connect over TCPS using a wallet
    #[arg(long)]
    pub tls: bool,

    /// Wallet directory (required with --tls)
    #[arg(long)]
    pub wallet_location: Option<String>,

    /// Oracle installation directory
    #[arg(long, env = "ORACLE_HOME")]
    pub oracle_home: Option<String>,

    /// What to do when the monitoring user already exists
    #[arg(long, value_enum)]
    pub existing_user: Option<ExistingUserArg>,

    /// Agent installation root (overrides agent.root)
    #[arg(long)]
    pub agent_root: Option<String>,
}

/// Run the oracle command.
///
/// # Errors
///
/// Returns an error if a required value is missing or invalid.
pub async fn run(app: &AppContext, args: OracleArgs) -> Result<ExitCode> {
    let existing_user = args.existing_user;
    let agent_root = args.agent_root.clone();
    let request = build_request(app, args)?;
    install::execute(app, request, existing_user, agent_root).await
}

fn build_request(app: &AppContext, args: OracleArgs) -> Result<ProvisioningRequest> {
    let sys_username = app.require_text(
        args.sys_username,
        "sys-username",
        "Admin user of the Oracle instance",
        None,
    )?;
    let sys_password = app.require_secret(
        args.sys_password,
        "sys-password",
        "Password of the Oracle admin user",
    )?;
    let user = app.require_text(
        args.user,
        "user",
        "User to create in the Oracle instance",
        Some(DEFAULT_MONITORING_USER),
    )?;
    let password = app.require_secret(
        args.password,
        "password",
        &format!("Password for the user '{user}'"),
    )?;
    let sid = app.require_text(args.sid, "sid", "SID of the Oracle instance", None)?;
    let host = app.require_text(
        args.host,
        "host",
        "Host where the Oracle instance is running",
        Some("localhost"),
    )?;
    let port = app.require_port(
        args.port,
        "Port of the Oracle instance",
        Engine::Oracle.profile().default_port,
    )?;
    let wallet_location = if args.tls {
        Some(app.require_text(args.wallet_location, "wallet-location", "Wallet location", None)?)
    } else {
        None
    };
    let oracle_home = app.require_text(args.oracle_home, "oracle-home", "ORACLE_HOME location", None)?;

    let request = ProvisioningRequest::new(
        ConnectionParams {
            host,
            port,
            admin: Credentials::new(sys_username, sys_password),
        },
        Credentials::new(user, password),
        EngineOptions::Oracle(OracleOptions {
            sid,
            wallet_location,
            oracle_home,
        }),
    )?;
    Ok(request)
}
