//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Provision monitoring agent plugins for database engines
#[derive(Parser)]
#[command(
    name = "plugin-setup",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Emit debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Never prompt; take defaults and fail on missing values
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install the MongoDB plugin
    #[command(name = "mongodb")]
    MongoDb(commands::mongodb::MongoArgs),

    /// Install the Oracle plugin
    Oracle(commands::oracle::OracleArgs),

    /// Install the PostgreSQL plugin
    Postgres(commands::postgres::PostgresArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails before a run report exists.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
            ..
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        });

        match command {
            Command::MongoDb(args) => commands::mongodb::run(&app, args).await,
            Command::Oracle(args) => commands::oracle::run(&app, args).await,
            Command::Postgres(args) => commands::postgres::run(&app, args).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
