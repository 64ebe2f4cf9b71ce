//! Plugin Setup - provision monitoring agent plugins for database engines

use std::process::ExitCode;

use clap::Parser;
use plugin_setup::cli::Cli;
use plugin_setup::output::json::format_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if json {
                match format_error(&format!("{e:#}"), "command_failed") {
                    Ok(body) => println!("{body}"),
                    Err(_) => eprintln!("Error: {e:#}"),
                }
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
