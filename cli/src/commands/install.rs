//! Shared driver for the per-engine install commands.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::config_service;
use crate::application::services::pipeline::{
    PipelinePorts, PipelineSettings, RunReport, run_pipeline,
};
use crate::domain::{ExistingUserPolicy, ProvisioningRequest};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::database::ClientAdmin;
use crate::infra::fetcher::UreqFetcher;
use crate::infra::fs::LocalFs;
use crate::output::TerminalReporter;
use crate::output::reporter::SilentReporter;

/// `--existing-user` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExistingUserArg {
    /// An existing user holding the monitoring role is accepted
    IdempotentOk,
    /// An existing user stops the run
    ExistingIsFailure,
}

impl From<ExistingUserArg> for ExistingUserPolicy {
    fn from(arg: ExistingUserArg) -> Self {
        match arg {
            ExistingUserArg::IdempotentOk => Self::IdempotentOk,
            ExistingUserArg::ExistingIsFailure => Self::ExistingIsFailure,
        }
    }
}

/// Apply per-run overrides, run the pipeline and render the outcome.
///
/// Exit code `1` when any stage failed.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, an override is
/// invalid, or the report cannot be rendered. Stage failures are not errors.
pub async fn execute(
    app: &AppContext,
    request: ProvisioningRequest,
    existing_user: Option<ExistingUserArg>,
    agent_root: Option<String>,
) -> Result<ExitCode> {
    let mut config = config_service::load_config(&app.config_store)?;
    if let Some(root) = agent_root {
        config.set("agent.root", &root)?;
    }
    let request = match existing_user {
        Some(policy) => request.with_existing_user_policy(policy.into()),
        None => request,
    };
    let settings = PipelineSettings::from_config(&config);
    let timeout = Duration::from_secs(config.timeouts.command_secs);

    tracing::debug!(
        engine = %request.engine(),
        agent_root = %settings.layout.root().display(),
        policy = %request.existing_user_policy(),
        "install requested"
    );

    let report = if app.is_json() {
        run_with(app, &request, &settings, timeout, &SilentReporter).await
    } else {
        app.output.banner("Starting Plugin Automation");
        run_with(
            app,
            &request,
            &settings,
            timeout,
            &TerminalReporter::new(&app.output),
        )
        .await
    };

    app.renderer().render_report(&report)?;
    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn run_with(
    app: &AppContext,
    request: &ProvisioningRequest,
    settings: &PipelineSettings,
    timeout: Duration,
    reporter: &impl ProgressReporter,
) -> RunReport {
    let runner = TokioCommandRunner::new(timeout);
    let fetcher = UreqFetcher::new(timeout, app.output.show_progress() && !app.is_json());
    let database = ClientAdmin::new(&runner, timeout);
    let ports = PipelinePorts {
        runner: &runner,
        fetcher: &fetcher,
        fs: &LocalFs,
        database: &database,
        gate: app,
        reporter,
    };
    run_pipeline(request, settings, &ports).await
}
