//! Application service: the provisioning pipeline.
//!
//! Imports only from `crate::domain` and `crate::application`.
//! Stages run strictly in `Stage::ORDERED` order; the first failure stops
//! the run and nothing already done is undone.

use std::path::PathBuf;

use serde::Serialize;

use crate::application::ports::{
    ArtifactFetcher, CommandRunner, DatabaseAdmin, PluginFs, ProgressReporter, StageGate,
};
use crate::application::services::stages;
use crate::application::services::user_provisioning::{
    UserProvisioning, provision_monitoring_user,
};
use crate::domain::{
    AgentLayout, AppConfig, Engine, EngineProfile, PipelineState, PluginArtifact,
    ProvisioningRequest, Stage, StageFailure, StateMachine, UnparseablePolicy,
};

/// Settings read from configuration, fixed for one run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub layout: AgentLayout,
    pub repository_url: String,
    pub pip: String,
    pub interpreter: String,
    pub unparseable: UnparseablePolicy,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            layout: AgentLayout::new(&config.agent.root),
            repository_url: config.repository.url.clone(),
            pip: config.python.pip.clone(),
            interpreter: config.python.interpreter.clone(),
            unparseable: config.validation.unparseable,
        }
    }
}

/// Collaborators a run talks to.
pub struct PipelinePorts<'a, C, F, S, D, G, R> {
    pub runner: &'a C,
    pub fetcher: &'a F,
    pub fs: &'a S,
    pub database: &'a D,
    pub gate: &'a G,
    pub reporter: &'a R,
}

/// Something a failed run leaves behind for the operator to clean up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Residue {
    StagingDirectory { path: PathBuf },
    MonitoringUser { username: String },
}

impl std::fmt::Display for Residue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StagingDirectory { path } => {
                write!(f, "staging directory {}", path.display())
            }
            Self::MonitoringUser { username } => write!(f, "database user \"{username}\""),
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub engine: Engine,
    pub plugin: &'static str,
    pub state: PipelineState,
    pub completed: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
    /// Empty unless the run failed.
    pub residue: Vec<Residue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_path: Option<PathBuf>,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Relocated
    }
}

/// Run every stage for `request`.
///
/// Never returns an error: a failing stage is recorded in
/// `RunReport::failure` and the state ends as `Failed`.
pub async fn run_pipeline<C, F, S, D, G, R>(
    request: &ProvisioningRequest,
    settings: &PipelineSettings,
    ports: &PipelinePorts<'_, C, F, S, D, G, R>,
) -> RunReport
where
    C: CommandRunner,
    F: ArtifactFetcher,
    S: PluginFs,
    D: DatabaseAdmin,
    G: StageGate,
    R: ProgressReporter,
{
    let profile = request.profile();
    let mut run = Run::new(profile);
    tracing::info!(engine = %profile.engine, plugin = profile.plugin_name, "pipeline started");

    let failure = drive(request, settings, ports, &mut run).await.err();
    match &failure {
        Some(f) => {
            run.machine.fail();
            tracing::warn!(stage = %f.stage, error = %f.message, "pipeline aborted");
        }
        None => {
            run.residue.clear();
            tracing::info!(plugin = profile.plugin_name, "pipeline finished");
        }
    }

    RunReport {
        engine: profile.engine,
        plugin: profile.plugin_name,
        state: run.machine.state(),
        completed: run.completed,
        failure,
        residue: run.residue,
        installed_path: run.installed,
    }
}

async fn drive<C, F, S, D, G, R>(
    request: &ProvisioningRequest,
    settings: &PipelineSettings,
    ports: &PipelinePorts<'_, C, F, S, D, G, R>,
    run: &mut Run,
) -> Result<(), StageFailure>
where
    C: CommandRunner,
    F: ArtifactFetcher,
    S: PluginFs,
    D: DatabaseAdmin,
    G: StageGate,
    R: ProgressReporter,
{
    let profile = request.profile();
    let layout = &settings.layout;
    let reporter = ports.reporter;

    let stage = run.begin(Stage::DependencyInstall, ports.gate)?;
    stages::install_dependency(ports.runner, reporter, &settings.pip, profile)
        .await
        .at(stage)?;
    run.finish(stage)?;

    let stage = run.begin(Stage::UserProvisioning, ports.gate)?;
    let provisioned = provision_monitoring_user(ports.database, request, reporter)
        .await
        .at(stage)?;
    if provisioned == UserProvisioning::Created {
        run.residue.push(Residue::MonitoringUser {
            username: request.monitoring().username.clone(),
        });
    }
    run.finish(stage)?;

    let stage = run.begin(Stage::ArtifactRetrieval, ports.gate)?;
    let stages::Staging {
        path: staging,
        created,
    } = stages::ensure_staging(ports.fs, layout, profile.plugin_name).at(stage)?;
    if created {
        run.residue.push(Residue::StagingDirectory {
            path: staging.clone(),
        });
    }
    let artifact = PluginArtifact::locate(profile, &settings.repository_url);
    stages::fetch_artifacts(ports.fetcher, reporter, &artifact, &staging)
        .await
        .at(stage)?;
    run.finish(stage)?;

    let script = staging.join(&artifact.script_file);

    let stage = run.begin(Stage::ExecutableSetup, ports.gate)?;
    stages::prepare_executable(ports.fs, reporter, profile, &settings.interpreter, &script)
        .at(stage)?;
    run.finish(stage)?;

    let stage = run.begin(Stage::OutputValidation, ports.gate)?;
    stages::validate_output(ports.runner, reporter, request, &script, settings.unparseable)
        .await
        .at(stage)?;
    run.finish(stage)?;

    let stage = run.begin(Stage::ConfigPersistence, ports.gate)?;
    stages::persist_config(ports.fs, reporter, profile, request, &staging).at(stage)?;
    run.finish(stage)?;

    let stage = run.begin(Stage::Relocation, ports.gate)?;
    let installed = stages::relocate(ports.fs, reporter, layout, profile.plugin_name).at(stage)?;
    run.installed = Some(installed);
    run.finish(stage)?;

    Ok(())
}

/// Mutable bookkeeping for one run.
struct Run {
    profile: &'static EngineProfile,
    machine: StateMachine,
    completed: Vec<Stage>,
    residue: Vec<Residue>,
    installed: Option<PathBuf>,
}

impl Run {
    fn new(profile: &'static EngineProfile) -> Self {
        Self {
            profile,
            machine: StateMachine::new(),
            completed: Vec::new(),
            residue: Vec::new(),
            installed: None,
        }
    }

    /// Check ordering and ask the gate before `stage` runs.
    fn begin(&self, stage: Stage, gate: &impl StageGate) -> Result<Stage, StageFailure> {
        self.machine
            .expect_next(stage)
            .map_err(|e| StageFailure::new(stage, e.to_string()))?;
        if self.profile.is_gated(stage) {
            let approved = gate.approve(self.profile.engine, stage).at(stage)?;
            if !approved {
                return Err(StageFailure::new(stage, "declined by operator"));
            }
        }
        tracing::info!(stage = %stage, "stage started");
        Ok(stage)
    }

    fn finish(&mut self, stage: Stage) -> Result<(), StageFailure> {
        let state = self
            .machine
            .complete(stage)
            .map_err(|e| StageFailure::new(stage, e.to_string()))?;
        self.completed.push(stage);
        tracing::debug!(stage = %stage, ?state, "stage completed");
        Ok(())
    }
}

/// Attach the failing stage to a collaborator error.
trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure>;
}

impl<T> AtStage<T> for anyhow::Result<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure::from_error(stage, &e))
    }
}
