//! Pipeline stages, the run state machine and the stage failure type.
//!
//! The stage order is fixed: user provisioning must precede output
//! validation because validation runs the plugin with the monitoring
//! credentials. `StateMachine` refuses any transition that skips or repeats
//! a stage, and `Failed` is terminal.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// One unit of pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DependencyInstall,
    UserProvisioning,
    ArtifactRetrieval,
    ExecutableSetup,
    OutputValidation,
    ConfigPersistence,
    Relocation,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ORDERED: [Self; 7] = [
        Self::DependencyInstall,
        Self::UserProvisioning,
        Self::ArtifactRetrieval,
        Self::ExecutableSetup,
        Self::OutputValidation,
        Self::ConfigPersistence,
        Self::Relocation,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DependencyInstall => "dependency install",
            Self::UserProvisioning => "user provisioning",
            Self::ArtifactRetrieval => "artifact retrieval",
            Self::ExecutableSetup => "executable setup",
            Self::OutputValidation => "output validation",
            Self::ConfigPersistence => "configuration persistence",
            Self::Relocation => "relocation",
        }
    }

    /// State reached once this stage succeeds.
    #[must_use]
    pub fn completed_state(self) -> PipelineState {
        match self {
            Self::DependencyInstall => PipelineState::DependencyInstalled,
            Self::UserProvisioning => PipelineState::UserProvisioned,
            Self::ArtifactRetrieval => PipelineState::ArtifactRetrieved,
            Self::ExecutableSetup => PipelineState::Executable,
            Self::OutputValidation => PipelineState::Validated,
            Self::ConfigPersistence => PipelineState::Configured,
            Self::Relocation => PipelineState::Relocated,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a pipeline run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    NotStarted,
    DependencyInstalled,
    UserProvisioned,
    ArtifactRetrieved,
    Executable,
    Validated,
    Configured,
    Relocated,
    Failed,
}

impl PipelineState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Relocated | Self::Failed)
    }

    /// The only stage allowed to run from this state.
    #[must_use]
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            Self::NotStarted => Some(Stage::DependencyInstall),
            Self::DependencyInstalled => Some(Stage::UserProvisioning),
            Self::UserProvisioned => Some(Stage::ArtifactRetrieval),
            Self::ArtifactRetrieved => Some(Stage::ExecutableSetup),
            Self::Executable => Some(Stage::OutputValidation),
            Self::Validated => Some(Stage::ConfigPersistence),
            Self::Configured => Some(Stage::Relocation),
            Self::Relocated | Self::Failed => None,
        }
    }
}

/// A stage aborted the run. The only error the pipeline surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{stage} failed: {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

impl StageFailure {
    #[must_use]
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    /// Wrap any collaborator error, keeping its full context chain.
    #[must_use]
    pub fn from_error(stage: Stage, err: &anyhow::Error) -> Self {
        Self::new(stage, format!("{err:#}"))
    }
}

/// Illegal state machine move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot run {attempted} from state {from:?}")]
pub struct TransitionError {
    pub from: PipelineState,
    pub attempted: Stage,
}

/// Forward-only run state.
#[derive(Debug)]
pub struct StateMachine {
    state: PipelineState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PipelineState::NotStarted,
        }
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Check that `stage` is the next one to run without moving.
    ///
    /// # Errors
    ///
    /// Returns a `TransitionError` if `stage` is not next in order.
    pub fn expect_next(&self, stage: Stage) -> Result<(), TransitionError> {
        if self.state.next_stage() == Some(stage) {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.state,
                attempted: stage,
            })
        }
    }

    /// Record that `stage` succeeded.
    ///
    /// # Errors
    ///
    /// Returns a `TransitionError` if `stage` is not next in order.
    pub fn complete(&mut self, stage: Stage) -> Result<PipelineState, TransitionError> {
        self.expect_next(stage)?;
        self.state = stage.completed_state();
        Ok(self.state)
    }

    /// Move to `Failed`. No-op once terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = PipelineState::Failed;
        }
    }
}
