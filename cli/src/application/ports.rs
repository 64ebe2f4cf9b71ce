//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Result;

use crate::domain::{AppConfig, Credentials, Engine, ProvisioningRequest, Stage};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
///
/// Implementations enforce their own timeout and kill the child when it
/// fires.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with extra environment variables.
    async fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<Output>;
    /// Run a program with extra environment variables and stdin piped from `stdin`.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        stdin: &[u8],
    ) -> Result<Output>;
}

// ── Artifact Fetch Port ───────────────────────────────────────────────────────

/// Result of one HTTP transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    /// HTTP status code returned by the server.
    pub status: u16,
    /// Bytes written to the destination (0 when the status was not a success).
    pub bytes: u64,
}

impl FetchOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Downloads a single file.
#[allow(async_fn_in_trait)]
pub trait ArtifactFetcher {
    /// Fetch `url` into `dest`.
    ///
    /// A non-success HTTP status is reported through `FetchOutcome::status`
    /// and leaves `dest` untouched; `Err` is reserved for transport and I/O
    /// failures.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchOutcome>;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Abstracts the filesystem operations the pipeline performs.
pub trait PluginFs {
    fn is_dir(&self, path: &Path) -> bool;
    fn exists(&self, path: &Path) -> bool;
    /// Create a single directory (the parent must exist).
    fn create_dir(&self, path: &Path) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    fn set_mode(&self, path: &Path, mode: u32) -> Result<()>;
    /// Move `from` to `to` without copying.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

// ── Database Ports ────────────────────────────────────────────────────────────

/// What the engine's user catalog says about the monitoring user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup {
    Absent,
    Present {
        /// Whether the user already holds the engine's monitoring role.
        monitoring_role: bool,
    },
}

/// An open administrative connection.
#[allow(async_fn_in_trait)]
pub trait AdminSession {
    /// Look the user up in the engine's user catalog.
    async fn lookup_user(&self, username: &str) -> Result<UserLookup>;
    /// Create the user and grant the engine's monitoring privileges.
    async fn create_monitoring_user(&mut self, credentials: &Credentials) -> Result<()>;
    /// Release the connection.
    async fn close(self) -> Result<()>;
}

/// Opens administrative sessions against the target database.
#[allow(async_fn_in_trait)]
pub trait DatabaseAdmin {
    type Session: AdminSession;

    /// Connect with the request's administrator credentials.
    async fn open(&self, request: &ProvisioningRequest) -> Result<Self::Session>;
}

// ── Operator Confirmation Port ────────────────────────────────────────────────

/// Lets the operator refuse a stage before it runs. The pipeline never
/// prompts by itself.
pub trait StageGate {
    /// Return `Ok(false)` to stop the run before `stage`.
    fn approve(&self, engine: Engine, stage: Stage) -> Result<bool>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts loading and saving the tool configuration.
pub trait ConfigStore {
    /// Load the configuration, returning defaults if no file exists.
    fn load(&self) -> Result<AppConfig>;
    /// Persist the configuration.
    fn save(&self, config: &AppConfig) -> Result<()>;
    /// Location of the configuration file.
    fn path(&self) -> Result<PathBuf>;
}
