//! Shared test helpers: output constructors, canned requests and a
//! throwaway agent directory.

#![allow(dead_code)]

use std::path::Path;
use std::process::{ExitStatus, Output};

use plugin_setup::application::services::pipeline::PipelineSettings;
use plugin_setup::domain::{
    AgentLayout, ConnectionParams, Credentials, EngineOptions, MongoOptions, OracleOptions,
    PostgresOptions, ProvisioningRequest, UnparseablePolicy,
};
use tempfile::TempDir;

// ── Cross-platform ExitStatus construction ───────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// On Unix the raw wait-status encodes the exit code in bits 8–15, so we shift.
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

/// What a healthy plugin prints.
pub const METRICS_JSON: &[u8] = br#"{"plugin_version": "1", "heartbeat_required": "true"}"#;

// ── Requests ─────────────────────────────────────────────────────────────────

fn connection(port: u16, admin: &str, admin_password: &str) -> ConnectionParams {
    ConnectionParams {
        host: "localhost".to_string(),
        port,
        admin: Credentials::new(admin, admin_password),
    }
}

pub fn mongo_request() -> ProvisioningRequest {
    ProvisioningRequest::new(
        connection(27017, "admin", "admin-secret"),
        Credentials::new("plugin_user", "plugin@123"),
        EngineOptions::MongoDb(MongoOptions {
            dbname: "admin".to_string(),
            authdb: "admin".to_string(),
            tls: None,
        }),
    )
    .expect("valid mongo request")
}

pub fn oracle_request() -> ProvisioningRequest {
    ProvisioningRequest::new(
        connection(1521, "system", "oracle-secret"),
        Credentials::new("site24x7_plugin", "plugin123"),
        EngineOptions::Oracle(OracleOptions {
            sid: "ORCLCDB".to_string(),
            wallet_location: None,
            oracle_home: "/opt/oracle/product/19c/dbhome_1".to_string(),
        }),
    )
    .expect("valid oracle request")
}

pub fn postgres_request() -> ProvisioningRequest {
    ProvisioningRequest::new(
        connection(5432, "postgres", "pg-secret"),
        Credentials::new("site24x7_plugin", "plugin123"),
        EngineOptions::Postgres(PostgresOptions {
            db: "postgres".to_string(),
        }),
    )
    .expect("valid postgres request")
}

// ── Agent directory ──────────────────────────────────────────────────────────

/// A temporary agent root with `temp/` and `plugins/` already created.
pub struct AgentDir {
    pub dir: TempDir,
}

impl AgentDir {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir(dir.path().join("temp")).expect("temp/");
        std::fs::create_dir(dir.path().join("plugins")).expect("plugins/");
        Self { dir }
    }

    /// Agent root without a `plugins/` directory.
    pub fn without_plugins_dir() -> Self {
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir(dir.path().join("temp")).expect("temp/");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> AgentLayout {
        AgentLayout::new(self.dir.path())
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            layout: self.layout(),
            repository_url: "https://plugins.test/master/".to_string(),
            pip: "pip3".to_string(),
            interpreter: "/usr/bin/python3".to_string(),
            unparseable: UnparseablePolicy::Accept,
        }
    }
}
