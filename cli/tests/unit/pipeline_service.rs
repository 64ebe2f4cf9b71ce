//! Unit tests for the provisioning pipeline.
//!
//! Runs the real stage bodies against a temporary agent directory with
//! `LocalFs`; process, network, database and operator collaborators are
//! mocked.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use plugin_setup::application::ports::UserLookup;
use plugin_setup::application::services::pipeline::{
    PipelinePorts, PipelineSettings, Residue, RunReport, run_pipeline,
};
use plugin_setup::domain::{
    Engine, ExistingUserPolicy, PipelineState, ProvisioningRequest, Stage, UnparseablePolicy,
};
use plugin_setup::infra::fs::LocalFs;

use crate::helpers::{AgentDir, err_output, mongo_request, ok_output, oracle_request, postgres_request};
use crate::mocks::{CollectingReporter, RecordingGate, ScriptedRunner, StubDatabase, StubFetcher};

struct Harness {
    runner: ScriptedRunner,
    fetcher: StubFetcher,
    database: StubDatabase,
    gate: RecordingGate,
    reporter: CollectingReporter,
}

impl Harness {
    fn new() -> Self {
        Self {
            runner: ScriptedRunner::new(),
            fetcher: StubFetcher::new(),
            database: StubDatabase::absent(),
            gate: RecordingGate::approve_all(),
            reporter: CollectingReporter::default(),
        }
    }

    async fn run(&self, request: &ProvisioningRequest, settings: &PipelineSettings) -> RunReport {
        let ports = PipelinePorts {
            runner: &self.runner,
            fetcher: &self.fetcher,
            fs: &LocalFs,
            database: &self.database,
            gate: &self.gate,
            reporter: &self.reporter,
        };
        run_pipeline(request, settings, &ports).await
    }
}

#[cfg(unix)]
fn mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}

// ── Happy paths ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mongo_run_installs_plugin_and_writes_config() {
    let agent = AgentDir::new();
    let h = Harness::new();

    let report = h.run(&mongo_request(), &agent.settings()).await;

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    assert_eq!(report.state, PipelineState::Relocated);
    assert_eq!(report.completed, Stage::ORDERED.to_vec());
    assert!(report.residue.is_empty());

    let installed = agent.root().join("plugins").join("mongoDB");
    assert_eq!(report.installed_path.as_deref(), Some(installed.as_path()));
    assert!(installed.join("mongoDB.py").is_file());
    assert!(!agent.root().join("temp/plugins/mongoDB").exists());

    let cfg = std::fs::read_to_string(installed.join("mongoDB.cfg")).unwrap();
    assert_eq!(
        cfg,
        "[mongoDB]\nusername plugin_user\npassword plugin@123\nhost localhost\nport 27017\n\
         dbname admin\nauthdb admin\ntls False\n"
    );
}

#[tokio::test]
async fn test_mongo_run_touches_collaborators_in_stage_order() {
    let agent = AgentDir::new();
    let h = Harness::new();

    h.run(&mongo_request(), &agent.settings()).await;

    assert_eq!(h.runner.programs(), vec!["pip3", "mongoDB.py"]);
    assert_eq!(h.runner.calls()[0].args, vec!["install", "pymongo"]);
    assert_eq!(
        h.database.events(),
        vec!["open admin", "lookup plugin_user", "create plugin_user", "close"]
    );
    assert_eq!(
        h.fetcher.urls(),
        vec![
            "https://plugins.test/master/mongoDB/mongoDB.py",
            "https://plugins.test/master/mongoDB/mongoDB.cfg",
        ]
    );
    assert!(h.gate.asked().is_empty(), "document store is never gated");
}

#[tokio::test]
async fn test_plugin_is_invoked_with_flags_and_not_via_shell() {
    let agent = AgentDir::new();
    let h = Harness::new();

    h.run(&mongo_request(), &agent.settings()).await;

    let plugin = &h.runner.calls()[1];
    assert!(plugin.program.ends_with("temp/plugins/mongoDB/mongoDB.py"));
    assert!(plugin.args.contains(&"--username=plugin_user".to_string()));
    assert!(plugin.args.contains(&"--password=plugin@123".to_string()));
    assert!(plugin.args.contains(&"--tls=False".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_oracle_run_pins_interpreter_and_exports_oracle_home() {
    let agent = AgentDir::new();
    let h = Harness::new();

    let report = h.run(&oracle_request(), &agent.settings()).await;

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    let installed = agent.root().join("plugins").join("oracle");
    let script = std::fs::read_to_string(installed.join("oracle.py")).unwrap();
    assert!(script.starts_with("#! /usr/bin/python3\nimport json\n"), "got: {script}");
    assert_eq!(mode(&installed.join("oracle.py")), 0o744);

    let cfg = std::fs::read_to_string(installed.join("oracle.cfg")).unwrap();
    assert!(cfg.starts_with("[ORCL]\nusername site24x7_plugin\n"), "got: {cfg}");
    assert!(cfg.ends_with("oracle_home /opt/oracle/product/19c/dbhome_1\n"));

    let plugin = &h.runner.calls()[1];
    assert!(
        plugin
            .env
            .contains(&("ORACLE_HOME".to_string(), "/opt/oracle/product/19c/dbhome_1".to_string()))
    );
}

#[tokio::test]
async fn test_relational_run_asks_gate_for_the_three_gated_stages() {
    let agent = AgentDir::new();
    let h = Harness::new();

    let report = h.run(&postgres_request(), &agent.settings()).await;

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    assert_eq!(
        h.gate.asked(),
        vec![
            (Engine::Postgres, Stage::DependencyInstall),
            (Engine::Postgres, Stage::UserProvisioning),
            (Engine::Postgres, Stage::ArtifactRetrieval),
        ]
    );
}

// ── Halts ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failure_sentinel_halts_before_config_and_relocation() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.runner = ScriptedRunner::new().reply(
        "mongoDB.py",
        ok_output(br#"{"status": 0, "msg": "Authentication failed"}"#),
    );

    let report = h.run(&mongo_request(), &agent.settings()).await;

    assert_eq!(report.state, PipelineState::Failed);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::OutputValidation);
    assert!(failure.message.contains("Authentication failed"), "got: {}", failure.message);

    let staging = agent.root().join("temp/plugins/mongoDB");
    let cfg = std::fs::read_to_string(staging.join("mongoDB.cfg")).unwrap();
    assert!(cfg.starts_with("[template]"), "template must stay untouched: {cfg}");
    assert!(!agent.root().join("plugins/mongoDB").exists());
    assert_eq!(
        report.residue,
        vec![
            Residue::MonitoringUser {
                username: "plugin_user".to_string()
            },
            Residue::StagingDirectory { path: staging },
        ]
    );
}

#[tokio::test]
async fn test_missing_plugins_dir_leaves_configured_staging_in_place() {
    let agent = AgentDir::without_plugins_dir();
    let h = Harness::new();

    let report = h.run(&mongo_request(), &agent.settings()).await;

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::Relocation);
    assert!(failure.message.contains("agent plugins directory not present"));

    let staging = agent.root().join("temp/plugins/mongoDB");
    assert!(staging.join("mongoDB.py").is_file());
    let cfg = std::fs::read_to_string(staging.join("mongoDB.cfg")).unwrap();
    assert!(cfg.starts_with("[mongoDB]\n"));
    assert!(report.residue.contains(&Residue::StagingDirectory { path: staging }));
    assert!(report.installed_path.is_none());
}

#[tokio::test]
async fn test_preexisting_staging_dir_is_not_reported_as_residue() {
    let agent = AgentDir::without_plugins_dir();
    let staging = agent.root().join("temp/plugins/mongoDB");
    std::fs::create_dir_all(&staging).unwrap();
    let h = Harness::new();

    let report = h.run(&mongo_request(), &agent.settings()).await;

    assert_eq!(report.failure.as_ref().unwrap().stage, Stage::Relocation);
    assert!(staging.join("mongoDB.py").is_file());
    assert_eq!(
        report.residue,
        vec![Residue::MonitoringUser {
            username: "plugin_user".to_string()
        }]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_template_not_found_halts_without_chmod_or_rollback() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.fetcher = StubFetcher::new().status("mongoDB.cfg", 404);

    let report = h.run(&mongo_request(), &agent.settings()).await;

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.stage, Stage::ArtifactRetrieval);
    assert!(
        failure.message.contains("mongoDB.cfg download failed with response code 404"),
        "got: {}",
        failure.message
    );
    let script = agent.root().join("temp/plugins/mongoDB/mongoDB.py");
    assert_eq!(mode(&script) & 0o111, 0, "script must not be executable");
    assert_eq!(h.runner.programs(), vec!["pip3"]);
    assert_eq!(
        h.database.events(),
        vec!["open admin", "lookup plugin_user", "create plugin_user", "close"],
        "created user is not dropped"
    );
}

#[tokio::test]
async fn test_script_not_found_skips_template_download() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.fetcher = StubFetcher::new().status("postgres.py", 404);

    let report = h.run(&postgres_request(), &agent.settings()).await;

    assert_eq!(report.failure.unwrap().stage, Stage::ArtifactRetrieval);
    assert_eq!(h.fetcher.urls().len(), 1);
}

#[tokio::test]
async fn test_pip_failure_stops_before_database_is_touched() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.runner = ScriptedRunner::new().reply("pip3", err_output(1, b"No matching distribution"));

    let report = h.run(&mongo_request(), &agent.settings()).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::DependencyInstall);
    assert!(failure.message.contains("No matching distribution"));
    assert!(h.database.events().is_empty());
    assert!(report.completed.is_empty());
    assert!(report.residue.is_empty());
}

#[tokio::test]
async fn test_declined_stage_stops_run_before_it_starts() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.gate = RecordingGate::declining(Stage::UserProvisioning);

    let report = h.run(&postgres_request(), &agent.settings()).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::UserProvisioning);
    assert!(failure.message.contains("declined"));
    assert_eq!(report.completed, vec![Stage::DependencyInstall]);
    assert!(h.database.events().is_empty());
}

#[tokio::test]
async fn test_missing_agent_temp_dir_fails_retrieval() {
    let agent = AgentDir::new();
    std::fs::remove_dir(agent.root().join("temp")).unwrap();
    let h = Harness::new();

    let report = h.run(&mongo_request(), &agent.settings()).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::ArtifactRetrieval);
    assert!(failure.message.contains("does not exist"));
    assert!(h.fetcher.urls().is_empty());
}

#[tokio::test]
async fn test_already_installed_plugin_is_not_overwritten() {
    let agent = AgentDir::new();
    let existing = agent.root().join("plugins/mongoDB");
    std::fs::create_dir(&existing).unwrap();
    std::fs::write(existing.join("mongoDB.cfg"), "[mongoDB]\nhost other\n").unwrap();
    let h = Harness::new();

    let report = h.run(&mongo_request(), &agent.settings()).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::Relocation);
    assert!(failure.message.contains("already exists"));
    assert_eq!(
        std::fs::read_to_string(existing.join("mongoDB.cfg")).unwrap(),
        "[mongoDB]\nhost other\n"
    );
}

// ── Validation policy ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_nonzero_plugin_exit_fails_validation() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.runner = ScriptedRunner::new().reply("postgres.py", err_output(1, b"Traceback"));

    let report = h.run(&postgres_request(), &agent.settings()).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::OutputValidation);
    assert!(failure.message.contains("Traceback"));
}

#[tokio::test]
async fn test_unparseable_output_is_accepted_with_warning_by_default() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.runner = ScriptedRunner::new().reply("mongoDB.py", ok_output(b"not json at all"));

    let report = h.run(&mongo_request(), &agent.settings()).await;

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    assert_eq!(h.reporter.warnings().len(), 1);
}

#[tokio::test]
async fn test_unparseable_output_is_rejected_under_reject_policy() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.runner = ScriptedRunner::new().reply("mongoDB.py", ok_output(b"not json at all"));
    let mut settings = agent.settings();
    settings.unparseable = UnparseablePolicy::Reject;

    let report = h.run(&mongo_request(), &settings).await;

    assert_eq!(report.failure.unwrap().stage, Stage::OutputValidation);
}

// ── Existing users ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_existing_mongo_user_with_role_is_reused() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.database = StubDatabase::with_lookup(UserLookup::Present {
        monitoring_role: true,
    });

    let report = h.run(&mongo_request(), &agent.settings()).await;

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    assert!(!h.database.events().iter().any(|e| e.starts_with("create")));
}

#[tokio::test]
async fn test_existing_postgres_user_fails_before_download() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.database = StubDatabase::with_lookup(UserLookup::Present {
        monitoring_role: true,
    });

    let report = h.run(&postgres_request(), &agent.settings()).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage, Stage::UserProvisioning);
    assert!(failure.message.contains("already exists"));
    assert!(h.fetcher.urls().is_empty());
    assert!(!agent.root().join("temp/plugins").exists());
    assert!(report.residue.is_empty(), "nothing was created");
}

#[tokio::test]
async fn test_existing_user_policy_override_reuses_relational_user() {
    let agent = AgentDir::new();
    let mut h = Harness::new();
    h.database = StubDatabase::with_lookup(UserLookup::Present {
        monitoring_role: true,
    });
    let request = postgres_request().with_existing_user_policy(ExistingUserPolicy::IdempotentOk);

    let report = h.run(&request, &agent.settings()).await;

    assert!(report.succeeded(), "failure: {:?}", report.failure);
}
