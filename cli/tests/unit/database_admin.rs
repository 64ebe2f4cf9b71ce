//! Unit tests for the production `DatabaseAdmin`.
//!
//! MongoDB and PostgreSQL go through their drivers and never spawn a client
//! program; Oracle goes through `sqlplus` under `ORACLE_HOME`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use plugin_setup::application::ports::{AdminSession, DatabaseAdmin};
use plugin_setup::domain::{
    ConnectionParams, Credentials, EngineOptions, MongoOptions, PostgresOptions,
    ProvisioningRequest,
};
use plugin_setup::infra::database::ClientAdmin;

use crate::helpers::{err_output, oracle_request};
use crate::mocks::ScriptedRunner;

/// Nothing listens on port 1.
fn unreachable(options: EngineOptions) -> ProvisioningRequest {
    ProvisioningRequest::new(
        ConnectionParams {
            host: "127.0.0.1".to_string(),
            port: 1,
            admin: Credentials::new("admin", "admin-secret"),
        },
        Credentials::new("site24x7_plugin", "plugin123"),
        options,
    )
    .expect("valid request")
}

#[tokio::test]
async fn test_postgres_connects_through_driver_without_client_program() {
    let runner = ScriptedRunner::new();
    let admin = ClientAdmin::new(&runner, Duration::from_secs(2));
    let request = unreachable(EngineOptions::Postgres(PostgresOptions {
        db: "postgres".to_string(),
    }));

    let Err(err) = admin.open(&request).await else {
        panic!("nothing listens on port 1");
    };

    assert!(format!("{err:#}").contains("connect to 127.0.0.1:1/postgres"), "got: {err:#}");
    assert!(runner.programs().is_empty(), "spawned {:?}", runner.programs());
}

#[tokio::test]
async fn test_mongo_connects_through_driver_without_client_program() {
    let runner = ScriptedRunner::new();
    let admin = ClientAdmin::new(&runner, Duration::from_secs(2));
    let request = unreachable(EngineOptions::MongoDb(MongoOptions {
        dbname: "admin".to_string(),
        authdb: "admin".to_string(),
        tls: None,
    }));

    let Err(err) = admin.open(&request).await else {
        panic!("nothing listens on port 1");
    };

    assert!(format!("{err:#}").contains("ping 127.0.0.1:1"), "got: {err:#}");
    assert!(runner.programs().is_empty(), "spawned {:?}", runner.programs());
}

#[tokio::test]
async fn test_oracle_runs_sqlplus_from_oracle_home() {
    let runner = ScriptedRunner::new();
    let admin = ClientAdmin::new(&runner, Duration::from_secs(2));

    let Ok(session) = admin.open(&oracle_request()).await else {
        panic!("scripted sqlplus succeeds");
    };
    session.close().await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "/opt/oracle/product/19c/dbhome_1/bin/sqlplus");
    assert!(
        calls[0]
            .env
            .contains(&("ORACLE_HOME".to_string(), "/opt/oracle/product/19c/dbhome_1".to_string()))
    );
    assert!(
        !calls[0].args.iter().any(|a| a.contains("oracle-secret")),
        "admin password on argv: {:?}",
        calls[0].args
    );
}

#[tokio::test]
async fn test_oracle_open_fails_when_sqlplus_fails() {
    let runner = ScriptedRunner::new().reply("sqlplus", err_output(1, b"ORA-01017: invalid username/password"));
    let admin = ClientAdmin::new(&runner, Duration::from_secs(2));

    let Err(err) = admin.open(&oracle_request()).await else {
        panic!("sqlplus exited 1");
    };

    assert!(format!("{err:#}").contains("ORA-01017"), "got: {err:#}");
}
