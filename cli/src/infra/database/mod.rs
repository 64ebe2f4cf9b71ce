//! Database administration for the supported engines.
//!
//! MongoDB and PostgreSQL are reached through their native async drivers.
//! Oracle is driven through `sqlplus` from the configured `ORACLE_HOME` via
//! the `CommandRunner` port, with the script (and its passwords) on stdin.

pub mod mongo;
pub mod oracle;
pub mod postgres;

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{AdminSession, CommandRunner, DatabaseAdmin, UserLookup};
use crate::domain::{Credentials, EngineOptions, ProvisioningRequest};

use self::mongo::MongoSession;
use self::oracle::OracleTarget;
use self::postgres::PostgresSession;

/// Production `DatabaseAdmin`.
pub struct ClientAdmin<'a, R> {
    runner: &'a R,
    timeout: Duration,
}

impl<'a, R: CommandRunner> ClientAdmin<'a, R> {
    /// `timeout` bounds connection setup and server selection for the
    /// native drivers; `runner` enforces its own for `sqlplus`.
    #[must_use]
    pub fn new(runner: &'a R, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

/// One open admin connection.
pub enum ClientSession<'a, R> {
    Mongo(MongoSession),
    Oracle { runner: &'a R, target: OracleTarget },
    Postgres(PostgresSession),
}

impl<'a, R: CommandRunner> DatabaseAdmin for ClientAdmin<'a, R> {
    type Session = ClientSession<'a, R>;

    async fn open(&self, request: &ProvisioningRequest) -> Result<Self::Session> {
        let connection = request.connection();
        let session = match request.options() {
            EngineOptions::MongoDb(o) => {
                ClientSession::Mongo(MongoSession::connect(connection, o, self.timeout).await?)
            }
            EngineOptions::Oracle(o) => {
                let target = OracleTarget::new(connection, o);
                target.ping(self.runner).await?;
                ClientSession::Oracle {
                    runner: self.runner,
                    target,
                }
            }
            EngineOptions::Postgres(o) => ClientSession::Postgres(
                PostgresSession::connect(connection, o, self.timeout).await?,
            ),
        };
        tracing::debug!(engine = %request.engine(), host = %connection.host, "admin session opened");
        Ok(session)
    }
}

impl<R: CommandRunner> AdminSession for ClientSession<'_, R> {
    async fn lookup_user(&self, username: &str) -> Result<UserLookup> {
        match self {
            Self::Mongo(s) => s.lookup_user(username).await,
            Self::Oracle { runner, target } => target.lookup_user(*runner, username).await,
            Self::Postgres(s) => s.lookup_user(username).await,
        }
    }

    async fn create_monitoring_user(&mut self, credentials: &Credentials) -> Result<()> {
        match self {
            Self::Mongo(s) => s.create_user(credentials).await,
            Self::Oracle { runner, target } => target.create_user(*runner, credentials).await,
            Self::Postgres(s) => s.create_user(credentials).await,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            Self::Mongo(s) => s.close().await,
            // sqlplus exits after every script
            Self::Oracle { .. } => {}
            Self::Postgres(s) => s.close().await?,
        }
        tracing::debug!("admin session closed");
        Ok(())
    }
}

/// Quote `value` as an SQL string literal.
#[must_use]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
