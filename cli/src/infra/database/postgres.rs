//! Open-source RDBMS administration through `tokio-postgres`.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls};

use crate::application::ports::UserLookup;
use crate::domain::{ConnectionParams, Credentials, Engine, PostgresOptions};

use super::sql_literal;

/// One row when the role exists: whether it is a member of the monitoring role.
pub const LOOKUP_SQL: &str =
    "SELECT pg_has_role(rolname, $2, 'MEMBER') FROM pg_roles WHERE rolname = $1";

/// A superuser connection to the target database.
pub struct PostgresSession {
    client: Client,
    connection: JoinHandle<()>,
}

impl PostgresSession {
    /// Connect as the superuser. The connection task runs on the tokio
    /// runtime until [`PostgresSession::close`].
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable within `timeout` or
    /// rejects the credentials.
    pub async fn connect(
        connection: &ConnectionParams,
        options: &PostgresOptions,
        timeout: Duration,
    ) -> Result<Self> {
        let (client, driver) = client_config(connection, options, timeout)
            .connect(NoTls)
            .await
            .with_context(|| {
                format!(
                    "connect to {}:{}/{}",
                    connection.host, connection.port, options.db
                )
            })?;
        let connection = tokio::spawn(async move {
            if let Err(e) = driver.await {
                tracing::warn!(error = %e, "postgres connection ended with an error");
            }
        });
        Ok(Self { client, connection })
    }

    pub async fn lookup_user(&self, username: &str) -> Result<UserLookup> {
        let role = Engine::Postgres.profile().privileges[0];
        let row = self.client.query_opt(LOOKUP_SQL, &[&username, &role]).await?;
        Ok(match row {
            None => UserLookup::Absent,
            Some(row) => UserLookup::Present {
                monitoring_role: row.try_get(0)?,
            },
        })
    }

    /// `CREATE ROLE` and the grants commit together or not at all.
    pub async fn create_user(&mut self, credentials: &Credentials) -> Result<()> {
        let transaction = self.client.transaction().await?;
        for statement in create_statements(credentials) {
            transaction.batch_execute(&statement).await?;
        }
        transaction.commit().await?;
        Ok(())
    }

    /// Drop the client and wait for the connection task to finish.
    pub async fn close(self) -> Result<()> {
        drop(self.client);
        self.connection
            .await
            .context("postgres connection task failed")
    }
}

/// Connection settings for the superuser session.
#[must_use]
pub fn client_config(
    connection: &ConnectionParams,
    options: &PostgresOptions,
    timeout: Duration,
) -> Config {
    let mut config = Config::new();
    config
        .host(&connection.host)
        .port(connection.port)
        .user(&connection.admin.username)
        .password(&connection.admin.password)
        .dbname(&options.db)
        .application_name("plugin-setup")
        .connect_timeout(timeout);
    config
}

/// Quote `name` as an SQL identifier.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Role DDL takes no bind parameters, so the password is sent as a quoted
/// literal.
#[must_use]
pub fn create_statements(credentials: &Credentials) -> Vec<String> {
    let user = quote_ident(&credentials.username);
    let mut statements = vec![format!(
        "CREATE ROLE {user} WITH LOGIN PASSWORD {}",
        sql_literal(&credentials.password)
    )];
    statements.extend(
        Engine::Postgres
            .profile()
            .privileges
            .iter()
            .map(|role| format!("GRANT {role} TO {user}")),
    );
    statements
}
