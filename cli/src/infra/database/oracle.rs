//! Enterprise RDBMS administration via SQL*Plus.
//!
//! The script, including the `CONNECT` line with the administrator
//! password, is written to `sqlplus` on stdin.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::application::ports::{CommandRunner, UserLookup};
use crate::domain::{ConnectionParams, Credentials, Engine, OracleOptions};

use super::sql_literal;

const ALTER_SESSION: &str = r#"ALTER SESSION SET "_ORACLE_SCRIPT"=true;"#;

pub struct OracleTarget {
    program: PathBuf,
    oracle_home: String,
    identifier: String,
    admin: Credentials,
}

impl OracleTarget {
    #[must_use]
    pub fn new(connection: &ConnectionParams, options: &OracleOptions) -> Self {
        Self {
            program: sqlplus_path(&options.oracle_home),
            oracle_home: options.oracle_home.clone(),
            identifier: connect_identifier(
                &connection.host,
                connection.port,
                &options.sid,
                options.wallet_location.as_deref(),
            ),
            admin: connection.admin.clone(),
        }
    }

    pub async fn ping(&self, runner: &impl CommandRunner) -> Result<()> {
        self.execute(runner, "SELECT 'ok' FROM dual;").await.map(drop)
    }

    pub async fn lookup_user(&self, runner: &impl CommandRunner, username: &str) -> Result<UserLookup> {
        let stdout = self.execute(runner, &lookup_sql(username)).await?;
        parse_lookup(&stdout)
    }

    pub async fn create_user(&self, runner: &impl CommandRunner, credentials: &Credentials) -> Result<()> {
        self.execute(runner, &create_sql(credentials)).await.map(drop)
    }

    async fn execute(&self, runner: &impl CommandRunner, body: &str) -> Result<String> {
        let program = self.program.to_string_lossy();
        let script = session_script(&self.admin, &self.identifier, body);
        let output = runner
            .run_with_stdin(
                &program,
                &["-S", "-L", "/nolog"],
                &[("ORACLE_HOME", self.oracle_home.as_str())],
                script.as_bytes(),
            )
            .await?;
        check_exit(&output)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if let Some(line) = stdout
            .lines()
            .find(|l| l.trim_start().starts_with("ORA-") || l.trim_start().starts_with("SP2-"))
        {
            anyhow::bail!("sqlplus failed: {}", line.trim());
        }
        Ok(stdout)
    }
}

/// Fail with sqlplus's stderr (or stdout when stderr is empty) if it exited
/// non-zero.
fn check_exit(output: &std::process::Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    anyhow::bail!("sqlplus failed: {detail}")
}

fn sqlplus_path(oracle_home: &str) -> PathBuf {
    Path::new(oracle_home).join("bin").join("sqlplus")
}

/// `host:port/sid`, or a TCPS descriptor when a wallet is configured.
#[must_use]
pub fn connect_identifier(host: &str, port: u16, sid: &str, wallet: Option<&str>) -> String {
    match wallet {
        None => format!("{host}:{port}/{sid}"),
        Some(wallet) => format!(
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=tcps)(HOST={host})(PORT={port}))\
             (CONNECT_DATA=(SERVICE_NAME={sid}))\
             (SECURITY=(MY_WALLET_DIRECTORY={wallet})))"
        ),
    }
}

/// Full SQL*Plus script: settings, `CONNECT`, `body`, `EXIT`.
#[must_use]
pub fn session_script(admin: &Credentials, identifier: &str, body: &str) -> String {
    format!(
        "WHENEVER SQLERROR EXIT SQL.SQLCODE\n\
         WHENEVER OSERROR EXIT FAILURE\n\
         SET HEADING OFF FEEDBACK OFF PAGESIZE 0 VERIFY OFF ECHO OFF\n\
         CONNECT {}/\"{}\"@{identifier}\n\
         {body}\n\
         EXIT\n",
        admin.username, admin.password,
    )
}

/// Prints `<users>,<grants>`: how many `dba_users` rows match and how many
/// monitoring role grants the user holds.
#[must_use]
pub fn lookup_sql(username: &str) -> String {
    let name = sql_literal(&username.to_uppercase());
    let role = sql_literal(Engine::Oracle.profile().privileges[0]);
    format!(
        "{ALTER_SESSION}\n\
         SELECT (SELECT COUNT(*) FROM dba_users WHERE username = {name}) || ',' || \
         (SELECT COUNT(*) FROM dba_role_privs WHERE grantee = {name} AND granted_role = {role}) \
         FROM dual;"
    )
}

/// `CREATE USER` plus one `GRANT` per monitoring privilege.
#[must_use]
pub fn create_sql(credentials: &Credentials) -> String {
    let user = &credentials.username;
    let mut sql = format!(
        "{ALTER_SESSION}\nCREATE USER {user} IDENTIFIED BY \"{}\";\n",
        credentials.password
    );
    for privilege in Engine::Oracle.profile().privileges {
        sql.push_str(&format!("GRANT {privilege} TO {user};\n"));
    }
    sql
}

/// Decode the `<users>,<grants>` line printed by [`lookup_sql`].
///
/// # Errors
///
/// Returns an error if no such line is present.
pub fn parse_lookup(stdout: &str) -> Result<UserLookup> {
    let counts = stdout.lines().find_map(|line| {
        let (users, grants) = line.trim().split_once(',')?;
        Some((users.parse::<u32>().ok()?, grants.parse::<u32>().ok()?))
    });
    match counts {
        Some((0, _)) => Ok(UserLookup::Absent),
        Some((_, grants)) => Ok(UserLookup::Present {
            monitoring_role: grants > 0,
        }),
        None => anyhow::bail!("unexpected sqlplus output: {}", stdout.trim()),
    }
}
