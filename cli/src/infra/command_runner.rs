//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with guaranteed timeout and kill on all platforms.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::application::ports::CommandRunner;

/// Default timeout for pip, database clients and plugin runs.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(120);

/// Production `CommandRunner`: uses tokio for async process execution
/// with guaranteed timeout and kill on all platforms.
///
/// `tokio::time::timeout` around `.output().await` drops the future but does
/// not terminate the child on every platform, so the timeout branch kills
/// the child explicitly inside `tokio::select!`.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Arguments are never logged: they may carry passwords.
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        input: Option<&[u8]>,
    ) -> Result<Output> {
        tracing::debug!(program, argc = args.len(), stdin = input.is_some(), "spawning");
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .envs(env.iter().copied())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdin_task = match (child.stdin.take(), input) {
            (Some(mut stdin), Some(bytes)) => {
                let owned = bytes.to_vec();
                Some(tokio::spawn(async move {
                    let _ = stdin.write_all(&owned).await;
                }))
            }
            _ => None,
        };

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                if let Some(task) = stdin_task {
                    let _ = task.await;
                }
                let status = status.with_context(|| format!("waiting for {program}"))?;
                tracing::debug!(program, code = ?status.code(), "exited");
                Ok(Output { status, stdout, stderr })
            } => result,
            () = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", self.timeout.as_secs())
            }
        }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.execute(program, args, &[], None).await
    }

    async fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<Output> {
        self.execute(program, args, env, None).await
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        stdin: &[u8],
    ) -> Result<Output> {
        self.execute(program, args, env, Some(stdin)).await
    }
}
