//! HTTP artifact download: implements `ArtifactFetcher` with `ureq`.
//!
//! Transfers are blocking and run on `spawn_blocking`. The body is streamed
//! into `<dest>.partial` and renamed into place once complete, so a failed
//! transfer never leaves a truncated artifact at `dest`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{ArtifactFetcher, FetchOutcome};

const USER_AGENT: &str = concat!("plugin-setup/", env!("CARGO_PKG_VERSION"));

/// Production `ArtifactFetcher`.
pub struct UreqFetcher {
    agent: ureq::Agent,
    show_progress: bool,
}

impl UreqFetcher {
    #[must_use]
    pub fn new(timeout: Duration, show_progress: bool) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            show_progress,
        }
    }
}

impl ArtifactFetcher for UreqFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchOutcome> {
        let agent = self.agent.clone();
        let url = url.to_owned();
        let dest = dest.to_path_buf();
        let show_progress = self.show_progress;
        tokio::task::spawn_blocking(move || download(&agent, &url, &dest, show_progress))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking panicked: {e}"))?
    }
}

fn download(agent: &ureq::Agent, url: &str, dest: &Path, show_progress: bool) -> Result<FetchOutcome> {
    tracing::debug!(url, dest = %dest.display(), "downloading");
    let response = match agent.get(url).call() {
        Ok(r) => r,
        Err(ureq::Error::Status(status, _)) => {
            tracing::debug!(url, status, "download refused");
            return Ok(FetchOutcome { status, bytes: 0 });
        }
        Err(e) => return Err(anyhow::Error::new(e).context("download interrupted")),
    };
    let status = response.status();
    if status != 200 {
        return Ok(FetchOutcome { status, bytes: 0 });
    }

    let name = dest
        .file_name()
        .map_or_else(|| url.to_string(), |n| n.to_string_lossy().into_owned());
    let pb = if show_progress {
        spinner(&format!("downloading {name}..."))
    } else {
        indicatif::ProgressBar::hidden()
    };

    let partial = partial_path(dest);
    let mut file =
        File::create(&partial).with_context(|| format!("creating {}", partial.display()))?;
    let mut reader = response.into_reader();
    let mut buf = vec![0u8; 64 * 1024];
    let mut bytes = 0u64;
    loop {
        let n = reader.read(&mut buf).context("download interrupted")?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .with_context(|| format!("writing {}", partial.display()))?;
        bytes += n as u64;
        pb.inc(n as u64);
    }
    pb.finish_and_clear();
    drop(file);
    std::fs::rename(&partial, dest)
        .with_context(|| format!("moving download into {}", dest.display()))?;
    tracing::debug!(url, bytes, "downloaded");
    Ok(FetchOutcome { status, bytes })
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut s = dest.as_os_str().to_owned();
    s.push(".partial");
    PathBuf::from(s)
}

#[allow(clippy::expect_used)] // Template is a compile-time constant
fn spinner(msg: &str) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg} {bytes}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
