//! yt-dlp compatible download engine.
//!
//! The child stays in the worker's process group, so stopping the worker's
//! group also stops the download.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::{DownloadEngine, DownloadRequest, EngineOutcome};
use crate::config::EngineConfig;
use crate::progress::parse_progress_line;

/// Keep at most this much output for failure classification.
const MAX_OUTPUT_BYTES: usize = 256 * 1024;

pub struct YtDlpEngine {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.program.clone(), cfg.extra_args.clone())
    }

    /// Full argument list for one request.
    pub fn build_args(&self, req: &DownloadRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--cookies".into(),
            req.cookie_jar.clone().into_os_string(),
            "--newline".into(),
            "--no-color".into(),
            "--progress".into(),
        ];
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push("-o".into());
        args.push(
            req.output_dir
                .join(format!("{}.%(ext)s", req.base_name))
                .into_os_string(),
        );
        if let Some(limit) = req.speed_limit.as_deref().filter(|l| !l.is_empty()) {
            args.push("--limit-rate".into());
            args.push(limit.into());
        }
        let mut headers: Vec<_> = req.headers.iter().collect();
        headers.sort();
        for (k, v) in headers {
            args.push("--add-header".into());
            args.push(format!("{}: {}", k.trim(), v.trim()).into());
        }
        args.push(req.manifest_url.as_str().into());
        args
    }
}

fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("engine output read error: {}", e);
                    break;
                }
            }
        }
    })
}

#[async_trait]
impl DownloadEngine for YtDlpEngine {
    async fn download(
        &self,
        req: &DownloadRequest,
        progress: mpsc::Sender<f64>,
    ) -> Result<EngineOutcome> {
        let args = self.build_args(req);
        tracing::info!(
            program = %self.program.display(),
            base_name = %req.base_name,
            "starting download engine"
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;

        // stderr is merged into the scanned output.
        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut output = String::new();
        while let Some(line) = line_rx.recv().await {
            if let Some(pct) = parse_progress_line(&line) {
                // Waits while the reporter is busy; an error only means it is gone.
                let _ = progress.send(pct).await;
            }
            if output.len() + line.len() < MAX_OUTPUT_BYTES {
                output.push_str(&line);
                output.push('\n');
            } else if let Some(cut) = output.find('\n') {
                output.drain(..=cut);
                output.push_str(&line);
                output.push('\n');
            }
        }
        for r in readers {
            let _ = r.await;
        }

        let status = child.wait().await.context("wait for download engine")?;
        if status.success() {
            tracing::info!(base_name = %req.base_name, "download engine finished");
            Ok(EngineOutcome::Succeeded)
        } else {
            tracing::warn!(base_name = %req.base_name, %status, "download engine failed");
            Ok(EngineOutcome::Failed { output })
        }
    }
}
