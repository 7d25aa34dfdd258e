//! Download engine interface.
//!
//! The worker hands a resolved manifest to the engine and gets back success
//! or the captured output of a failed run. Percentages are reported over a
//! channel while the engine runs.

pub mod ytdlp;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

pub use ytdlp::YtDlpEngine;

/// One download, fully resolved.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub manifest_url: String,
    pub headers: HashMap<String, String>,
    /// Netscape cookie jar written for this download.
    pub cookie_jar: PathBuf,
    pub output_dir: PathBuf,
    /// File name without extension; the engine picks the extension.
    pub base_name: String,
    /// Rate limit such as `500K`; `None` for unlimited.
    pub speed_limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    Succeeded,
    /// Non-zero exit. `output` is the merged stdout/stderr of the run.
    Failed { output: String },
}

#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Run one download to completion. `Err` means the engine could not be run at all.
    async fn download(
        &self,
        req: &DownloadRequest,
        progress: mpsc::Sender<f64>,
    ) -> anyhow::Result<EngineOutcome>;
}
