//! Fake collaborators for worker integration tests.

use async_trait::async_trait;
use reelq_core::engine::{DownloadEngine, DownloadRequest, EngineOutcome};
use reelq_core::item_db::{ItemDb, ItemId};
use reelq_core::resolver::{Cookie, ResolvedSource, SourceError, SourceResolver};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub enum SourceScript {
    Resolve,
    Timeout,
    Fail(&'static str),
}

pub struct FakeSource(pub SourceScript);

#[async_trait]
impl SourceResolver for FakeSource {
    async fn resolve_source(&self, _url: &str) -> Result<ResolvedSource, SourceError> {
        match &self.0 {
            SourceScript::Resolve => Ok(ResolvedSource {
                manifest_url: "https://cdn.example.com/master.m3u8".to_string(),
                headers: HashMap::from([(
                    "Referer".to_string(),
                    "https://example.com/".to_string(),
                )]),
                cookies: vec![Cookie {
                    name: "session".to_string(),
                    value: "abc".to_string(),
                    domain: ".example.com".to_string(),
                    path: "/".to_string(),
                    secure: true,
                    expiry: None,
                }],
            }),
            SourceScript::Timeout => Err(SourceError::Timeout(Duration::from_secs(60))),
            SourceScript::Fail(msg) => Err(SourceError::Failed(msg.to_string())),
        }
    }
}

pub enum EngineScript {
    /// Write `<base>.<ext>` into the output folder and succeed.
    WriteFile(&'static str),
    /// Report success without producing a file.
    NoFile,
    Fail(&'static str),
    /// Pause the item behind the worker's back, then write the file and succeed.
    PausedMidway(ItemDb, ItemId),
}

/// What the engine saw during its run.
#[derive(Debug, Clone)]
pub struct Seen {
    pub request: DownloadRequest,
    pub jar_contents: Option<String>,
}

pub struct FakeEngine {
    script: EngineScript,
    pub seen: Mutex<Vec<Seen>>,
}

impl FakeEngine {
    pub fn new(script: EngineScript) -> Self {
        Self {
            script,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

async fn write_output(req: &DownloadRequest, ext: &str) -> anyhow::Result<()> {
    let path = req.output_dir.join(format!("{}.{}", req.base_name, ext));
    tokio::fs::write(path, b"not really a video").await?;
    Ok(())
}

#[async_trait]
impl DownloadEngine for FakeEngine {
    async fn download(
        &self,
        req: &DownloadRequest,
        progress: mpsc::Sender<f64>,
    ) -> anyhow::Result<EngineOutcome> {
        let jar_contents = tokio::fs::read_to_string(&req.cookie_jar).await.ok();
        self.seen.lock().unwrap().push(Seen {
            request: req.clone(),
            jar_contents,
        });
        for pct in [12.5, 60.0] {
            let _ = progress.send(pct).await;
        }

        match &self.script {
            EngineScript::WriteFile(ext) => {
                write_output(req, ext).await?;
                let _ = progress.send(100.0).await;
                Ok(EngineOutcome::Succeeded)
            }
            EngineScript::NoFile => Ok(EngineOutcome::Succeeded),
            EngineScript::Fail(output) => Ok(EngineOutcome::Failed {
                output: output.to_string(),
            }),
            EngineScript::PausedMidway(db, id) => {
                db.mark_paused(*id).await?;
                write_output(req, "mp4").await?;
                Ok(EngineOutcome::Succeeded)
            }
        }
    }
}
