//! The body of a worker process: resolve the source, run the download, and
//! write a terminal status for one item.
//!
//! Every path that returns normally leaves the item in a terminal status (or
//! untouched, when an operator stopped it first), and the cookie jar is
//! removed on every path.

pub mod cookies;
pub mod output;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::classify::classify_failure;
use crate::engine::{DownloadEngine, DownloadRequest, EngineOutcome};
use crate::filename::{resolve_base_name, FilenameFields};
use crate::item_db::{Item, ItemDb, ItemId, TransitionOutcome};
use crate::progress::ProgressReporter;
use crate::resolver::{SourceError, SourceResolver};
use crate::settings::Settings;
use crate::state::{ErrorKind, ItemStatus};

use cookies::{jar_path, CookieJar};
use output::find_output_file;

/// Collaborators a worker needs.
pub struct WorkerContext {
    pub db: ItemDb,
    pub source: Arc<dyn SourceResolver>,
    pub engine: Arc<dyn DownloadEngine>,
    /// Directory for transient cookie jars.
    pub scratch_dir: PathBuf,
}

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Completed(PathBuf),
    Failed(ErrorKind),
    /// The item was not waiting for a worker (already stopped or restarted).
    Skipped(ItemStatus),
    /// An operator changed the item mid-run; its status was left alone.
    Superseded(ItemStatus),
}

fn outcome_of(transition: TransitionOutcome, success: WorkerOutcome) -> WorkerOutcome {
    match transition {
        TransitionOutcome::Applied => success,
        TransitionOutcome::Rejected(current) => WorkerOutcome::Superseded(current),
        TransitionOutcome::Missing => WorkerOutcome::Superseded(ItemStatus::Paused),
    }
}

/// Process one item. Unexpected errors are recorded as `error:unexpected`.
pub async fn process_item(ctx: &WorkerContext, item_id: ItemId) -> Result<WorkerOutcome> {
    let span = tracing::info_span!("worker", item_id);
    async {
        match run(ctx, item_id).await {
            Ok(outcome) => {
                tracing::info!(?outcome, "worker finished");
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("unexpected worker error: {:#}", e);
                let transition = ctx
                    .db
                    .mark_failed(
                        item_id,
                        ErrorKind::Unexpected,
                        &format!("unexpected system error: {e:#}"),
                        None,
                    )
                    .await?;
                Ok(outcome_of(transition, WorkerOutcome::Failed(ErrorKind::Unexpected)))
            }
        }
    }
    .instrument(span)
    .await
}

/// Like `process_item`, but returns early on `SIGTERM` so the cookie jar
/// and the engine child are cleaned up.
#[cfg(unix)]
pub async fn run_worker(ctx: &WorkerContext, item_id: ItemId) -> Result<Option<WorkerOutcome>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        res = process_item(ctx, item_id) => res.map(Some),
        _ = term.recv() => {
            tracing::info!(item_id, "worker received SIGTERM");
            Ok(None)
        }
    }
}

#[cfg(not(unix))]
pub async fn run_worker(ctx: &WorkerContext, item_id: ItemId) -> Result<Option<WorkerOutcome>> {
    process_item(ctx, item_id).await.map(Some)
}

fn filename_fields(item: &Item) -> FilenameFields<'_> {
    let m = &item.metadata;
    FilenameFields {
        title: m.title.as_deref(),
        year: m.year.as_deref(),
        genre: m.genre.as_deref(),
        imdb_score: m.rating.as_deref(),
        director: m.director.as_deref(),
    }
}

async fn run(ctx: &WorkerContext, item_id: ItemId) -> Result<WorkerOutcome> {
    let db = &ctx.db;
    let item = db
        .get_item(item_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("item {} not found", item_id))?;
    if item.status != ItemStatus::ResolvingSource {
        tracing::info!(status = %item.status, "item is not waiting for a worker");
        return Ok(WorkerOutcome::Skipped(item.status));
    }

    let settings = Settings::load(db).await?;
    let folder = settings.download_folder.clone();
    tokio::fs::create_dir_all(&folder)
        .await
        .with_context(|| format!("create download folder {}", folder.display()))?;

    tracing::info!(url = %item.url, "resolving source");
    let source = match ctx.source.resolve_source(&item.url).await {
        Ok(source) => source,
        Err(e) => {
            let message = match &e {
                SourceError::Timeout(_) => format!("video source search timed out: {e}"),
                SourceError::Failed(_) => format!("video source not found: {e}"),
            };
            tracing::warn!("{}", message);
            let transition = db
                .mark_failed(item_id, ErrorKind::NoSource, &message, Some(0.0))
                .await?;
            return Ok(outcome_of(transition, WorkerOutcome::Failed(ErrorKind::NoSource)));
        }
    };

    let jar = CookieJar::write(jar_path(&ctx.scratch_dir, item_id), &source.cookies).await?;

    let transition = db.mark_downloading(item_id, &source.manifest_url).await?;
    if !transition.is_applied() {
        return Ok(outcome_of(transition, WorkerOutcome::Failed(ErrorKind::Unexpected)));
    }

    let base_name = resolve_base_name(&settings.filename_template, &filename_fields(&item));
    tracing::info!(base_name = %base_name, "download starting");
    let request = DownloadRequest {
        manifest_url: source.manifest_url.clone(),
        headers: source.headers.clone(),
        cookie_jar: jar.path().to_path_buf(),
        output_dir: folder.clone(),
        base_name: base_name.clone(),
        speed_limit: settings.speed_limit.clone(),
    };

    let (progress_tx, progress_rx) = mpsc::channel(64);
    let reporter = tokio::spawn(ProgressReporter::new(db.clone(), item_id).run(progress_rx));
    let engine_result = ctx.engine.download(&request, progress_tx).await;
    if let Err(e) = reporter.await {
        tracing::warn!("progress reporter task failed: {}", e);
    }
    drop(jar);

    match engine_result? {
        EngineOutcome::Succeeded => finish_success(db, item_id, &folder, &base_name).await,
        EngineOutcome::Failed { output } => {
            let classified = classify_failure(&output);
            tracing::error!(kind = classified.kind.as_str(), "download failed: {}", classified.message);
            let transition = db
                .mark_failed(item_id, classified.kind, &classified.message, None)
                .await?;
            Ok(outcome_of(transition, WorkerOutcome::Failed(classified.kind)))
        }
    }
}

async fn finish_success(
    db: &ItemDb,
    item_id: ItemId,
    folder: &Path,
    base_name: &str,
) -> Result<WorkerOutcome> {
    match find_output_file(folder, base_name).await? {
        Some(path) => {
            let path = std::path::absolute(&path).unwrap_or(path);
            let transition = db
                .mark_completed(item_id, &path.to_string_lossy())
                .await?;
            tracing::info!(file = %path.display(), "download completed");
            Ok(outcome_of(transition, WorkerOutcome::Completed(path)))
        }
        None => {
            tracing::error!(
                folder = %folder.display(),
                base_name,
                "engine reported success but no output file was found"
            );
            let transition = db
                .mark_failed(
                    item_id,
                    ErrorKind::FileMissing,
                    &format!("downloaded file not found: {}.*", folder.join(base_name).display()),
                    Some(100.0),
                )
                .await?;
            Ok(outcome_of(transition, WorkerOutcome::Failed(ErrorKind::FileMissing)))
        }
    }
}
