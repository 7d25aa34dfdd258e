//! `reelq worker <id>` – body of a worker process.

use anyhow::Result;
use reelq_core::config::{self, ReelqConfig};
use reelq_core::engine::YtDlpEngine;
use reelq_core::item_db::{ItemDb, ItemId};
use reelq_core::resolver::CommandSourceResolver;
use reelq_core::worker::{run_worker, WorkerContext};
use std::sync::Arc;

pub async fn run_worker_command(db: ItemDb, cfg: &ReelqConfig, id: ItemId) -> Result<()> {
    let ctx = WorkerContext {
        db,
        source: Arc::new(CommandSourceResolver::from_config(&cfg.source_resolver)),
        engine: Arc::new(YtDlpEngine::from_config(&cfg.engine)),
        scratch_dir: config::state_dir()?,
    };
    tracing::debug!(item_id = id, pid = std::process::id(), "worker process started");
    match run_worker(&ctx, id).await? {
        Some(outcome) => tracing::debug!(item_id = id, ?outcome, "worker process exiting"),
        None => tracing::info!(item_id = id, "worker process terminated"),
    }
    Ok(())
}
