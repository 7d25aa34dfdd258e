//! `reelq start|stop|requeue|requeue-series`.

use anyhow::Result;
use reelq_core::item_db::ItemId;
use reelq_core::orchestrator::Orchestrator;

pub async fn run_start(orch: &Orchestrator, id: ItemId) -> Result<()> {
    let title = orch.start(id).await?;
    println!("Started \"{title}\" (item {id})");
    Ok(())
}

pub async fn run_stop(orch: &Orchestrator, id: ItemId) -> Result<()> {
    let status = orch.stop(id).await?;
    println!("Stopped item {id} ({status})");
    Ok(())
}

pub async fn run_requeue(orch: &Orchestrator, id: ItemId) -> Result<()> {
    orch.requeue(id).await?;
    println!("Requeued item {id}");
    Ok(())
}

pub async fn run_requeue_series(orch: &Orchestrator, title: &str) -> Result<()> {
    let n = orch.requeue_series(title).await?;
    println!("Requeued {n} episode(s) of \"{title}\"");
    Ok(())
}
