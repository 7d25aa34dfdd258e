//! `reelq delete|delete-series|delete-file`.

use anyhow::Result;
use reelq_core::item_db::ItemId;
use reelq_core::orchestrator::Orchestrator;

pub async fn run_delete(orch: &Orchestrator, id: ItemId) -> Result<()> {
    let title = orch.delete_record(id).await?;
    println!("Deleted \"{title}\" (item {id})");
    Ok(())
}

pub async fn run_delete_series(orch: &Orchestrator, title: &str) -> Result<()> {
    let n = orch.delete_series(title).await?;
    println!("Deleted {n} episode(s) of \"{title}\"");
    Ok(())
}

pub async fn run_delete_file(orch: &Orchestrator, id: ItemId) -> Result<()> {
    let path = orch.delete_file(id).await?;
    println!("Deleted {}", path.display());
    Ok(())
}
