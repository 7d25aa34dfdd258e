//! `reelq run` – run the auto-download loop in the foreground.

use anyhow::{Context, Result};
use reelq_core::orchestrator::Orchestrator;

pub async fn run_loop(orch: &Orchestrator, once: bool) -> Result<()> {
    if once {
        let report = orch.run_cycle().await?;
        println!(
            "Started {} item(s), reaped {} (capacity {})",
            report.started.len(),
            report.reaped.len(),
            report.capacity
        );
        return Ok(());
    }

    orch.set_auto_download(true).await;
    println!("Auto-download running; press Ctrl-C to stop scheduling.");
    tokio::signal::ctrl_c()
        .await
        .context("wait for Ctrl-C")?;
    orch.set_auto_download(false).await;
    // Workers keep running; a later `reelq run` or `reelq status` adopts them.
    tracing::info!("auto-download stopped by Ctrl-C");
    println!("Stopped scheduling. Running downloads continue in the background.");
    Ok(())
}
