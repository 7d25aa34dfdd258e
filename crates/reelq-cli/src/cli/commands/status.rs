//! `reelq status` – show every item.

use anyhow::Result;
use reelq_core::orchestrator::Orchestrator;

pub async fn run_status(orch: &Orchestrator, json: bool) -> Result<()> {
    let snapshot = orch.status_snapshot().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    if snapshot.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!("{:<6} {:<24} {:>7}  {}", "ID", "STATUS", "PROG", "TITLE");
    for (id, entry) in &snapshot {
        println!(
            "{:<6} {:<24} {:>6.1}%  {}",
            id,
            entry.status.to_string(),
            entry.progress,
            entry.title.as_deref().unwrap_or("-")
        );
        if let Some(message) = &entry.message {
            println!("{:<6} {}", "", message);
        }
        if let Some(path) = &entry.filepath {
            println!("{:<6} -> {}", "", path);
        }
    }
    Ok(())
}
