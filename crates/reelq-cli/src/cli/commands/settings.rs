//! `reelq settings` – show or change runtime settings.

use anyhow::Result;
use reelq_core::orchestrator::Orchestrator;
use reelq_core::settings::SettingsUpdate;

pub async fn run_settings(orch: &Orchestrator, update: &SettingsUpdate) -> Result<()> {
    let settings = if update.is_empty() {
        orch.settings().await?
    } else {
        let s = orch.update_settings(update).await?;
        println!("Settings updated.");
        s
    };
    println!("download_folder      = {}", settings.download_folder.display());
    println!("filename_template    = {}", settings.filename_template);
    println!("concurrent_downloads = {}", settings.concurrent_downloads);
    println!(
        "speed_limit          = {}",
        settings.speed_limit.as_deref().unwrap_or("unlimited")
    );
    Ok(())
}
