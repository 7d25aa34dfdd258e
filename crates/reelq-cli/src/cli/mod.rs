//! CLI for the reelq download orchestrator.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reelq_core::config;
use reelq_core::item_db::{ItemDb, ItemId};
use reelq_core::orchestrator::Orchestrator;
use reelq_core::settings::{self, SettingsUpdate};
use std::path::PathBuf;

use commands::{
    run_add, run_add_list, run_add_series, run_delete, run_delete_file, run_delete_series,
    run_loop, run_requeue, run_requeue_series, run_settings, run_start, run_status, run_stop,
    run_worker_command,
};

/// Overrides the database location for this process and every worker it launches.
pub const DB_ENV: &str = "REELQ_DB";

/// Top-level CLI for the reelq download orchestrator.
#[derive(Debug, Parser)]
#[command(name = "reelq")]
#[command(about = "reelq: queue, schedule and supervise video downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a movie page.
    Add {
        /// Page URL of the movie.
        url: String,
    },

    /// Queue several movie pages at once.
    AddList {
        /// Page URLs.
        urls: Vec<String>,
        /// Read additional URLs from a file, one per line (`#` starts a comment).
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Queue every episode listed on a series page.
    AddSeries {
        /// Page URL of the series.
        url: String,
    },

    /// Start downloading an item now, ignoring the concurrency limit.
    Start { id: ItemId },

    /// Stop an item's worker and pause it.
    Stop { id: ItemId },

    /// Put a paused, failed or completed item back in the queue.
    Requeue { id: ItemId },

    /// Requeue every paused or failed episode of a series.
    RequeueSeries { title: String },

    /// Delete an item's record (the downloaded file is kept).
    Delete { id: ItemId },

    /// Delete every episode record of a series.
    DeleteSeries { title: String },

    /// Delete an item's downloaded file (the record is kept).
    DeleteFile { id: ItemId },

    /// Show every item.
    Status {
        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show or change runtime settings.
    Settings {
        #[arg(long, value_name = "DIR")]
        download_folder: Option<String>,
        /// Placeholders: {title} {year} {genre} {imdb_score} {director}.
        #[arg(long, value_name = "TEMPLATE")]
        filename_template: Option<String>,
        #[arg(long, value_name = "N")]
        concurrent_downloads: Option<String>,
        /// Rate such as 500K or 2M; empty string for unlimited.
        #[arg(long, value_name = "RATE")]
        speed_limit: Option<String>,
    },

    /// Run the auto-download loop until Ctrl-C.
    Run {
        /// Run a single scheduling cycle and exit.
        #[arg(long)]
        once: bool,
    },

    /// Worker process entry point (launched by the orchestrator).
    #[command(hide = true)]
    Worker { id: ItemId },
}

/// `$REELQ_DB` if set, otherwise the default state database.
async fn open_db() -> Result<ItemDb> {
    match std::env::var_os(DB_ENV) {
        Some(path) if !path.is_empty() => ItemDb::open_at(PathBuf::from(path)).await,
        _ => ItemDb::open_default().await,
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = open_db().await?;

        // Workers only touch their own item; no reconcile, no admin sync.
        let command = match cli.command {
            CliCommand::Worker { id } => return run_worker_command(db, &cfg, id).await,
            command => command,
        };

        settings::sync_admin_hash_from_env(&db).await?;
        let orch = Orchestrator::from_config(db, &cfg)?;
        // Pick up workers launched by earlier invocations.
        orch.reconcile().await?;

        match command {
            CliCommand::Add { url } => run_add(&orch, &url).await?,
            CliCommand::AddList { urls, file } => run_add_list(&orch, urls, file.as_deref()).await?,
            CliCommand::AddSeries { url } => run_add_series(&orch, &url).await?,
            CliCommand::Start { id } => run_start(&orch, id).await?,
            CliCommand::Stop { id } => run_stop(&orch, id).await?,
            CliCommand::Requeue { id } => run_requeue(&orch, id).await?,
            CliCommand::RequeueSeries { title } => run_requeue_series(&orch, &title).await?,
            CliCommand::Delete { id } => run_delete(&orch, id).await?,
            CliCommand::DeleteSeries { title } => run_delete_series(&orch, &title).await?,
            CliCommand::DeleteFile { id } => run_delete_file(&orch, id).await?,
            CliCommand::Status { json } => run_status(&orch, json).await?,
            CliCommand::Settings {
                download_folder,
                filename_template,
                concurrent_downloads,
                speed_limit,
            } => {
                let update = SettingsUpdate {
                    download_folder,
                    filename_template,
                    concurrent_downloads,
                    speed_limit,
                };
                run_settings(&orch, &update).await?;
            }
            CliCommand::Run { once } => run_loop(&orch, once).await?,
            CliCommand::Worker { .. } => {
                unreachable!("worker is dispatched before the orchestrator is built")
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
