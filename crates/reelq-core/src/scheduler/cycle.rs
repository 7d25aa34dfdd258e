//! One admission cycle.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::reconcile::{reconcile, ReconcileReport};
use crate::error::OpError;
use crate::item_db::ItemId;
use crate::process::ProcessManager;
use crate::settings::Settings;

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Items whose worker was found dead.
    pub reaped: Vec<ItemId>,
    /// Items started this cycle.
    pub started: Vec<ItemId>,
    /// Free slots computed at the start of the cycle.
    pub capacity: usize,
}

/// Fills free download slots with the oldest queued items.
pub struct Scheduler {
    manager: Arc<ProcessManager>,
    cycle_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        Self {
            manager,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn manager(&self) -> &Arc<ProcessManager> {
        &self.manager
    }

    /// Reconcile only; no new workers are started.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let _guard = self.cycle_lock.lock().await;
        reconcile(&self.manager).await
    }

    /// Run one cycle. Cycles never overlap.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self.cycle_lock.lock().await;
        let db = self.manager.db();

        let reconciled = reconcile(&self.manager).await?;
        let settings = Settings::load(db).await?;
        let running = self.manager.running_count().await;
        let capacity = settings.concurrent_downloads.saturating_sub(running);

        let mut report = CycleReport {
            reaped: reconciled.reaped,
            started: Vec::new(),
            capacity,
        };

        for _ in 0..capacity {
            let Some(id) = db.next_queued_item().await? else {
                break;
            };
            match self.manager.start(id).await {
                Ok(title) => {
                    tracing::info!(item_id = id, title = %title, "auto-download started item");
                    report.started.push(id);
                }
                // The item is already marked as failed; the slot is still used.
                Err(OpError::Launch(e)) => {
                    tracing::error!(item_id = id, "auto-download could not launch worker: {}", e);
                }
                Err(OpError::Store(e)) => return Err(e),
                Err(e) => {
                    tracing::warn!(item_id = id, "auto-download skipped item: {}", e);
                }
            }
        }

        if !report.started.is_empty() || !report.reaped.is_empty() {
            tracing::debug!(
                started = report.started.len(),
                reaped = report.reaped.len(),
                capacity,
                running,
                "scheduling cycle done"
            );
        }
        Ok(report)
    }
}
