//! Start and stop workers, keeping the item store's `pid` mirror in step
//! with the process table.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::signal::{self, Termination};
use super::{ProcessTable, WorkerHandle, WorkerLauncher};
use crate::error::{OpError, OpResult};
use crate::item_db::{ItemDb, ItemId, TransitionOutcome};
use crate::state::{ErrorKind, ItemStatus};

pub struct ProcessManager {
    db: ItemDb,
    launcher: Arc<dyn WorkerLauncher>,
    table: Mutex<ProcessTable>,
}

impl ProcessManager {
    pub fn new(db: ItemDb, launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            db,
            launcher,
            table: Mutex::new(ProcessTable::new()),
        }
    }

    pub fn db(&self) -> &ItemDb {
        &self.db
    }

    pub(crate) async fn lock_table(&self) -> MutexGuard<'_, ProcessTable> {
        self.table.lock().await
    }

    /// Number of live (or not yet reaped) workers.
    pub async fn running_count(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_tracked(&self, item_id: ItemId) -> bool {
        self.table.lock().await.pid_for_item(item_id).is_some()
    }

    /// Launch a worker for `id`. Returns the item's display title.
    pub async fn start(&self, id: ItemId) -> OpResult<String> {
        let item = self.db.get_item(id).await?.ok_or(OpError::NotFound(id))?;
        let title = item.display_title().to_string();
        if item.status.is_active() {
            return Err(OpError::AlreadyRunning { id, title });
        }

        match self.db.mark_started(id).await? {
            TransitionOutcome::Applied => {}
            TransitionOutcome::Rejected(from) if from.is_active() => {
                return Err(OpError::AlreadyRunning { id, title });
            }
            TransitionOutcome::Rejected(from) => {
                return Err(OpError::InvalidTransition {
                    id,
                    from,
                    to: ItemStatus::ResolvingSource,
                });
            }
            TransitionOutcome::Missing => return Err(OpError::NotFound(id)),
        }

        let child = match self.launcher.launch(id) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(item_id = id, "worker launch failed: {}", e);
                self.db
                    .mark_failed(
                        id,
                        ErrorKind::Unexpected,
                        &format!("failed to launch worker: {e}"),
                        None,
                    )
                    .await?;
                return Err(OpError::Launch(e));
            }
        };

        // Hold the table while mirroring the pid so a concurrent reap sees both or neither.
        let mut table = self.table.lock().await;
        let pid = table.insert(id, WorkerHandle::Spawned(child));
        self.db.set_pid(id, pid).await?;
        drop(table);

        tracing::info!(item_id = id, pid, title = %title, "download started");
        Ok(title)
    }

    /// Stop the worker of `id` and park the item. Returns the item's final status.
    ///
    /// An item whose worker already recorded `Completed` keeps that status.
    pub async fn stop(&self, id: ItemId) -> OpResult<ItemStatus> {
        let item = self.db.get_item(id).await?.ok_or(OpError::NotFound(id))?;
        let Some(pid) = item.pid else {
            return Err(OpError::NotRunning(id));
        };

        let tracked = {
            let mut table = self.table.lock().await;
            match table.remove(pid) {
                Some(w) if w.item_id == id => Some(w),
                Some(other) => {
                    // Stale mirror: the pid now belongs to another item's worker.
                    table.insert(other.item_id, other.handle);
                    None
                }
                None => None,
            }
        };

        let result = match tracked {
            Some(w) => w.handle.terminate(),
            None if item.status.is_active() => signal::terminate_group(pid),
            None => Ok(Termination::AlreadyGone),
        };
        match result {
            Ok(Termination::Signalled) => tracing::info!(item_id = id, pid, "sent SIGTERM to worker"),
            Ok(Termination::AlreadyGone) => tracing::debug!(item_id = id, pid, "worker already stopped"),
            Err(e) => tracing::warn!(item_id = id, pid, "could not signal worker: {}", e),
        }

        self.db.clear_pid(id).await?;
        let status = match self.db.mark_paused(id).await? {
            TransitionOutcome::Applied => ItemStatus::Paused,
            TransitionOutcome::Rejected(current) => {
                tracing::info!(item_id = id, status = %current, "stop left status unchanged");
                current
            }
            TransitionOutcome::Missing => return Err(OpError::NotFound(id)),
        };
        Ok(status)
    }

    /// Remove dead workers from the table. Returns `(pid, item_id)` of each.
    pub async fn reap(&self) -> Vec<(u32, ItemId)> {
        self.table.lock().await.reap()
    }
}
