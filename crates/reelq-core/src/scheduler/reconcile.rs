//! Bring the process table and the item store's `pid` column back in step.

use anyhow::Result;

use crate::item_db::{ItemDb, ItemId};
use crate::process::{signal, ProcessManager, WorkerHandle};
use crate::state::ErrorKind;

/// A claimed item with no pid for this long is considered abandoned.
const CLAIM_GRACE_MS: i64 = 60_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Dead workers removed from the table or found dead in the store.
    pub reaped: Vec<ItemId>,
    /// Live workers of other orchestrator processes now tracked here.
    pub adopted: Vec<ItemId>,
    /// Items marked `error:worker_lost`.
    pub lost: Vec<ItemId>,
}

/// Clear the pid of a dead worker; mark its item lost if it never wrote a result.
async fn settle_dead_worker(db: &ItemDb, item_id: ItemId, pid: u32) -> Result<bool> {
    db.clear_pid(item_id).await?;
    let Some(item) = db.get_item(item_id).await? else {
        return Ok(false);
    };
    if !item.status.is_active() {
        tracing::debug!(item_id, pid, status = %item.status, "worker finished");
        return Ok(false);
    }
    let applied = db
        .mark_failed(
            item_id,
            ErrorKind::WorkerLost,
            &format!("worker process {pid} exited without reporting a result"),
            None,
        )
        .await?
        .is_applied();
    if applied {
        tracing::warn!(item_id, pid, "worker lost");
    }
    Ok(applied)
}

/// Reap dead workers, adopt live ones found only in the store, and clear the rest.
///
/// Afterwards an item's `pid` is set exactly when that pid is in the table.
pub(crate) async fn reconcile(manager: &ProcessManager) -> Result<ReconcileReport> {
    let db = manager.db();
    let mut report = ReconcileReport::default();
    let mut table = manager.lock_table().await;

    for (pid, item_id) in table.reap() {
        report.reaped.push(item_id);
        if settle_dead_worker(db, item_id, pid).await? {
            report.lost.push(item_id);
        }
    }

    for row in db.items_with_pid().await? {
        if table.contains_pid(row.pid) {
            continue;
        }
        if signal::is_alive(row.pid) {
            table.insert(row.id, WorkerHandle::Adopted { pid: row.pid });
            tracing::info!(item_id = row.id, pid = row.pid, "adopted running worker");
            report.adopted.push(row.id);
        } else {
            report.reaped.push(row.id);
            if settle_dead_worker(db, row.id, row.pid).await? {
                report.lost.push(row.id);
            }
        }
    }

    let cutoff = crate::item_db::db::unix_millis() - CLAIM_GRACE_MS;
    for item_id in db.stale_unowned_active_items(cutoff).await? {
        if table.pid_for_item(item_id).is_some() {
            continue;
        }
        let applied = db
            .mark_failed(
                item_id,
                ErrorKind::WorkerLost,
                "worker was never recorded as running",
                None,
            )
            .await?
            .is_applied();
        if applied {
            tracing::warn!(item_id, "abandoned start marked as worker lost");
            report.lost.push(item_id);
        }
    }

    Ok(report)
}
