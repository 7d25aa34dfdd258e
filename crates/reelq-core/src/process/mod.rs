//! Process lifecycle: the table of live worker processes.
//!
//! The table is the authority for "is something running". The item's `pid`
//! column mirrors it for display and for finding workers after a restart.

pub mod launcher;
pub mod manager;
pub mod signal;

use std::collections::HashMap;
use std::process::Child;

use crate::item_db::ItemId;

pub use launcher::{ExeLauncher, WorkerLauncher};
pub use manager::ProcessManager;
pub use signal::Termination;

/// How we know about a worker process.
#[derive(Debug)]
pub enum WorkerHandle {
    /// Launched by this process; liveness via `try_wait`, which also reaps it.
    Spawned(Child),
    /// Found in the item store, launched by another orchestrator process.
    Adopted { pid: u32 },
}

impl WorkerHandle {
    pub fn pid(&self) -> u32 {
        match self {
            WorkerHandle::Spawned(child) => child.id(),
            WorkerHandle::Adopted { pid } => *pid,
        }
    }

    pub fn is_alive(&mut self) -> bool {
        match self {
            WorkerHandle::Spawned(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::debug!(pid = child.id(), %status, "worker exited");
                    false
                }
                Err(e) => {
                    tracing::warn!(pid = child.id(), "try_wait failed: {}", e);
                    signal::is_alive(child.id())
                }
            },
            WorkerHandle::Adopted { pid } => signal::is_alive(*pid),
        }
    }

    /// Ask the worker's process group to stop. A spawned child is then waited on
    /// in a blocking task so it does not linger as a zombie.
    pub fn terminate(self) -> std::io::Result<Termination> {
        let pid = self.pid();
        let result = signal::terminate_group(pid);
        if let WorkerHandle::Spawned(mut child) = self {
            tokio::task::spawn_blocking(move || {
                if let Err(e) = child.wait() {
                    tracing::debug!(pid, "wait after terminate failed: {}", e);
                }
            });
        }
        result
    }
}

#[derive(Debug)]
pub struct TrackedWorker {
    pub item_id: ItemId,
    pub handle: WorkerHandle,
}

/// Live workers keyed by OS pid. Not persisted.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: HashMap<u32, TrackedWorker>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_pid(&self, pid: u32) -> bool {
        self.entries.contains_key(&pid)
    }

    pub fn pid_for_item(&self, item_id: ItemId) -> Option<u32> {
        self.entries
            .iter()
            .find(|(_, w)| w.item_id == item_id)
            .map(|(pid, _)| *pid)
    }

    pub fn pids(&self) -> Vec<u32> {
        self.entries.keys().copied().collect()
    }

    pub fn insert(&mut self, item_id: ItemId, handle: WorkerHandle) -> u32 {
        let pid = handle.pid();
        if let Some(old) = self.entries.insert(pid, TrackedWorker { item_id, handle }) {
            tracing::warn!(pid, old_item = old.item_id, item_id, "pid reused in process table");
        }
        pid
    }

    pub fn remove(&mut self, pid: u32) -> Option<TrackedWorker> {
        self.entries.remove(&pid)
    }

    /// Drop every dead worker. Returns `(pid, item_id)` of each one removed.
    pub fn reap(&mut self) -> Vec<(u32, ItemId)> {
        let dead: Vec<u32> = self
            .entries
            .iter_mut()
            .filter_map(|(pid, w)| (!w.handle.is_alive()).then_some(*pid))
            .collect();
        dead.into_iter()
            .filter_map(|pid| self.entries.remove(&pid).map(|w| (pid, w.item_id)))
            .collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Command;
    use std::time::Duration;

    #[tokio::test]
    async fn reap_removes_exited_children() {
        let mut table = ProcessTable::new();
        let quick = Command::new("true").spawn().unwrap();
        let slow = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let quick_pid = table.insert(1, WorkerHandle::Spawned(quick));
        let slow_pid = table.insert(2, WorkerHandle::Spawned(slow));
        assert_eq!(table.len(), 2);

        let mut reaped = Vec::new();
        for _ in 0..100 {
            reaped.extend(table.reap());
            if !reaped.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(reaped, vec![(quick_pid, 1)]);
        assert!(table.contains_pid(slow_pid));
        assert_eq!(table.pid_for_item(2), Some(slow_pid));

        let tracked = table.remove(slow_pid).unwrap();
        assert_eq!(tracked.handle.terminate().unwrap(), Termination::Signalled);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn adopted_liveness_follows_the_pid() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let mut handle = WorkerHandle::Adopted { pid: child.id() };
        assert!(handle.is_alive());
        child.kill().unwrap();
        child.wait().unwrap();
        assert!(!handle.is_alive());
    }
}
