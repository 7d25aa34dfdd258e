//! Item status state machine.
//!
//! ```text
//! Queued ─start─> ResolvingSource ─resolved─> Downloading ─> Completed | Error(kind)
//!                      │                          │
//!                      └──────── stop ────────────┴──> Paused
//! Paused | Error | Completed ─requeue─> Queued
//! ```
//!
//! Statuses are stored as strings; a transition is only written when the row's
//! current status is one of the legal predecessors (see `ItemDb::transition`).

use serde::{Serialize, Serializer};
use std::fmt;

/// Cause recorded with an `Error` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source resolution failed or timed out.
    NoSource,
    /// Engine reported success but no output file was found.
    FileMissing,
    AccessDenied,
    NoDiskSpace,
    SourceNotFound,
    Unclassified,
    /// Worker process died without writing a terminal status.
    WorkerLost,
    /// Unexpected failure inside the worker (or while launching it).
    Unexpected,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::NoSource,
        ErrorKind::FileMissing,
        ErrorKind::AccessDenied,
        ErrorKind::NoDiskSpace,
        ErrorKind::SourceNotFound,
        ErrorKind::Unclassified,
        ErrorKind::WorkerLost,
        ErrorKind::Unexpected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NoSource => "no_source",
            ErrorKind::FileMissing => "file_missing",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::NoDiskSpace => "no_disk_space",
            ErrorKind::SourceNotFound => "source_not_found",
            ErrorKind::Unclassified => "unclassified",
            ErrorKind::WorkerLost => "worker_lost",
            ErrorKind::Unexpected => "unexpected",
        }
    }

    fn from_str(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .unwrap_or(ErrorKind::Unclassified)
    }
}

/// Lifecycle status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    Queued,
    ResolvingSource,
    Downloading,
    Completed,
    Paused,
    Error(ErrorKind),
}

impl ItemStatus {
    /// Every representable status, used to build predecessor sets for conditional updates.
    pub fn all() -> impl Iterator<Item = ItemStatus> {
        [
            ItemStatus::Queued,
            ItemStatus::ResolvingSource,
            ItemStatus::Downloading,
            ItemStatus::Completed,
            ItemStatus::Paused,
        ]
        .into_iter()
        .chain(ErrorKind::ALL.into_iter().map(ItemStatus::Error))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::ResolvingSource => "resolving_source",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Completed => "completed",
            ItemStatus::Paused => "paused",
            ItemStatus::Error(ErrorKind::NoSource) => "error:no_source",
            ItemStatus::Error(ErrorKind::FileMissing) => "error:file_missing",
            ItemStatus::Error(ErrorKind::AccessDenied) => "error:access_denied",
            ItemStatus::Error(ErrorKind::NoDiskSpace) => "error:no_disk_space",
            ItemStatus::Error(ErrorKind::SourceNotFound) => "error:source_not_found",
            ItemStatus::Error(ErrorKind::Unclassified) => "error:unclassified",
            ItemStatus::Error(ErrorKind::WorkerLost) => "error:worker_lost",
            ItemStatus::Error(ErrorKind::Unexpected) => "error:unexpected",
        }
    }

    /// Parse a stored status. Unknown strings map to `Error(Unclassified)`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => ItemStatus::Queued,
            "resolving_source" => ItemStatus::ResolvingSource,
            "downloading" => ItemStatus::Downloading,
            "completed" => ItemStatus::Completed,
            "paused" => ItemStatus::Paused,
            other => match other.strip_prefix("error:") {
                Some(kind) => ItemStatus::Error(ErrorKind::from_str(kind)),
                None => ItemStatus::Error(ErrorKind::Unclassified),
            },
        }
    }

    /// A worker is (believed to be) working on the item.
    pub fn is_active(self) -> bool {
        matches!(self, ItemStatus::ResolvingSource | ItemStatus::Downloading)
    }

    /// No automatic transition leaves this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error(_))
    }

    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        match (self, next) {
            (from, ResolvingSource) => !from.is_active(),
            (ResolvingSource, Downloading) => true,
            (ResolvingSource | Downloading, Error(_)) => true,
            (Downloading, Completed) => true,
            (Queued | ResolvingSource | Downloading, Paused) => true,
            (Paused | Error(_) | Completed, Queued) => true,
            _ => false,
        }
    }

    /// Statuses from which `self` may be entered.
    pub fn predecessors(self) -> Vec<ItemStatus> {
        ItemStatus::all()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in ItemStatus::all() {
            assert_eq!(ItemStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_is_unclassified_error() {
        assert_eq!(
            ItemStatus::from_str("Tamamlandı"),
            ItemStatus::Error(ErrorKind::Unclassified)
        );
        assert_eq!(
            ItemStatus::from_str("error:exploded"),
            ItemStatus::Error(ErrorKind::Unclassified)
        );
    }

    #[test]
    fn resolution_is_mandatory() {
        assert!(!ItemStatus::Queued.can_transition_to(ItemStatus::Downloading));
        assert!(!ItemStatus::Completed.can_transition_to(ItemStatus::Downloading));
        assert!(!ItemStatus::Paused.can_transition_to(ItemStatus::Downloading));
        assert!(ItemStatus::ResolvingSource.can_transition_to(ItemStatus::Downloading));
    }

    #[test]
    fn start_only_from_idle_states() {
        assert!(ItemStatus::Queued.can_transition_to(ItemStatus::ResolvingSource));
        assert!(ItemStatus::Paused.can_transition_to(ItemStatus::ResolvingSource));
        assert!(ItemStatus::Completed.can_transition_to(ItemStatus::ResolvingSource));
        assert!(ItemStatus::Error(ErrorKind::NoSource).can_transition_to(ItemStatus::ResolvingSource));
        assert!(!ItemStatus::ResolvingSource.can_transition_to(ItemStatus::ResolvingSource));
        assert!(!ItemStatus::Downloading.can_transition_to(ItemStatus::ResolvingSource));
    }

    #[test]
    fn completion_requires_downloading() {
        assert!(ItemStatus::Downloading.can_transition_to(ItemStatus::Completed));
        assert!(!ItemStatus::ResolvingSource.can_transition_to(ItemStatus::Completed));
        assert!(!ItemStatus::Paused.can_transition_to(ItemStatus::Completed));
        assert!(!ItemStatus::Queued.can_transition_to(ItemStatus::Completed));
    }

    #[test]
    fn requeue_from_paused_error_completed() {
        assert!(ItemStatus::Paused.can_transition_to(ItemStatus::Queued));
        assert!(ItemStatus::Error(ErrorKind::AccessDenied).can_transition_to(ItemStatus::Queued));
        assert!(ItemStatus::Completed.can_transition_to(ItemStatus::Queued));
        assert!(!ItemStatus::Downloading.can_transition_to(ItemStatus::Queued));
        assert!(!ItemStatus::Queued.can_transition_to(ItemStatus::Queued));
    }

    #[test]
    fn paused_does_not_accept_late_worker_writes() {
        let preds = ItemStatus::Completed.predecessors();
        assert_eq!(preds, vec![ItemStatus::Downloading]);
        assert!(!ItemStatus::Paused.can_transition_to(ItemStatus::Error(ErrorKind::Unclassified)));
    }
}
