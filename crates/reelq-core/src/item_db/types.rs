//! Types used by the item database.

use serde::Serialize;

use crate::resolver::Metadata;
use crate::state::ItemStatus;

/// Item identifier.
pub type ItemId = i64;

/// What kind of media an item is. All kinds share one queue ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Episode,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Episode => "episode",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "episode" => ItemKind::Episode,
            _ => ItemKind::Movie,
        }
    }
}

/// Position of an episode inside its series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRef {
    pub series_title: String,
    pub season_number: i64,
    pub episode_number: i64,
}

/// Everything needed to insert a new queued item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub url: String,
    pub kind: ItemKind,
    pub episode: Option<EpisodeRef>,
    pub metadata: Metadata,
    pub source_site: Option<String>,
}

/// Full item row.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub url: String,
    pub kind: ItemKind,
    pub episode: Option<EpisodeRef>,
    pub status: ItemStatus,
    pub metadata: Metadata,
    pub source_site: Option<String>,
    /// Resolved manifest URL.
    pub source_url: Option<String>,
    pub progress: f64,
    pub filepath: Option<String>,
    pub pid: Option<u32>,
    /// Detail of the last failure, if any.
    pub message: Option<String>,
    /// Unix milliseconds; FIFO key.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Item {
    /// Title for messages; falls back to the page URL.
    pub fn display_title(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.url)
    }
}

/// One entry of the point-in-time status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub title: Option<String>,
    pub status: ItemStatus,
    pub progress: f64,
    pub filepath: Option<String>,
    pub poster: Option<String>,
    pub message: Option<String>,
}

/// Result of a conditional status update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionOutcome {
    Applied,
    /// The row exists but its current status is not a legal predecessor.
    Rejected(ItemStatus),
    Missing,
}

impl TransitionOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

/// A row carrying a worker pid, as seen by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidRow {
    pub id: ItemId,
    pub pid: u32,
    pub status: ItemStatus,
}
