//! Operation-level errors. The `Display` text of each variant is the message
//! shown to the operator.

use crate::item_db::ItemId;
use crate::resolver::MetadataError;
use crate::state::ItemStatus;

#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error("item {0} not found")]
    NotFound(ItemId),

    #[error("not a valid http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("{0} is already in the queue")]
    AlreadyQueued(String),

    #[error("download of \"{title}\" is already running")]
    AlreadyRunning { id: ItemId, title: String },

    #[error("item {0} has no running worker")]
    NotRunning(ItemId),

    #[error("item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("no file on disk for item {0} (already deleted?)")]
    NoFile(ItemId),

    #[error("no items found for series \"{0}\"")]
    SeriesNotFound(String),

    #[error("could not fetch metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("invalid value for setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("failed to launch worker: {0}")]
    Launch(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type OpResult<T> = std::result::Result<T, OpError>;
