//! Persistent item store (SQLite via sqlx).
//!
//! Holds every queued movie and episode with its status, progress, output
//! path and worker pid, plus the flat settings table.

pub mod db;
pub mod types;

mod items {
    mod read;
    mod write;
}
mod settings_kv;


pub use db::ItemDb;
pub use types::*;
