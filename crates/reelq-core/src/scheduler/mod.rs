//! Admission scheduler and the auto-download loop.
//!
//! Each cycle reconciles the process table with the item store, computes the
//! free capacity from `concurrent_downloads`, and starts the oldest queued
//! items across all kinds until that capacity is used.

mod auto;
mod cycle;
mod reconcile;

pub use auto::AutoDownload;
pub use cycle::{CycleReport, Scheduler};
pub use reconcile::ReconcileReport;
