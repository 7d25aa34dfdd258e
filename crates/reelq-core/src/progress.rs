//! Progress reporting from the download engine into the item store.
//!
//! The engine sends percentages over a channel; the reporter writes each one
//! to the item's `progress` column. Values are stored as received.

use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::mpsc;

use crate::item_db::{ItemDb, ItemId};

static PROGRESS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[download\]\s+([0-9]+(?:\.[0-9]+)?)%").unwrap());

/// Extract the percentage from a `[download]  42.3% of ...` line.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let caps = PROGRESS_PATTERN.captures(line)?;
    let pct: f64 = caps.get(1)?.as_str().parse().ok()?;
    (0.0..=100.0).contains(&pct).then_some(pct)
}

/// Writes progress updates for one item until the sending side is dropped.
pub struct ProgressReporter {
    db: ItemDb,
    item_id: ItemId,
}

impl ProgressReporter {
    pub fn new(db: ItemDb, item_id: ItemId) -> Self {
        Self { db, item_id }
    }

    /// Consume updates; returns the number written.
    pub async fn run(self, mut rx: mpsc::Receiver<f64>) -> usize {
        let mut written = 0;
        let mut last = None;
        while let Some(pct) = rx.recv().await {
            if last == Some(pct) {
                continue;
            }
            last = Some(pct);
            match self.db.set_progress(self.item_id, pct).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!(item_id = self.item_id, "progress write failed: {e:#}");
                }
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_db::db::open_memory;
    use crate::item_db::{ItemKind, NewItem};

    #[test]
    fn parses_ytdlp_lines() {
        assert_eq!(
            parse_progress_line("[download]  42.3% of ~ 1.20GiB at  3.10MiB/s ETA 05:12"),
            Some(42.3)
        );
        assert_eq!(parse_progress_line("[download] 100% of 12.00MiB"), Some(100.0));
        assert_eq!(parse_progress_line("[download]   0.0% of 1.00KiB"), Some(0.0));
    }

    #[test]
    fn ignores_other_lines() {
        assert_eq!(parse_progress_line("[hlsnative] Downloading m3u8 manifest"), None);
        assert_eq!(parse_progress_line("[download] Destination: Film.mp4"), None);
        assert_eq!(parse_progress_line("[download]  1.2.3% of"), None);
        assert_eq!(parse_progress_line("[download] 250% of"), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[tokio::test]
    async fn reporter_writes_each_update() {
        let db = open_memory().await.unwrap();
        let id = db
            .add_item(&NewItem {
                url: "https://x/progress".to_string(),
                kind: ItemKind::Movie,
                episode: None,
                metadata: Default::default(),
                source_site: None,
            })
            .await
            .unwrap()
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let reporter = tokio::spawn(ProgressReporter::new(db.clone(), id).run(rx));
        for pct in [1.0, 5.5, 5.5, 3.0, 60.0] {
            tx.send(pct).await.unwrap();
        }
        drop(tx);
        let written = reporter.await.unwrap();
        assert_eq!(written, 4);
        // Out-of-order values are stored as received; the last one wins.
        assert_eq!(db.get_item(id).await.unwrap().unwrap().progress, 60.0);
    }
}
