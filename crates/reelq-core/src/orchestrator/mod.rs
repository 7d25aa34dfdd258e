//! Operator-facing operations over the queue.
//!
//! `Orchestrator` ties the item store, the metadata resolver, the process
//! manager and the auto-download loop together. Every front end (the CLI
//! today) goes through it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{OpError, OpResult};
use crate::item_db::{
    EpisodeRef, ItemDb, ItemId, ItemKind, NewItem, StatusEntry, TransitionOutcome,
};
use crate::process::{ExeLauncher, ProcessManager, WorkerLauncher};
use crate::resolver::{JsonLdMetadataResolver, Metadata, MetadataResolver, SeriesEpisode};
use crate::scheduler::{AutoDownload, CycleReport, ReconcileReport, Scheduler};
use crate::settings::{Settings, SettingsUpdate};
use crate::state::ItemStatus;

/// Result of a bulk enqueue.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BulkReport {
    pub added: Vec<ItemId>,
    /// URLs that were already queued.
    pub skipped: Vec<String>,
    /// `(url, reason)` for every URL that could not be added.
    pub failed: Vec<(String, String)>,
}

/// Result of enqueueing a whole series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEnqueued {
    pub title: String,
    pub added: usize,
    /// Episodes whose URL was already present.
    pub skipped: usize,
}

pub struct Orchestrator {
    db: ItemDb,
    metadata: Arc<dyn MetadataResolver>,
    scheduler: Arc<Scheduler>,
    auto: AutoDownload,
}

fn normalize_url(raw: &str) -> OpResult<String> {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {
            Ok(trimmed.to_string())
        }
        _ => Err(OpError::InvalidUrl(trimmed.to_string())),
    }
}

fn source_site(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

fn episode_item(series: &str, metadata: &Metadata, ep: &SeriesEpisode) -> NewItem {
    let mut title = format!("{series} S{:02}E{:02}", ep.season_number, ep.episode_number);
    if let Some(name) = ep.title.as_deref().filter(|n| !n.trim().is_empty()) {
        title.push_str(" - ");
        title.push_str(name.trim());
    }
    NewItem {
        url: ep.url.clone(),
        kind: ItemKind::Episode,
        episode: Some(EpisodeRef {
            series_title: series.to_string(),
            season_number: ep.season_number,
            episode_number: ep.episode_number,
        }),
        metadata: Metadata {
            title: Some(title),
            ..metadata.clone()
        },
        source_site: source_site(&ep.url),
    }
}

impl Orchestrator {
    pub fn new(
        db: ItemDb,
        metadata: Arc<dyn MetadataResolver>,
        launcher: Arc<dyn WorkerLauncher>,
        poll_interval: Duration,
    ) -> Self {
        let manager = Arc::new(ProcessManager::new(db.clone(), launcher));
        let scheduler = Arc::new(Scheduler::new(manager));
        let auto = AutoDownload::new(Arc::clone(&scheduler), poll_interval);
        Self {
            db,
            metadata,
            scheduler,
            auto,
        }
    }

    /// Production wiring: JSON-LD metadata and `<exe> worker <id>` workers.
    pub fn from_config(db: ItemDb, cfg: &crate::config::ReelqConfig) -> std::io::Result<Self> {
        let launcher = ExeLauncher::worker(cfg.worker_program.clone())?;
        Ok(Self::new(
            db,
            Arc::new(JsonLdMetadataResolver::from_config(cfg)),
            Arc::new(launcher),
            Duration::from_secs(cfg.poll_interval_secs),
        ))
    }

    pub fn db(&self) -> &ItemDb {
        &self.db
    }

    fn manager(&self) -> &ProcessManager {
        self.scheduler.manager()
    }

    /// Queue a movie page. Metadata is fetched before the row is written.
    pub async fn enqueue(&self, url: &str) -> OpResult<ItemId> {
        let url = normalize_url(url)?;
        if self.db.find_by_url(&url).await?.is_some() {
            return Err(OpError::AlreadyQueued(url));
        }

        let metadata = self.metadata.resolve_metadata(&url).await?;
        let item = NewItem {
            source_site: source_site(&url),
            url: url.clone(),
            kind: ItemKind::Movie,
            episode: None,
            metadata,
        };
        // Another enqueue of the same URL may have won since the lookup.
        let id = self
            .db
            .add_item(&item)
            .await?
            .ok_or(OpError::AlreadyQueued(url))?;
        tracing::info!(item_id = id, url = %item.url, "item queued");
        Ok(id)
    }

    /// Queue several pages in order. One bad URL does not stop the rest.
    pub async fn enqueue_many<S: AsRef<str>>(&self, urls: &[S]) -> BulkReport {
        let mut report = BulkReport::default();
        for raw in urls {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }
            match self.enqueue(raw).await {
                Ok(id) => report.added.push(id),
                Err(OpError::AlreadyQueued(url)) => report.skipped.push(url),
                Err(e) => {
                    tracing::warn!(url = raw, "bulk enqueue failed: {}", e);
                    report.failed.push((raw.trim().to_string(), e.to_string()));
                }
            }
        }
        report
    }

    /// Queue every episode of a series page. Episodes already present are skipped.
    pub async fn enqueue_series(&self, url: &str) -> OpResult<SeriesEnqueued> {
        let url = normalize_url(url)?;
        let listing = self.metadata.resolve_series(&url).await?;

        let mut added = 0;
        let mut skipped = 0;
        for ep in &listing.episodes {
            let item = episode_item(&listing.title, &listing.metadata, ep);
            match self.db.add_item(&item).await? {
                Some(_) => added += 1,
                None => skipped += 1,
            }
        }
        tracing::info!(series = %listing.title, added, skipped, "series queued");
        Ok(SeriesEnqueued {
            title: listing.title,
            added,
            skipped,
        })
    }

    /// Start a worker now, regardless of the concurrency limit.
    pub async fn start(&self, id: ItemId) -> OpResult<String> {
        self.manager().start(id).await
    }

    pub async fn stop(&self, id: ItemId) -> OpResult<ItemStatus> {
        self.manager().stop(id).await
    }

    /// Put a paused, failed or completed item back in the queue.
    pub async fn requeue(&self, id: ItemId) -> OpResult<()> {
        match self.db.requeue(id).await? {
            TransitionOutcome::Applied => {
                tracing::info!(item_id = id, "item requeued");
                Ok(())
            }
            TransitionOutcome::Rejected(from) => Err(OpError::InvalidTransition {
                id,
                from,
                to: ItemStatus::Queued,
            }),
            TransitionOutcome::Missing => Err(OpError::NotFound(id)),
        }
    }

    /// Remove an item's record, stopping its worker first. The file on disk is kept.
    pub async fn delete_record(&self, id: ItemId) -> OpResult<String> {
        let item = self.db.get_item(id).await?.ok_or(OpError::NotFound(id))?;
        if item.pid.is_some() {
            match self.manager().stop(id).await {
                Ok(_) | Err(OpError::NotRunning(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.db.remove_item(id).await?;
        tracing::info!(item_id = id, "item record deleted");
        Ok(item.display_title().to_string())
    }

    /// Delete the downloaded file and clear `filepath`. The record stays.
    pub async fn delete_file(&self, id: ItemId) -> OpResult<PathBuf> {
        let item = self.db.get_item(id).await?.ok_or(OpError::NotFound(id))?;
        let Some(path) = item.filepath.map(PathBuf::from) else {
            return Err(OpError::NoFile(id));
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.db.clear_filepath(id).await?;
                tracing::info!(item_id = id, file = %path.display(), "file deleted");
                Ok(path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.db.clear_filepath(id).await?;
                Err(OpError::NoFile(id))
            }
            Err(e) => Err(OpError::Store(
                anyhow::Error::new(e).context(format!("delete {}", path.display())),
            )),
        }
    }

    /// Requeue every paused or failed episode of a series. Returns how many moved.
    pub async fn requeue_series(&self, series_title: &str) -> OpResult<u64> {
        if self.db.list_series_items(series_title).await?.is_empty() {
            return Err(OpError::SeriesNotFound(series_title.to_string()));
        }
        let n = self.db.requeue_series(series_title).await?;
        tracing::info!(series = series_title, requeued = n, "series requeued");
        Ok(n)
    }

    /// Delete every episode record of a series, stopping running ones first.
    pub async fn delete_series(&self, series_title: &str) -> OpResult<usize> {
        let items = self.db.list_series_items(series_title).await?;
        if items.is_empty() {
            return Err(OpError::SeriesNotFound(series_title.to_string()));
        }
        let mut removed = 0;
        for item in items {
            match self.delete_record(item.id).await {
                Ok(_) => removed += 1,
                // Deleted concurrently.
                Err(OpError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    pub async fn status_snapshot(&self) -> OpResult<BTreeMap<ItemId, StatusEntry>> {
        Ok(self.db.status_snapshot().await?)
    }

    /// Returns the previous value.
    pub async fn set_auto_download(&self, enabled: bool) -> bool {
        self.auto.set_enabled(enabled).await
    }

    pub async fn auto_download_enabled(&self) -> bool {
        self.auto.is_enabled().await
    }

    pub async fn settings(&self) -> OpResult<Settings> {
        Ok(Settings::load(&self.db).await?)
    }

    /// Validate and store the given settings, then return the new values.
    pub async fn update_settings(&self, update: &SettingsUpdate) -> OpResult<Settings> {
        update.apply(&self.db).await?;
        self.settings().await
    }

    /// One admission cycle: reap, then fill free slots in FIFO order.
    pub async fn run_cycle(&self) -> OpResult<CycleReport> {
        Ok(self.scheduler.run_cycle().await?)
    }

    /// Reap and adopt workers without starting new ones.
    pub async fn reconcile(&self) -> OpResult<ReconcileReport> {
        Ok(self.scheduler.reconcile().await?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::item_db::db::open_memory;
    use crate::resolver::{MetadataError, SeriesListing};
    use crate::state::ErrorKind;
    use async_trait::async_trait;

    struct FakeMetadata;

    #[async_trait]
    impl MetadataResolver for FakeMetadata {
        async fn resolve_metadata(&self, url: &str) -> Result<Metadata, MetadataError> {
            if url.contains("broken") {
                return Err(MetadataError::Http(500));
            }
            let title = url.rsplit('/').next().unwrap_or("untitled").to_string();
            Ok(Metadata {
                title: Some(title),
                year: Some("2021".to_string()),
                ..Default::default()
            })
        }

        async fn resolve_series(&self, _url: &str) -> Result<SeriesListing, MetadataError> {
            let episodes = (1..=3)
                .map(|n| SeriesEpisode {
                    season_number: 1,
                    episode_number: n,
                    title: (n == 1).then(|| "Pilot".to_string()),
                    url: format!("https://example.com/show/s1e{n}"),
                })
                .collect();
            Ok(SeriesListing {
                title: "Show".to_string(),
                metadata: Metadata {
                    genre: Some("Drama".to_string()),
                    ..Default::default()
                },
                episodes,
            })
        }
    }

    fn sh(script: &str) -> Arc<dyn WorkerLauncher> {
        Arc::new(ExeLauncher::new("sh", vec!["-c".into(), script.into()]))
    }

    async fn orchestrator(script: &str) -> Orchestrator {
        let db = open_memory().await.unwrap();
        Orchestrator::new(db, Arc::new(FakeMetadata), sh(script), Duration::from_millis(50))
    }

    async fn reap_until(orch: &Orchestrator, id: ItemId) {
        for _ in 0..200 {
            if orch.reconcile().await.unwrap().reaped.contains(&id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("worker for item {id} was never reaped");
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let orch = orchestrator("sleep 30").await;
        let id = orch.enqueue("https://example.com/film/dune").await.unwrap();
        let err = orch
            .enqueue("  https://example.com/film/dune ")
            .await
            .unwrap_err();
        assert!(matches!(err, OpError::AlreadyQueued(_)));
        assert_eq!(orch.status_snapshot().await.unwrap().len(), 1);

        let item = orch.db().get_item(id).await.unwrap().unwrap();
        assert_eq!(item.metadata.title.as_deref(), Some("dune"));
        assert_eq!(item.source_site.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn enqueue_rejects_bad_urls_and_metadata_failures() {
        let orch = orchestrator("sleep 30").await;
        assert!(matches!(
            orch.enqueue("ftp://example.com/x").await,
            Err(OpError::InvalidUrl(_))
        ));
        assert!(matches!(
            orch.enqueue("https://example.com/broken").await,
            Err(OpError::Metadata(MetadataError::Http(500)))
        ));
        assert!(orch.status_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enqueue_many_reports_each_url() {
        let orch = orchestrator("sleep 30").await;
        let report = orch
            .enqueue_many(&[
                "https://example.com/a",
                "",
                "https://example.com/a",
                "https://example.com/broken",
                "https://example.com/b",
            ])
            .await;
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.skipped, vec!["https://example.com/a".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "https://example.com/broken");
    }

    #[tokio::test]
    async fn series_enqueue_requeue_and_delete() {
        let orch = orchestrator("sleep 30").await;
        let first = orch
            .enqueue_series("https://example.com/show")
            .await
            .unwrap();
        assert_eq!(first.title, "Show");
        assert_eq!(first.added, 3);
        let again = orch
            .enqueue_series("https://example.com/show")
            .await
            .unwrap();
        assert_eq!((again.added, again.skipped), (0, 3));

        let items = orch.db().list_series_items("Show").await.unwrap();
        assert_eq!(items[0].metadata.title.as_deref(), Some("Show S01E01 - Pilot"));
        assert_eq!(items[1].metadata.title.as_deref(), Some("Show S01E02"));
        assert_eq!(items[1].metadata.genre.as_deref(), Some("Drama"));

        // Queued episodes are not touched by a series requeue.
        assert_eq!(orch.requeue_series("Show").await.unwrap(), 0);
        assert!(matches!(
            orch.requeue_series("Nope").await,
            Err(OpError::SeriesNotFound(_))
        ));

        orch.start(items[0].id).await.unwrap();
        assert_eq!(orch.delete_series("Show").await.unwrap(), 3);
        assert_eq!(orch.manager().running_count().await, 0);
        assert!(orch.status_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cycle_starts_oldest_first_within_capacity() {
        let orch = orchestrator("sleep 30").await;
        let a = orch.enqueue("https://example.com/a").await.unwrap();
        let b = orch.enqueue("https://example.com/b").await.unwrap();
        let c = orch.enqueue("https://example.com/c").await.unwrap();
        orch.db().set_created_at(a, 3_000).await.unwrap();
        orch.db().set_created_at(b, 1_000).await.unwrap();
        orch.db().set_created_at(c, 2_000).await.unwrap();

        orch.update_settings(&SettingsUpdate {
            concurrent_downloads: Some("2".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.capacity, 2);
        assert_eq!(report.started, vec![b, c]);

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.capacity, 0);
        assert!(report.started.is_empty());

        for id in [b, c] {
            let item = orch.db().get_item(id).await.unwrap().unwrap();
            assert_eq!(item.status, ItemStatus::ResolvingSource);
            assert!(item.pid.is_some());
            assert_eq!(orch.stop(id).await.unwrap(), ItemStatus::Paused);
        }
        let a_item = orch.db().get_item(a).await.unwrap().unwrap();
        assert_eq!(a_item.status, ItemStatus::Queued);
    }

    #[tokio::test]
    async fn next_item_starts_after_previous_is_reaped() {
        let orch = orchestrator("sleep 0.2").await;
        let a = orch.enqueue("https://example.com/a").await.unwrap();
        let b = orch.enqueue("https://example.com/b").await.unwrap();
        orch.db().set_created_at(a, 1_000).await.unwrap();
        orch.db().set_created_at(b, 2_000).await.unwrap();

        assert_eq!(orch.run_cycle().await.unwrap().started, vec![a]);
        reap_until(&orch, a).await;
        // The fake worker never wrote a terminal status.
        let lost = orch.db().get_item(a).await.unwrap().unwrap();
        assert_eq!(lost.status, ItemStatus::Error(ErrorKind::WorkerLost));
        assert!(lost.pid.is_none());

        assert_eq!(orch.run_cycle().await.unwrap().started, vec![b]);
        orch.stop(b).await.unwrap();
    }

    /// Every item's `pid` column matches what the process table holds for it.
    async fn assert_pids_mirror_table(orch: &Orchestrator) {
        let table = orch.manager().lock_table().await;
        for item in orch.db().list_items().await.unwrap() {
            assert_eq!(item.pid, table.pid_for_item(item.id), "item {}", item.id);
        }
    }

    #[tokio::test]
    async fn reconcile_adopts_live_worker_from_store() {
        use std::os::unix::process::CommandExt;

        let orch = orchestrator("sleep 30").await;
        let id = orch.enqueue("https://example.com/a").await.unwrap();
        let mut other = std::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = other.id();
        assert!(orch.db().mark_started(id).await.unwrap().is_applied());
        orch.db().set_pid(id, pid).await.unwrap();

        let report = orch.reconcile().await.unwrap();
        assert_eq!(report.adopted, vec![id]);
        assert!(report.reaped.is_empty() && report.lost.is_empty());
        assert!(orch.manager().is_tracked(id).await);
        assert_pids_mirror_table(&orch).await;

        // A second pass finds nothing new.
        assert_eq!(orch.reconcile().await.unwrap(), ReconcileReport::default());

        assert_eq!(orch.stop(id).await.unwrap(), ItemStatus::Paused);
        assert!(!other.wait().unwrap().success());
        assert_pids_mirror_table(&orch).await;
    }

    #[tokio::test]
    async fn reconcile_marks_dead_store_pid_lost() {
        let orch = orchestrator("sleep 30").await;
        let id = orch.enqueue("https://example.com/a").await.unwrap();
        let mut gone = std::process::Command::new("true").spawn().unwrap();
        let pid = gone.id();
        gone.wait().unwrap();
        assert!(orch.db().mark_started(id).await.unwrap().is_applied());
        orch.db().set_pid(id, pid).await.unwrap();

        let report = orch.reconcile().await.unwrap();
        assert_eq!(report.reaped, vec![id]);
        assert_eq!(report.lost, vec![id]);
        let item = orch.db().get_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Error(ErrorKind::WorkerLost));
        assert!(item.pid.is_none());
        assert_pids_mirror_table(&orch).await;
    }

    #[tokio::test]
    async fn reconcile_fails_only_stale_unowned_claims() {
        let orch = orchestrator("sleep 30").await;
        let stale = orch.enqueue("https://example.com/stale").await.unwrap();
        let fresh = orch.enqueue("https://example.com/fresh").await.unwrap();
        for id in [stale, fresh] {
            assert!(orch.db().mark_started(id).await.unwrap().is_applied());
        }
        let long_ago = crate::item_db::db::unix_millis() - 5 * 60 * 1000;
        orch.db().set_updated_at(stale, long_ago).await.unwrap();

        let report = orch.reconcile().await.unwrap();
        assert_eq!(report.lost, vec![stale]);
        assert!(report.reaped.is_empty());

        let item = orch.db().get_item(stale).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Error(ErrorKind::WorkerLost));
        let item = orch.db().get_item(fresh).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::ResolvingSource);
        assert!(item.pid.is_none());
        assert_pids_mirror_table(&orch).await;
    }

    #[tokio::test]
    async fn pids_mirror_table_across_start_and_reap() {
        let orch = orchestrator("sleep 0.2").await;
        let a = orch.enqueue("https://example.com/a").await.unwrap();
        let b = orch.enqueue("https://example.com/b").await.unwrap();
        orch.start(a).await.unwrap();
        assert_pids_mirror_table(&orch).await;

        reap_until(&orch, a).await;
        assert_pids_mirror_table(&orch).await;
        assert!(!orch.manager().is_tracked(a).await);

        orch.start(b).await.unwrap();
        assert_pids_mirror_table(&orch).await;
        orch.stop(b).await.unwrap();
        assert_pids_mirror_table(&orch).await;
    }

    #[tokio::test]
    async fn stop_without_worker_is_not_running() {
        let orch = orchestrator("sleep 30").await;
        let id = orch.enqueue("https://example.com/a").await.unwrap();
        assert!(matches!(orch.stop(id).await, Err(OpError::NotRunning(_))));
        let item = orch.db().get_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Queued);
        assert!(matches!(orch.stop(9_999).await, Err(OpError::NotFound(9_999))));
    }

    #[tokio::test]
    async fn start_twice_is_already_running_then_requeue_after_stop() {
        let orch = orchestrator("sleep 30").await;
        let id = orch.enqueue("https://example.com/a").await.unwrap();
        assert_eq!(orch.start(id).await.unwrap(), "a");
        assert!(matches!(
            orch.start(id).await,
            Err(OpError::AlreadyRunning { .. })
        ));
        assert!(matches!(
            orch.requeue(id).await,
            Err(OpError::InvalidTransition {
                from: ItemStatus::ResolvingSource,
                ..
            })
        ));

        assert_eq!(orch.stop(id).await.unwrap(), ItemStatus::Paused);
        assert!(!orch.manager().is_tracked(id).await);
        orch.requeue(id).await.unwrap();
        let item = orch.db().get_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Queued);
        assert!(item.pid.is_none());
    }

    #[tokio::test]
    async fn delete_record_stops_running_worker() {
        let orch = orchestrator("sleep 30").await;
        let id = orch.enqueue("https://example.com/a").await.unwrap();
        orch.start(id).await.unwrap();
        assert!(orch.manager().is_tracked(id).await);

        assert_eq!(orch.delete_record(id).await.unwrap(), "a");
        assert!(!orch.manager().is_tracked(id).await);
        assert!(orch.db().get_item(id).await.unwrap().is_none());
        assert!(matches!(
            orch.delete_record(id).await,
            Err(OpError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_file_removes_file_and_clears_path() {
        let orch = orchestrator("sleep 30").await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a - 2021.mp4");
        std::fs::write(&file, b"video").unwrap();

        let id = orch.enqueue("https://example.com/a").await.unwrap();
        assert!(orch.db().mark_started(id).await.unwrap().is_applied());
        orch.db().mark_downloading(id, "https://cdn/x.m3u8").await.unwrap();
        orch.db()
            .mark_completed(id, &file.to_string_lossy())
            .await
            .unwrap();

        assert_eq!(orch.delete_file(id).await.unwrap(), file);
        assert!(!file.exists());
        let item = orch.db().get_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Completed);
        assert!(item.filepath.is_none());
        assert!(matches!(orch.delete_file(id).await, Err(OpError::NoFile(_))));
    }

    #[tokio::test]
    async fn auto_download_flag_round_trip() {
        let orch = orchestrator("sleep 30").await;
        assert!(!orch.auto_download_enabled().await);
        assert!(!orch.set_auto_download(true).await);
        assert!(orch.auto_download_enabled().await);
        assert!(orch.set_auto_download(false).await);
        assert!(!orch.auto_download_enabled().await);
    }

    #[tokio::test]
    async fn auto_download_loop_starts_queued_items() {
        let orch = orchestrator("sleep 30").await;
        let id = orch.enqueue("https://example.com/a").await.unwrap();
        orch.set_auto_download(true).await;

        let mut started = false;
        for _ in 0..100 {
            if orch.manager().is_tracked(id).await {
                started = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        orch.set_auto_download(false).await;
        assert!(started);
        orch.stop(id).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_settings_update_changes_nothing() {
        let orch = orchestrator("sleep 30").await;
        let err = orch
            .update_settings(&SettingsUpdate {
                download_folder: Some("/tmp/films".to_string()),
                concurrent_downloads: Some("zero".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidSetting { .. }));
        assert_eq!(orch.settings().await.unwrap(), Settings::default());
    }
}
