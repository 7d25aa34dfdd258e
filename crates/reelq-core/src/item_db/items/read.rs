//! Item read operations: get, list, queue selection, snapshot.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;

use super::super::db::ItemDb;
use super::super::types::{EpisodeRef, Item, ItemId, ItemKind, PidRow, StatusEntry};
use crate::resolver::Metadata;
use crate::state::ItemStatus;

const ITEM_COLUMNS: &str = r#"
    id, url, kind, series_title, season_number, episode_number, status,
    title, year, genre, description, rating, director, cast_members, poster_url,
    source_site, source_url, progress, filepath, pid, message, created_at, updated_at
"#;

fn pid_from_column(pid: Option<i64>) -> Option<u32> {
    pid.and_then(|p| u32::try_from(p).ok())
}

fn item_from_row(row: &SqliteRow) -> Item {
    let kind = ItemKind::from_str(&row.get::<String, _>("kind"));
    let series_title: Option<String> = row.get("series_title");
    let episode = match (kind, series_title) {
        (ItemKind::Episode, Some(series_title)) => Some(EpisodeRef {
            series_title,
            season_number: row.get::<Option<i64>, _>("season_number").unwrap_or(0),
            episode_number: row.get::<Option<i64>, _>("episode_number").unwrap_or(0),
        }),
        _ => None,
    };
    let status_str: String = row.get("status");

    Item {
        id: row.get("id"),
        url: row.get("url"),
        kind,
        episode,
        status: ItemStatus::from_str(&status_str),
        metadata: Metadata {
            title: row.get("title"),
            year: row.get("year"),
            genre: row.get("genre"),
            description: row.get("description"),
            rating: row.get("rating"),
            director: row.get("director"),
            cast: row.get("cast_members"),
            poster_url: row.get("poster_url"),
        },
        source_site: row.get("source_site"),
        source_url: row.get("source_url"),
        progress: row.get("progress"),
        filepath: row.get("filepath"),
        pid: pid_from_column(row.get("pid")),
        message: row.get("message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl ItemDb {
    /// Fetch a single item row.
    pub async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(item_from_row))
    }

    /// Id of the item with this page URL, if present.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<ItemId>> {
        let row = sqlx::query(r#"SELECT id FROM items WHERE url = ?1"#)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    /// List all items, newest first.
    pub async fn list_items(&self) -> Result<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    /// Episodes of one series, in season/episode order.
    pub async fn list_series_items(&self, series_title: &str) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE kind = 'episode' AND series_title = ?1
             ORDER BY season_number ASC, episode_number ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(series_title)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    /// The oldest queued item across all kinds (`created_at`, then id).
    pub async fn next_queued_item(&self) -> Result<Option<ItemId>> {
        let row = sqlx::query(
            r#"
            SELECT id FROM items
            WHERE status = ?1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(ItemStatus::Queued.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("id")))
    }

    /// Every item whose `pid` column is set.
    pub async fn items_with_pid(&self) -> Result<Vec<PidRow>> {
        let rows = sqlx::query(r#"SELECT id, pid, status FROM items WHERE pid IS NOT NULL"#)
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let status_str: String = row.get("status");
            let Some(pid) = pid_from_column(row.get("pid")) else {
                tracing::warn!(item_id = id, "ignoring out-of-range pid column");
                continue;
            };
            out.push(PidRow {
                id,
                pid,
                status: ItemStatus::from_str(&status_str),
            });
        }
        Ok(out)
    }

    /// In-progress items without a pid that have not changed since `cutoff`
    /// (Unix millis): runs whose launcher died between claim and spawn.
    pub async fn stale_unowned_active_items(&self, cutoff: i64) -> Result<Vec<ItemId>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM items
            WHERE pid IS NULL
              AND status IN (?1, ?2)
              AND updated_at < ?3
            "#,
        )
        .bind(ItemStatus::ResolvingSource.as_str())
        .bind(ItemStatus::Downloading.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Read-only, point-in-time view of every item for status displays.
    pub async fn status_snapshot(&self) -> Result<BTreeMap<ItemId, StatusEntry>> {
        let rows = sqlx::query(
            r#"SELECT id, title, status, progress, filepath, poster_url, message FROM items"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = BTreeMap::new();
        for row in rows {
            let status_str: String = row.get("status");
            out.insert(
                row.get("id"),
                StatusEntry {
                    title: row.get("title"),
                    status: ItemStatus::from_str(&status_str),
                    progress: row.get("progress"),
                    filepath: row.get("filepath"),
                    poster: row.get("poster_url"),
                    message: row.get("message"),
                },
            );
        }
        Ok(out)
    }
}
