//! Item write operations: add, status transitions, progress, remove.

use anyhow::Result;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::super::db::{unix_millis, ItemDb};
use super::super::types::{ItemId, NewItem, TransitionOutcome};
use crate::state::{ErrorKind, ItemStatus};

/// Column changes applied together with a status change.
/// `Some(None)` writes NULL, `None` leaves the column untouched.
#[derive(Debug, Default)]
struct TransitionFields<'a> {
    pid: Option<Option<u32>>,
    progress: Option<f64>,
    filepath: Option<Option<&'a str>>,
    source_url: Option<&'a str>,
    message: Option<Option<&'a str>>,
}

impl ItemDb {
    /// Insert a new queued item. Returns `None` if an item with the same URL exists.
    pub async fn add_item(&self, item: &NewItem) -> Result<Option<ItemId>> {
        let now = unix_millis();
        let (series_title, season_number, episode_number) = match &item.episode {
            Some(ep) => (
                Some(ep.series_title.as_str()),
                Some(ep.season_number),
                Some(ep.episode_number),
            ),
            None => (None, None, None),
        };
        let meta = &item.metadata;

        let result = sqlx::query(
            r#"
            INSERT INTO items (
                url, kind, series_title, season_number, episode_number, status,
                title, year, genre, description, rating, director, cast_members,
                poster_url, source_site, progress, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                      ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, 0.0, ?16, ?17)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(&item.url)
        .bind(item.kind.as_str())
        .bind(series_title)
        .bind(season_number)
        .bind(episode_number)
        .bind(ItemStatus::Queued.as_str())
        .bind(&meta.title)
        .bind(&meta.year)
        .bind(&meta.genre)
        .bind(&meta.description)
        .bind(&meta.rating)
        .bind(&meta.director)
        .bind(&meta.cast)
        .bind(&meta.poster_url)
        .bind(&item.source_site)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    /// Apply `to` only if the current status is a legal predecessor of it.
    async fn transition(
        &self,
        id: ItemId,
        to: ItemStatus,
        fields: TransitionFields<'_>,
    ) -> Result<TransitionOutcome> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE items SET status = ");
        qb.push_bind(to.as_str());
        if let Some(pid) = fields.pid {
            qb.push(", pid = ").push_bind(pid.map(i64::from));
        }
        if let Some(progress) = fields.progress {
            qb.push(", progress = ").push_bind(progress);
        }
        if let Some(filepath) = fields.filepath {
            qb.push(", filepath = ").push_bind(filepath);
        }
        if let Some(source_url) = fields.source_url {
            qb.push(", source_url = ").push_bind(source_url);
        }
        if let Some(message) = fields.message {
            qb.push(", message = ").push_bind(message);
        }
        qb.push(", updated_at = ").push_bind(unix_millis());
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status IN (");
        {
            let mut allowed = qb.separated(", ");
            for from in to.predecessors() {
                allowed.push_bind(from.as_str());
            }
        }
        qb.push(")");

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }

        let row = sqlx::query(r#"SELECT status FROM items WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => {
                let current: String = row.get("status");
                TransitionOutcome::Rejected(ItemStatus::from_str(&current))
            }
            None => TransitionOutcome::Missing,
        })
    }

    /// Claim an item for a new run, before its worker is launched.
    /// Resets per-run fields; the pid is recorded by `set_pid` once known.
    pub async fn mark_started(&self, id: ItemId) -> Result<TransitionOutcome> {
        self.transition(
            id,
            ItemStatus::ResolvingSource,
            TransitionFields {
                pid: Some(None),
                progress: Some(0.0),
                filepath: Some(None),
                message: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Source resolved; the engine is about to run.
    pub async fn mark_downloading(&self, id: ItemId, source_url: &str) -> Result<TransitionOutcome> {
        self.transition(
            id,
            ItemStatus::Downloading,
            TransitionFields {
                source_url: Some(source_url),
                ..Default::default()
            },
        )
        .await
    }

    /// Engine succeeded and the output file exists.
    pub async fn mark_completed(&self, id: ItemId, filepath: &str) -> Result<TransitionOutcome> {
        self.transition(
            id,
            ItemStatus::Completed,
            TransitionFields {
                progress: Some(100.0),
                filepath: Some(Some(filepath)),
                message: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Record a failure. `progress` is only written when given.
    pub async fn mark_failed(
        &self,
        id: ItemId,
        kind: ErrorKind,
        message: &str,
        progress: Option<f64>,
    ) -> Result<TransitionOutcome> {
        self.transition(
            id,
            ItemStatus::Error(kind),
            TransitionFields {
                progress,
                message: Some(Some(message)),
                ..Default::default()
            },
        )
        .await
    }

    /// Explicit stop: clear the pid and park the item.
    pub async fn mark_paused(&self, id: ItemId) -> Result<TransitionOutcome> {
        self.transition(
            id,
            ItemStatus::Paused,
            TransitionFields {
                pid: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Operator re-queue from Paused, Error or Completed.
    /// A completed item gives up its `filepath`; the file itself stays on disk.
    pub async fn requeue(&self, id: ItemId) -> Result<TransitionOutcome> {
        self.transition(
            id,
            ItemStatus::Queued,
            TransitionFields {
                progress: Some(0.0),
                filepath: Some(None),
                message: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Re-queue every paused or failed episode of a series. Returns the number re-queued.
    pub async fn requeue_series(&self, series_title: &str) -> Result<u64> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE items SET status = ");
        qb.push_bind(ItemStatus::Queued.as_str());
        qb.push(", progress = 0.0, message = NULL, updated_at = ")
            .push_bind(unix_millis());
        qb.push(" WHERE kind = 'episode' AND series_title = ")
            .push_bind(series_title);
        qb.push(" AND status IN (");
        {
            let mut allowed = qb.separated(", ");
            for from in ItemStatus::Queued.predecessors() {
                if from != ItemStatus::Completed {
                    allowed.push_bind(from.as_str());
                }
            }
        }
        qb.push(")");
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Write a progress percentage. Out-of-order values are accepted as-is.
    pub async fn set_progress(&self, id: ItemId, progress: f64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE items
            SET progress = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(progress)
        .bind(unix_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mirror a worker pid that is now in the process table.
    pub async fn set_pid(&self, id: ItemId, pid: u32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE items
            SET pid = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(i64::from(pid))
        .bind(unix_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear the pid mirror once the process is known to be gone.
    pub async fn clear_pid(&self, id: ItemId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE items
            SET pid = NULL,
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(unix_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear `filepath` after the file was removed from disk.
    pub async fn clear_filepath(&self, id: ItemId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE items
            SET filepath = NULL,
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(unix_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Permanently remove an item row.
    ///
    /// Stopping its worker is handled separately by higher layers.
    pub async fn remove_item(&self, id: ItemId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM items
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn set_updated_at(&self, id: ItemId, updated_at: i64) -> Result<()> {
        sqlx::query(r#"UPDATE items SET updated_at = ?1 WHERE id = ?2"#)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn set_created_at(&self, id: ItemId, created_at: i64) -> Result<()> {
        sqlx::query(r#"UPDATE items SET created_at = ?1 WHERE id = ?2"#)
            .bind(created_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
