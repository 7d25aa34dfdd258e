//! Raw key/value access to the settings table. Typed access lives in `crate::settings`.

use anyhow::Result;
use sqlx::Row;
use std::collections::HashMap;

use super::db::ItemDb;

/// Keys seeded on first run, with their defaults.
pub(crate) const DEFAULT_SETTINGS: [(&str, &str); 5] = [
    ("download_folder", "downloads"),
    ("filename_template", "{title} - {year}"),
    ("concurrent_downloads", "1"),
    ("speed_limit", ""),
    ("admin_password_hash", ""),
];

impl ItemDb {
    /// Insert defaults for missing keys; existing values are never touched.
    pub(crate) async fn seed_default_settings(&self) -> Result<()> {
        for (key, value) in DEFAULT_SETTINGS {
            sqlx::query(r#"INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)"#)
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(r#"SELECT value FROM settings WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>("value")))
    }

    pub async fn all_settings(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query(r#"SELECT key, value FROM settings"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let value: Option<String> = r.get("value");
                (r.get("key"), value.unwrap_or_default())
            })
            .collect())
    }

    /// Insert or replace one setting.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
