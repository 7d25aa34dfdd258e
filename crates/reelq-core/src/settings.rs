//! Typed view over the settings table.
//!
//! Values are read fresh by every scheduling cycle and every worker, so an
//! update takes effect without restarting anything.

use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::error::{OpError, OpResult};
use crate::item_db::ItemDb;

pub const DOWNLOAD_FOLDER: &str = "download_folder";
pub const FILENAME_TEMPLATE: &str = "filename_template";
pub const CONCURRENT_DOWNLOADS: &str = "concurrent_downloads";
pub const SPEED_LIMIT: &str = "speed_limit";
pub const ADMIN_PASSWORD_HASH: &str = "admin_password_hash";

/// Environment variable synced into `admin_password_hash` at start-up.
pub const ADMIN_HASH_ENV: &str = "REELQ_ADMIN_PASSWORD_HASH";

const DEFAULT_TEMPLATE: &str = "{title} - {year}";

static SPEED_LIMIT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?[KMG]?$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub download_folder: PathBuf,
    pub filename_template: String,
    /// Always at least 1.
    pub concurrent_downloads: usize,
    /// `None` when unlimited.
    pub speed_limit: Option<String>,
    #[serde(skip)]
    pub admin_password_hash: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_folder: PathBuf::from("downloads"),
            filename_template: DEFAULT_TEMPLATE.to_string(),
            concurrent_downloads: 1,
            speed_limit: None,
            admin_password_hash: None,
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a stored concurrency value; anything that is not a positive integer becomes 1.
pub fn parse_concurrency(raw: Option<&str>) -> usize {
    match raw.and_then(|s| s.trim().parse::<usize>().ok()) {
        Some(n) if n > 0 => n,
        _ => 1,
    }
}

impl Settings {
    /// Load current settings, substituting defaults for missing or unusable values.
    pub async fn load(db: &ItemDb) -> anyhow::Result<Self> {
        let mut all = db.all_settings().await?;
        let defaults = Settings::default();

        let concurrent_downloads = parse_concurrency(all.get(CONCURRENT_DOWNLOADS).map(String::as_str));
        if all
            .get(CONCURRENT_DOWNLOADS)
            .is_some_and(|raw| raw.trim().parse::<usize>().ok() != Some(concurrent_downloads))
        {
            tracing::warn!("stored concurrent_downloads is not a positive integer, using 1");
        }

        Ok(Self {
            download_folder: non_empty(all.remove(DOWNLOAD_FOLDER))
                .map(PathBuf::from)
                .unwrap_or(defaults.download_folder),
            filename_template: non_empty(all.remove(FILENAME_TEMPLATE))
                .unwrap_or(defaults.filename_template),
            concurrent_downloads,
            speed_limit: non_empty(all.remove(SPEED_LIMIT)),
            admin_password_hash: non_empty(all.remove(ADMIN_PASSWORD_HASH)),
        })
    }
}

/// Operator changes to settings. `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub download_folder: Option<String>,
    pub filename_template: Option<String>,
    pub concurrent_downloads: Option<String>,
    /// Empty string clears the limit.
    pub speed_limit: Option<String>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.download_folder.is_none()
            && self.filename_template.is_none()
            && self.concurrent_downloads.is_none()
            && self.speed_limit.is_none()
    }

    /// Validate every field and return the `(key, value)` pairs to store.
    /// Nothing is written when any field is invalid.
    pub fn validate(&self) -> OpResult<Vec<(&'static str, String)>> {
        let mut out = Vec::new();

        if let Some(folder) = &self.download_folder {
            let folder = folder.trim();
            if folder.is_empty() {
                return Err(OpError::InvalidSetting {
                    key: DOWNLOAD_FOLDER,
                    reason: "must not be empty".to_string(),
                });
            }
            out.push((DOWNLOAD_FOLDER, folder.to_string()));
        }

        if let Some(template) = &self.filename_template {
            let template = template.trim();
            if template.is_empty() {
                return Err(OpError::InvalidSetting {
                    key: FILENAME_TEMPLATE,
                    reason: "must not be empty".to_string(),
                });
            }
            out.push((FILENAME_TEMPLATE, template.to_string()));
        }

        if let Some(raw) = &self.concurrent_downloads {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => out.push((CONCURRENT_DOWNLOADS, n.to_string())),
                _ => {
                    return Err(OpError::InvalidSetting {
                        key: CONCURRENT_DOWNLOADS,
                        reason: format!("\"{raw}\" is not a positive integer"),
                    })
                }
            }
        }

        if let Some(raw) = &self.speed_limit {
            let limit = raw.trim();
            if !limit.is_empty() && !SPEED_LIMIT_PATTERN.is_match(limit) {
                return Err(OpError::InvalidSetting {
                    key: SPEED_LIMIT,
                    reason: format!("\"{raw}\" is not a rate such as 500K or 2M"),
                });
            }
            out.push((SPEED_LIMIT, limit.to_string()));
        }

        Ok(out)
    }

    /// Validate then persist.
    pub async fn apply(&self, db: &ItemDb) -> OpResult<()> {
        for (key, value) in self.validate()? {
            db.set_setting(key, &value).await?;
            tracing::info!(key, value = %value, "setting updated");
        }
        Ok(())
    }
}

/// Upsert the admin credential hash from the environment, if set and non-empty.
pub async fn sync_admin_hash_from_env(db: &ItemDb) -> anyhow::Result<bool> {
    let Some(hash) = std::env::var(ADMIN_HASH_ENV)
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
    else {
        return Ok(false);
    };
    if db.get_setting(ADMIN_PASSWORD_HASH).await?.as_deref() == Some(hash.as_str()) {
        return Ok(false);
    }
    db.set_setting(ADMIN_PASSWORD_HASH, &hash).await?;
    tracing::info!("admin password hash synced from {}", ADMIN_HASH_ENV);
    Ok(true)
}
