//! Transient Netscape cookie jar for the download tool.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::item_db::ItemId;
use crate::resolver::Cookie;

/// Path of the jar for one item inside `dir`.
pub fn jar_path(dir: &Path, item_id: ItemId) -> PathBuf {
    dir.join(format!("cookies_{item_id}.txt"))
}

/// Render cookies in Netscape format. Cookies without a name are skipped.
pub fn render_netscape(cookies: &[Cookie]) -> String {
    let mut out = String::from("# Netscape HTTP Cookie File\n");
    for c in cookies.iter().filter(|c| !c.name.is_empty()) {
        let include_subdomains = if c.domain.starts_with('.') { "TRUE" } else { "FALSE" };
        let secure = if c.secure { "TRUE" } else { "FALSE" };
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            c.domain,
            include_subdomains,
            if c.path.is_empty() { "/" } else { c.path.as_str() },
            secure,
            c.expiry.unwrap_or(0).max(0),
            c.name,
            c.value
        ));
    }
    out
}

/// A cookie jar on disk, removed when dropped.
#[derive(Debug)]
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub async fn write(path: PathBuf, cookies: &[Cookie]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Guard first so a failed write still cleans up.
        let jar = CookieJar { path };
        tokio::fs::write(&jar.path, render_netscape(cookies))
            .await
            .with_context(|| format!("write cookie jar {}", jar.path.display()))?;
        Ok(jar)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CookieJar {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "cookie jar removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), "could not remove cookie jar: {}", e),
        }
    }
}
