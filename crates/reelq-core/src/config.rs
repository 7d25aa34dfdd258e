use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// External helper that turns a page URL into a manifest URL, headers and cookies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResolverConfig {
    /// Helper program; receives the page URL as its last argument and prints JSON.
    /// When unset, every resolution fails and items end in `error:no_source`.
    #[serde(default)]
    pub program: Option<PathBuf>,
    /// Extra arguments placed before the page URL.
    #[serde(default)]
    pub args: Vec<String>,
    /// Upper bound on one resolution, including browser start-up.
    pub timeout_secs: u64,
}

impl Default for SourceResolverConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout_secs: 60,
        }
    }
}

/// Download tool invocation (yt-dlp compatible command line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub program: PathBuf,
    /// Extra arguments appended before the output template.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            extra_args: Vec::new(),
        }
    }
}

/// Bootstrap configuration loaded from `~/.config/reelq/config.toml`.
///
/// Runtime settings (download folder, template, concurrency, speed limit) live
/// in the settings table instead so they can change without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelqConfig {
    /// Seconds between two auto-download scheduling cycles.
    pub poll_interval_secs: u64,
    /// User-Agent sent when fetching metadata pages.
    pub user_agent: String,
    /// Timeout for one metadata page fetch.
    pub metadata_timeout_secs: u64,
    /// Program launched as a worker (`<program> worker <id>`). Defaults to the running executable.
    #[serde(default)]
    pub worker_program: Option<PathBuf>,
    #[serde(default)]
    pub source_resolver: SourceResolverConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for ReelqConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            metadata_timeout_secs: 20,
            worker_program: None,
            source_resolver: SourceResolverConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("reelq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// State directory shared by the database, the log file and transient cookie jars.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("reelq")?;
    Ok(xdg_dirs.get_state_home().join("reelq"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ReelqConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

pub fn load_or_init_at(path: &Path) -> Result<ReelqConfig> {
    if !path.exists() {
        let default_cfg = ReelqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: ReelqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
