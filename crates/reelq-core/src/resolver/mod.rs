//! Resolver interfaces: page metadata and real source streams.
//!
//! The orchestrator only depends on these traits and does not know how a
//! particular site is scraped or how a manifest URL is discovered.

pub mod metadata;
pub mod source;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use metadata::JsonLdMetadataResolver;
pub use source::CommandSourceResolver;

/// Descriptive, best-effort fields of a movie or episode page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    /// IMDb-style score, kept as text.
    pub rating: Option<String>,
    pub director: Option<String>,
    pub cast: Option<String>,
    pub poster_url: Option<String>,
}

/// One episode found on a series page.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEpisode {
    pub season_number: i64,
    pub episode_number: i64,
    pub title: Option<String>,
    pub url: String,
}

/// Everything listed on a series page.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesListing {
    pub title: String,
    pub metadata: Metadata,
    pub episodes: Vec<SeriesEpisode>,
}

/// Browser cookie as reported by the source resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    /// Unix seconds; `None` for session cookies.
    #[serde(default)]
    pub expiry: Option<i64>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// A resolved stream: manifest URL plus what the download tool must send with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedSource {
    pub manifest_url: String,
    pub headers: HashMap<String, String>,
    pub cookies: Vec<Cookie>,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("request failed: {0}")]
    Fetch(String),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("no usable metadata on page")]
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source resolution timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("source resolution failed: {0}")]
    Failed(String),
}

/// Turns a page URL into descriptive metadata.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve_metadata(&self, url: &str) -> Result<Metadata, MetadataError>;

    async fn resolve_series(&self, url: &str) -> Result<SeriesListing, MetadataError>;
}

/// Turns a page URL into a playable manifest URL with headers and cookies.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve_source(&self, url: &str) -> Result<ResolvedSource, SourceError>;
}
