//! Metadata from schema.org JSON-LD blocks (`Movie`, `TVSeries`).
//!
//! Pages are fetched with the curl crate (libcurl) on a blocking thread.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

use super::{Metadata, MetadataError, MetadataResolver, SeriesEpisode, SeriesListing};

/// Pages larger than this are cut off; JSON-LD sits in `<head>`.
const MAX_PAGE_BYTES: usize = 4 * 1024 * 1024;

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[type]").unwrap());

pub struct JsonLdMetadataResolver {
    user_agent: String,
    timeout: Duration,
}

impl JsonLdMetadataResolver {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &crate::config::ReelqConfig) -> Self {
        Self::new(
            cfg.user_agent.clone(),
            Duration::from_secs(cfg.metadata_timeout_secs),
        )
    }

    async fn fetch(&self, url: &str) -> Result<String, MetadataError> {
        let url = url.to_string();
        let user_agent = self.user_agent.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || fetch_page(&url, &user_agent, timeout))
            .await
            .map_err(|e| MetadataError::Fetch(format!("fetch task join: {e}")))?
    }
}

/// GET a page body. Runs in the current thread.
fn fetch_page(url: &str, user_agent: &str, timeout: Duration) -> Result<String, MetadataError> {
    let curl_err = |e: curl::Error| MetadataError::Fetch(e.to_string());

    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.useragent(user_agent).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(10).map_err(curl_err)?;
    easy.accept_encoding("").map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(15)).map_err(curl_err)?;
    easy.timeout(timeout).map_err(curl_err)?;
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                let room = MAX_PAGE_BYTES.saturating_sub(body.len());
                body.extend_from_slice(&data[..data.len().min(room)]);
                Ok(data.len())
            })
            .map_err(curl_err)?;
        transfer.perform().map_err(curl_err)?;
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(MetadataError::Http(code));
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Every JSON object found in the page's JSON-LD blocks, `@graph` flattened.
fn json_ld_nodes(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let mut nodes = Vec::new();
    for script in document.select(&SCRIPT_SELECTOR) {
        let is_json_ld = script
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"));
        if !is_json_ld {
            continue;
        }
        let raw: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<Value>(raw.trim()) else {
            tracing::debug!("skipping unparseable JSON-LD block");
            continue;
        };
        if let Some(Value::Array(graph)) = data.get("@graph") {
            nodes.extend(graph.iter().cloned());
            continue;
        }
        match data {
            Value::Array(items) => nodes.extend(items),
            obj @ Value::Object(_) => nodes.push(obj),
            _ => {}
        }
    }
    nodes
}

fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(ts)) => ts.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn text(v: Option<&Value>) -> Option<String> {
    let s = match v? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// `"name"` of one person object or a comma-joined list of them.
fn names(v: Option<&Value>) -> Option<String> {
    let joined = match v? {
        Value::Array(items) => items
            .iter()
            .filter_map(|p| text(p.get("name")).or_else(|| text(Some(p))))
            .collect::<Vec<_>>()
            .join(", "),
        other => text(other.get("name")).or_else(|| text(Some(other)))?,
    };
    (!joined.is_empty()).then_some(joined)
}

fn image(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Object(obj) => text(obj.get("url")),
        Value::Array(items) => image(items.first()),
        other => text(Some(other)),
    }
}

fn genre(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|g| text(Some(g)))
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        other => text(Some(other)),
    }
}

fn metadata_from_node(node: &Value) -> Metadata {
    Metadata {
        title: text(node.get("name")),
        year: text(node.get("datePublished").or_else(|| node.get("startDate")))
            .map(|d| d.chars().take(4).collect()),
        genre: genre(node.get("genre")),
        description: text(node.get("description")),
        rating: node
            .get("aggregateRating")
            .and_then(|r| text(r.get("ratingValue"))),
        director: names(node.get("director")),
        cast: names(node.get("actor")),
        poster_url: image(node.get("image")),
    }
}

/// Movie metadata from a page, if it carries a `Movie` JSON-LD node with a name.
pub fn parse_movie_page(html: &str) -> Option<Metadata> {
    json_ld_nodes(html)
        .iter()
        .find(|n| has_type(n, "Movie"))
        .map(metadata_from_node)
        .filter(|m| m.title.is_some())
}

fn int(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Series listing from a `TVSeries` node (`containsSeason[].episode[]`).
pub fn parse_series_page(html: &str) -> Option<SeriesListing> {
    let nodes = json_ld_nodes(html);
    let series = nodes.iter().find(|n| has_type(n, "TVSeries"))?;
    let metadata = metadata_from_node(series);
    let title = metadata.title.clone()?;

    let seasons: Vec<&Value> = match series.get("containsSeason") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    };

    let mut episodes = Vec::new();
    for season in seasons {
        let Some(season_number) = int(season.get("seasonNumber")) else {
            tracing::warn!(series = %title, "season without a number, skipped");
            continue;
        };
        let Some(Value::Array(items)) = season.get("episode") else {
            continue;
        };
        for ep in items {
            let (Some(url), Some(episode_number)) = (text(ep.get("url")), int(ep.get("episodeNumber")))
            else {
                continue;
            };
            episodes.push(SeriesEpisode {
                season_number,
                episode_number,
                title: text(ep.get("name")),
                url,
            });
        }
    }

    Some(SeriesListing {
        title,
        metadata,
        episodes,
    })
}

#[async_trait]
impl MetadataResolver for JsonLdMetadataResolver {
    async fn resolve_metadata(&self, url: &str) -> Result<Metadata, MetadataError> {
        let html = self.fetch(url).await?;
        match parse_movie_page(&html) {
            Some(meta) => {
                tracing::info!(url, title = ?meta.title, "metadata resolved from JSON-LD");
                Ok(meta)
            }
            None => {
                tracing::warn!(url, "no Movie JSON-LD on page");
                Err(MetadataError::NotFound)
            }
        }
    }

    async fn resolve_series(&self, url: &str) -> Result<SeriesListing, MetadataError> {
        let html = self.fetch(url).await?;
        let listing = parse_series_page(&html).ok_or(MetadataError::NotFound)?;
        tracing::info!(
            url,
            series = %listing.title,
            episodes = listing.episodes.len(),
            "series listing resolved"
        );
        Ok(listing)
    }
}
