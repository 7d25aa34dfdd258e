//! `reelq add`, `reelq add-list` and `reelq add-series`.

use anyhow::{Context, Result};
use reelq_core::orchestrator::Orchestrator;
use std::path::Path;

pub async fn run_add(orch: &Orchestrator, url: &str) -> Result<()> {
    let id = orch.enqueue(url).await?;
    let title = orch
        .db()
        .get_item(id)
        .await?
        .map(|item| item.display_title().to_string())
        .unwrap_or_else(|| url.to_string());
    println!("Queued item {id}: {title}");
    Ok(())
}

/// URLs from a list file: one per line, blank lines and `#` comments ignored.
pub(crate) fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub async fn run_add_list(
    orch: &Orchestrator,
    mut urls: Vec<String>,
    file: Option<&Path>,
) -> Result<()> {
    if let Some(path) = file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read URL list {}", path.display()))?;
        urls.extend(parse_url_list(&text));
    }
    if urls.is_empty() {
        anyhow::bail!("no URLs given");
    }

    let report = orch.enqueue_many(urls.as_slice()).await;
    for url in &report.skipped {
        println!("already queued: {url}");
    }
    for (url, reason) in &report.failed {
        println!("failed: {url}: {reason}");
    }
    println!(
        "Added {}, skipped {}, failed {}",
        report.added.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(())
}

pub async fn run_add_series(orch: &Orchestrator, url: &str) -> Result<()> {
    let series = orch.enqueue_series(url).await?;
    println!(
        "Series \"{}\": queued {} episode(s), {} already present",
        series.title, series.added, series.skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_url_list;

    #[test]
    fn url_list_skips_blanks_and_comments() {
        let text = "https://a.example/1\n\n  # later\n  https://b.example/2  \n";
        assert_eq!(
            parse_url_list(text),
            vec!["https://a.example/1".to_string(), "https://b.example/2".to_string()]
        );
    }
}
