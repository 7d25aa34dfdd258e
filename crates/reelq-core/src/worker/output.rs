//! Locate the file the download tool produced.

use std::path::{Path, PathBuf};

/// Suffixes of the tool's intermediate files.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".frag"];

/// Find `<dir>/<base_name>.<ext>`, ignoring partial files. When several
/// match, the largest wins.
pub async fn find_output_file(dir: &Path, base_name: &str) -> std::io::Result<Option<PathBuf>> {
    let prefix = format!("{base_name}.");
    let mut best: Option<(u64, PathBuf)> = None;

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(ext) = name.strip_prefix(&prefix) else {
            continue;
        };
        if ext.is_empty() || PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        if best.as_ref().map_or(true, |(size, _)| meta.len() > *size) {
            best = Some((meta.len(), entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}
