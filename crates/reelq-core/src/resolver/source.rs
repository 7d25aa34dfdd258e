//! Source resolution through an external helper program.
//!
//! The helper receives the page URL as its last argument and prints one JSON
//! object on stdout:
//!
//! ```json
//! {"manifest_url": "https://cdn/master.m3u8",
//!  "headers": {"Referer": "https://site/"},
//!  "cookies": [{"name": "sid", "value": "abc", "domain": ".site", "secure": true}]}
//! ```
//!
//! A null or empty `manifest_url` means no source was found.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{Cookie, ResolvedSource, SourceError, SourceResolver};
use crate::classify::tail;
use crate::config::SourceResolverConfig;
use crate::process::signal;

#[derive(Debug, Deserialize)]
struct HelperOutput {
    #[serde(default)]
    manifest_url: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    cookies: Vec<Cookie>,
}

/// Parse the helper's stdout into a resolved source.
pub fn parse_helper_output(stdout: &str) -> Result<ResolvedSource, SourceError> {
    let out: HelperOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| SourceError::Failed(format!("helper printed invalid JSON: {e}")))?;
    let manifest_url = out
        .manifest_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| SourceError::Failed("no manifest URL found on page".to_string()))?;
    Ok(ResolvedSource {
        manifest_url,
        headers: out.headers,
        cookies: out.cookies,
    })
}

/// Kills the helper's process group when dropped, so a browser the helper
/// started does not outlive a timeout or a cancelled resolution.
struct HelperGroup(Option<u32>);

impl Drop for HelperGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.0 else { return };
        match signal::kill_group(pgid) {
            Ok(signal::Termination::Signalled) => {
                tracing::debug!(pgid, "killed source helper group");
            }
            Ok(signal::Termination::AlreadyGone) => {}
            Err(e) => tracing::warn!(pgid, "cannot kill source helper group: {}", e),
        }
    }
}

pub struct CommandSourceResolver {
    program: Option<PathBuf>,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSourceResolver {
    pub fn new(program: Option<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &SourceResolverConfig) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.args.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }
}

#[async_trait]
impl SourceResolver for CommandSourceResolver {
    async fn resolve_source(&self, url: &str) -> Result<ResolvedSource, SourceError> {
        let Some(program) = &self.program else {
            return Err(SourceError::Failed(
                "no source resolver program configured".to_string(),
            ));
        };

        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        let child = cmd
            .spawn()
            .map_err(|e| SourceError::Failed(format!("cannot run {}: {e}", program.display())))?;
        let _group = HelperGroup(if cfg!(unix) { child.id() } else { None });

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(|e| SourceError::Failed(format!("helper I/O: {e}")))?,
            Err(_) => {
                tracing::warn!(url, timeout_secs = self.timeout.as_secs(), "source helper timed out");
                return Err(SourceError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Failed(format!(
                "helper exited with {}: {}",
                output.status,
                tail(&stderr, 3)
            )));
        }

        let resolved = parse_helper_output(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(
            url,
            manifest = %resolved.manifest_url,
            headers = resolved.headers.len(),
            cookies = resolved.cookies.len(),
            "source resolved"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_output() {
        let src = parse_helper_output(
            r#"{"manifest_url":"https://cdn/master.m3u8",
                "headers":{"Referer":"https://site/"},
                "cookies":[{"name":"sid","value":"abc","domain":".site","secure":true,"expiry":1700000000}]}"#,
        )
        .unwrap();
        assert_eq!(src.manifest_url, "https://cdn/master.m3u8");
        assert_eq!(src.headers.get("Referer").map(String::as_str), Some("https://site/"));
        assert_eq!(src.cookies.len(), 1);
        assert_eq!(src.cookies[0].path, "/");
        assert_eq!(src.cookies[0].expiry, Some(1_700_000_000));
    }

    #[test]
    fn missing_manifest_is_failure() {
        assert!(matches!(
            parse_helper_output(r#"{"manifest_url":null}"#),
            Err(SourceError::Failed(_))
        ));
        assert!(matches!(
            parse_helper_output(r#"{"manifest_url":"  "}"#),
            Err(SourceError::Failed(_))
        ));
        assert!(matches!(parse_helper_output("garbage"), Err(SourceError::Failed(_))));
    }

    #[tokio::test]
    async fn unconfigured_program_fails() {
        let r = CommandSourceResolver::new(None, Vec::new(), Duration::from_secs(1));
        assert!(matches!(
            r.resolve_source("https://x").await,
            Err(SourceError::Failed(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_helper_and_parses_stdout() {
        let r = CommandSourceResolver::new(
            Some(PathBuf::from("sh")),
            vec![
                "-c".to_string(),
                r#"printf '{"manifest_url":"%s/master.m3u8"}' "$0""#.to_string(),
            ],
            Duration::from_secs(10),
        );
        let src = r.resolve_source("https://cdn.example").await.unwrap();
        assert_eq!(src.manifest_url, "https://cdn.example/master.m3u8");
        assert!(src.cookies.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_helper_times_out() {
        let r = CommandSourceResolver::new(
            Some(PathBuf::from("sh")),
            vec!["-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(200),
        );
        assert!(matches!(
            r.resolve_source("https://x").await,
            Err(SourceError::Timeout(_))
        ));
    }

    /// True once `pid` is gone or only a zombie awaiting its new parent.
    #[cfg(target_os = "linux")]
    fn exited(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state == "Z"),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_helper_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("browser.pid");
        let script = format!(
            "sleep 30 >/dev/null 2>&1 & echo $! > '{}'; wait",
            pid_file.display()
        );
        let r = CommandSourceResolver::new(
            Some(PathBuf::from("sh")),
            vec!["-c".to_string(), script],
            Duration::from_millis(300),
        );
        assert!(matches!(
            r.resolve_source("https://x").await,
            Err(SourceError::Timeout(_))
        ));

        let browser: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let mut gone = false;
        for _ in 0..100 {
            if exited(browser) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "helper descendant {browser} survived the timeout");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_helper_reports_stderr() {
        let r = CommandSourceResolver::new(
            Some(PathBuf::from("sh")),
            vec!["-c".to_string(), "echo 'browser crashed' >&2; exit 3".to_string()],
            Duration::from_secs(10),
        );
        match r.resolve_source("https://x").await {
            Err(SourceError::Failed(msg)) => assert!(msg.contains("browser crashed"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
