//! Classify download-engine output into an error cause and operator message.

use crate::state::ErrorKind;

/// Number of trailing output lines kept in the message of an unclassified failure.
pub const TAIL_LINES: usize = 5;

/// Substring rules, checked in order. The first match wins.
const RULES: &[(&str, ErrorKind, &str)] = &[
    (
        "403 Forbidden",
        ErrorKind::AccessDenied,
        "server refused access (403); cookies may be stale",
    ),
    (
        "HTTP Error 403",
        ErrorKind::AccessDenied,
        "server refused access (403); cookies may be stale",
    ),
    (
        "No space left on device",
        ErrorKind::NoDiskSpace,
        "not enough disk space",
    ),
    (
        "HTTP Error 404",
        ErrorKind::SourceNotFound,
        "video source not found (404)",
    ),
    (
        "404 Not Found",
        ErrorKind::SourceNotFound,
        "video source not found (404)",
    ),
];

/// Classified failure of a download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: ErrorKind,
    pub message: String,
}

/// Map the full output of a failed engine run to a cause.
pub fn classify_failure(output: &str) -> Classified {
    for (pattern, kind, message) in RULES {
        if output.contains(pattern) {
            return Classified {
                kind: *kind,
                message: (*message).to_string(),
            };
        }
    }
    Classified {
        kind: ErrorKind::Unclassified,
        message: format!("download failed: ...{}", tail(output, TAIL_LINES)),
    }
}

/// Last `n` non-empty lines of `output`, newline-joined.
pub fn tail(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output
        .trim()
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_access_denied() {
        let c = classify_failure("[download] 3.0%\nERROR: unable to download: HTTP Error 403: Forbidden\n");
        assert_eq!(c.kind, ErrorKind::AccessDenied);
        let c = classify_failure("got 403 Forbidden from cdn");
        assert_eq!(c.kind, ErrorKind::AccessDenied);
    }

    #[test]
    fn disk_full() {
        let c = classify_failure("ERROR: [Errno 28] No space left on device");
        assert_eq!(c.kind, ErrorKind::NoDiskSpace);
    }

    #[test]
    fn not_found() {
        assert_eq!(
            classify_failure("ERROR: HTTP Error 404: Not Found").kind,
            ErrorKind::SourceNotFound
        );
        assert_eq!(
            classify_failure("fragment 1: 404 Not Found").kind,
            ErrorKind::SourceNotFound
        );
    }

    #[test]
    fn forbidden_wins_over_not_found() {
        let c = classify_failure("HTTP Error 404\nHTTP Error 403");
        assert_eq!(c.kind, ErrorKind::AccessDenied);
    }

    #[test]
    fn unclassified_keeps_last_five_lines() {
        let output = (1..=8).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let c = classify_failure(&output);
        assert_eq!(c.kind, ErrorKind::Unclassified);
        assert!(c.message.ends_with("line 4\nline 5\nline 6\nline 7\nline 8"));
        assert!(!c.message.contains("line 3"));
    }

    #[test]
    fn tail_of_short_output() {
        assert_eq!(tail("only\n\n", 5), "only");
        assert_eq!(tail("", 5), "");
    }
}
