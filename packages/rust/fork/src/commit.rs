//! Upstream commit extraction from fork release notes.
//!
//! Grammar (case-insensitive): the phrase `update vscode to`, an optional
//! `[`, then exactly 40 hexadecimal characters not followed by another hex
//! character. Only the first occurrence counts.

use std::sync::LazyLock;

use regex::Regex;

static UPSTREAM_COMMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)update vscode to \[?([0-9a-f]{40})(?:[^0-9a-f]|$)").expect("commit regex")
});

/// Find the upstream commit a fork release was built from.
///
/// The hash is returned lowercased so the same commit written in different
/// case deduplicates.
pub fn extract_upstream_commit(body: &str) -> Option<String> {
    UPSTREAM_COMMIT_RE
        .captures(body)
        .map(|caps| caps[1].to_ascii_lowercase())
}
