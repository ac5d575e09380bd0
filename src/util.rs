//! Shared utility functions for the gatehouse crate.

use regex::Regex;
use std::sync::LazyLock;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

static TOKEN_UNSAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9._-]+").unwrap());

/// Lowercase a value into a filesystem-safe token (`[a-z0-9._-]`).
///
/// Runs of other characters collapse to a single `-`; leading and trailing
/// dashes are trimmed. Returns `fallback` when nothing survives.
pub fn sanitize_token(value: &str, fallback: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let replaced = TOKEN_UNSAFE.replace_all(&lowered, "-");
    let trimmed = replaced.trim_matches('-');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Snapshot labels are tokens capped at 48 characters.
pub fn sanitize_label(value: &str, fallback: &str) -> String {
    let token = sanitize_token(value, fallback);
    let capped: String = token.chars().take(48).collect();
    let capped = capped.trim_end_matches('-');
    if capped.is_empty() {
        fallback.to_string()
    } else {
        capped.to_string()
    }
}

/// Normalize line endings to `\n` and drop ANSI escape sequences.
pub fn strip_ansi(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    ANSI_ESCAPE.replace_all(&normalized, "").into_owned()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
