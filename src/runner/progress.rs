//! Live progress extraction for the streaming stage.
//!
//! Test reporters print `[current/total]` markers as each test starts. The
//! parser is a pure function over one output line; [`ProgressTracker`] keeps
//! the furthest point seen so the bar never moves backwards.

use regex::Regex;
use std::sync::LazyLock;

static PROGRESS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)/(\d+)\]").unwrap());

/// Parse the last `[current/total]` marker on a line.
///
/// Returns `None` when no marker is present or the marker is nonsensical
/// (zero total, or current beyond total).
pub fn parse_progress(line: &str) -> Option<(u64, u64)> {
    let caps = PROGRESS_MARKER.captures_iter(line).last()?;
    let current: u64 = caps.get(1)?.as_str().parse().ok()?;
    let total: u64 = caps.get(2)?.as_str().parse().ok()?;
    if total == 0 || current > total {
        return None;
    }
    Some((current, total))
}

/// Monotonic progress state fed from streamed lines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTracker {
    pub current: u64,
    pub total: u64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns the new position when it advanced.
    pub fn observe(&mut self, line: &str) -> Option<(u64, u64)> {
        let (current, total) = parse_progress(line)?;
        if total != self.total {
            // A new reporter phase (e.g. retries) restarts the count.
            self.total = total;
            self.current = current;
            return Some((current, total));
        }
        if current <= self.current {
            return None;
        }
        self.current = current;
        Some((current, total))
    }

    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.current * 100 / self.total
        }
    }
}
