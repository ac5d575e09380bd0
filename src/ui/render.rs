//! Pure text rendering for gate output.
//!
//! Nothing here touches the terminal; [`super::GateUI`] styles and prints the
//! lines these functions build, which keeps the layout testable.

use crate::stage::StageResult;
use crate::util::strip_ansi;
use regex::Regex;
use std::sync::LazyLock;

/// Width of the stage progress bar printed with START/PASS/FAIL lines.
pub const STAGE_BAR_WIDTH: usize = 24;
/// Width of the live bar driven by the streaming stage.
pub const LIVE_BAR_WIDTH: usize = 20;
const BOX_MIN_WIDTH: usize = 58;
const MAX_HIGHLIGHTS: usize = 6;

static HIGHLIGHT_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\d+\s+passed\b",
        r"(?i)^\d+\s+failed\b",
        r"(?i)^\d+\s+skipped\b",
        r"(?i)\brunning\s+\d+\s+tests?\b",
        r"(?i)\bverification\s+(passed|failed)\b",
        r"(?i)\bpass(?:ed)?\b",
        r"(?i)\bfail(?:ed|ure)?\b",
        r"(?i)\bready to upload\b",
        r"(?i)\bcreated\b",
        r"(?i)\brestored\b",
        r"(?i)\bsync(?:ed)?\b",
        r"(?i)\bplaywright\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static NOISE_PROGRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[\d+/\d+\]").unwrap());
static NOISE_NPM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^npm\s+(warn|notice)\b").unwrap());
static NOISE_NODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^node:\s+").unwrap());

/// Format milliseconds as `Xs` or `Xm SSs` (rounded to whole seconds).
pub fn format_duration(ms: u64) -> String {
    let total_seconds = (ms + 500) / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    if minutes == 0 {
        format!("{}s", seconds)
    } else {
        format!("{}m {:02}s", minutes, seconds)
    }
}

/// ASCII bar such as `[=====>..........]`.
pub fn progress_bar(completed: usize, total: usize, width: usize) -> String {
    let total = total.max(1);
    let completed = completed.min(total);
    let filled = ((completed as f64 / total as f64) * width as f64).round() as usize;
    let filled = filled.min(width);
    if filled >= width {
        return format!("[{}]", "=".repeat(width));
    }
    let (body, head) = if filled > 0 {
        ("=".repeat(filled - 1), ">")
    } else {
        (String::new(), "")
    };
    let tail = ".".repeat(width - filled);
    format!("[{}{}{}]", body, head, tail)
}

/// Frame a title and rows in a `+---+` box at least 58 columns wide.
pub fn render_box(title: &str, rows: &[String]) -> Vec<String> {
    let inner = rows
        .iter()
        .map(|r| r.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .fold(BOX_MIN_WIDTH, usize::max);
    let border = format!("+-{}-+", "-".repeat(inner));
    let pad = |text: &str| {
        let fill = inner - text.chars().count();
        format!("| {}{} |", text, " ".repeat(fill))
    };
    let mut lines = vec![border.clone(), pad(title), border.clone()];
    lines.extend(rows.iter().map(|r| pad(r)));
    lines.push(border);
    lines
}

/// `[NN/TT]` counter used on stage lines.
pub fn stage_counter(index: usize, total: usize) -> String {
    format!("[{:02}/{:02}]", index, total)
}

/// `bar [NN/TT] START command  (label)`
pub fn stage_start_line(index: usize, total: usize, command: &str, label: &str) -> String {
    format!(
        "{} {} START {}  ({})",
        progress_bar(index.saturating_sub(1), total, STAGE_BAR_WIDTH),
        stage_counter(index, total),
        command,
        label
    )
}

/// `bar [NN/TT] PASS command  (duration)`; a failed stage does not advance the bar.
pub fn stage_end_line(
    index: usize,
    total: usize,
    command: &str,
    passed: bool,
    ms: u64,
) -> String {
    let done = if passed { index } else { index.saturating_sub(1) };
    format!(
        "{} {} {} {}  ({})",
        progress_bar(done, total, STAGE_BAR_WIDTH),
        stage_counter(index, total),
        if passed { "PASS" } else { "FAIL" },
        command,
        format_duration(ms)
    )
}

/// Live bar text: `prefix [====>...]  42% (5/12)`.
pub fn live_progress_line(prefix: &str, current: u64, total: u64) -> String {
    let total = total.max(1);
    let current = current.min(total);
    let percent = ((current as f64 / total as f64) * 100.0).round() as u64;
    format!(
        "{} {} {:>3}% ({}/{})",
        prefix,
        progress_bar(current as usize, total as usize, LIVE_BAR_WIDTH),
        percent,
        current,
        total
    )
}

/// Pick the lines worth showing in a stage digest.
///
/// Keyword lines (pass/fail counts, verification verdicts, ...) come first; when
/// fewer than three are found the tail of the output fills the remainder.
/// npm banners, `[n/m]` progress markers and node warnings are dropped.
pub fn collect_highlights(command: &str, output: &str, progress_stage: &str) -> Vec<String> {
    let normalized = strip_ansi(output);
    let lines: Vec<&str> = normalized
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.starts_with("> "))
        .filter(|l| !NOISE_PROGRESS.is_match(l))
        .filter(|l| !NOISE_NPM.is_match(l))
        .filter(|l| !NOISE_NODE.is_match(l))
        .collect();

    if lines.is_empty() {
        return vec!["No stage output captured.".to_string()];
    }

    let mut highlights: Vec<String> = Vec::new();
    for line in &lines {
        if !HIGHLIGHT_KEYWORDS.iter().any(|re| re.is_match(line)) {
            continue;
        }
        if highlights.iter().any(|h| h == line) {
            continue;
        }
        highlights.push(line.to_string());
        if highlights.len() >= MAX_HIGHLIGHTS {
            break;
        }
    }

    if highlights.len() >= MAX_HIGHLIGHTS.min(3) {
        return highlights;
    }
    if command == progress_stage && !highlights.is_empty() {
        return highlights;
    }

    let want = MAX_HIGHLIGHTS - highlights.len();
    let mut tail: Vec<String> = Vec::new();
    for line in lines.iter().rev() {
        if highlights.iter().any(|h| h == line) || tail.iter().any(|t| t == line) {
            continue;
        }
        tail.insert(0, line.to_string());
        if tail.len() >= want {
            break;
        }
    }
    highlights.extend(tail);
    highlights.truncate(MAX_HIGHLIGHTS);
    highlights
}

/// Rows of the STAGE TIMELINE box, one per executed stage in canonical order.
pub fn timeline_rows(results: &[StageResult], log_dir: Option<&str>) -> Vec<String> {
    let mut rows: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{:02}. {} {:<21} {:>6}",
                i + 1,
                if r.passed() { "OK  " } else { "FAIL" },
                r.command,
                format_duration(r.duration_ms)
            )
        })
        .collect();
    if let Some(dir) = log_dir {
        rows.push(format!("Logs: {}", dir));
    }
    rows
}

/// The stage with the longest duration, if any ran.
pub fn slowest(results: &[StageResult]) -> Option<&StageResult> {
    results.iter().fold(None, |best: Option<&StageResult>, r| match best {
        Some(b) if b.duration_ms >= r.duration_ms => Some(b),
        _ => Some(r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageStatus;

    fn result(command: &str, status: StageStatus, ms: u64) -> StageResult {
        StageResult {
            command: command.to_string(),
            label: command.to_string(),
            sequence_index: 0,
            status,
            duration_ms: ms,
            log_path: None,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(1499), "1s");
        assert_eq!(format_duration(59_600), "1m 00s");
        assert_eq!(format_duration(125_000), "2m 05s");
    }

    #[test]
    fn test_progress_bar_shapes() {
        assert_eq!(progress_bar(0, 4, 8), "[........]");
        assert_eq!(progress_bar(2, 4, 8), "[===>....]");
        assert_eq!(progress_bar(4, 4, 8), "[========]");
        assert_eq!(progress_bar(9, 4, 8), "[========]");
        assert_eq!(progress_bar(1, 0, 4), "[====]");
    }

    #[test]
    fn test_progress_bar_width_is_stable() {
        for done in 0..=12 {
            assert_eq!(progress_bar(done, 12, STAGE_BAR_WIDTH).len(), STAGE_BAR_WIDTH + 2);
        }
    }

    #[test]
    fn test_render_box_min_width() {
        let lines = render_box("TITLE", &["row".to_string()]);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].len(), 58 + 4);
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
        assert_eq!(lines[1], format!("| TITLE{} |", " ".repeat(53)));
    }

    #[test]
    fn test_render_box_grows_for_long_rows() {
        let long = "y".repeat(70);
        let lines = render_box("T", &[long.clone()]);
        assert_eq!(lines[3], format!("| {} |", long));
    }

    #[test]
    fn test_stage_lines() {
        let start = stage_start_line(1, 12, "test:memory", "Validate");
        assert!(start.ends_with("[01/12] START test:memory  (Validate)"));
        let end = stage_end_line(3, 12, "test", false, 2000);
        assert!(end.contains("[03/12] FAIL test  (2s)"));
    }

    #[test]
    fn test_live_progress_line() {
        assert_eq!(
            live_progress_line("    E2E", 5, 10),
            format!("    E2E {}  50% (5/10)", progress_bar(5, 10, 20))
        );
    }

    #[test]
    fn test_highlights_prefer_keywords() {
        let output = "> npm run test\n[1/3] a\nRunning 3 tests using 1 worker\n\
                      some noise\n3 passed (4.2s)\nnpm warn deprecated\n";
        let lines = collect_highlights("test", output, "test");
        assert_eq!(
            lines,
            vec!["Running 3 tests using 1 worker".to_string(), "3 passed (4.2s)".to_string()]
        );
    }

    #[test]
    fn test_highlights_fill_from_tail() {
        let output = "alpha\nbeta\ngamma\nall good\n";
        let lines = collect_highlights("lint", output, "test");
        assert_eq!(lines, vec!["alpha", "beta", "gamma", "all good"]);
    }

    #[test]
    fn test_highlights_empty_output() {
        assert_eq!(
            collect_highlights("lint", "\n\n> npm run lint\n", "test"),
            vec!["No stage output captured."]
        );
    }

    #[test]
    fn test_timeline_rows_and_slowest() {
        let results = vec![
            result("a", StageStatus::Passed, 1000),
            result("b", StageStatus::Failed, 5000),
        ];
        let rows = timeline_rows(&results, Some(".gatehouse/reports/run-1-full"));
        assert!(rows[0].starts_with("01. OK   a"));
        assert!(rows[1].starts_with("02. FAIL b"));
        assert_eq!(rows[2], "Logs: .gatehouse/reports/run-1-full");
        assert_eq!(slowest(&results).unwrap().command, "b");
        assert!(slowest(&[]).is_none());
    }
}
