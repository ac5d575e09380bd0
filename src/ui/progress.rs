use crate::stage::StageResult;
use crate::ui::icons::{CHECK, CROSS, RESCUE, RUNNING, SPARKLE, WARN};
use crate::ui::render::{
    collect_highlights, format_duration, live_progress_line, render_box, slowest,
    stage_end_line, stage_start_line, timeline_rows,
};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Accent used when styling a framed box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Good,
    Bad,
}

/// Terminal UI for gate runs.
///
/// Stage start/end lines, digests and summary boxes are printed as plain
/// lines; only the streaming stage gets an `indicatif` bar, fed from its
/// `[current/total]` markers. The UI is shared by reference across the two
/// parallel branches, so all state sits behind `MultiProgress` or a mutex.
pub struct GateUI {
    multi: MultiProgress,
    live: Mutex<Option<ProgressBar>>,
    verbose: bool,
}

impl GateUI {
    /// Create the UI.
    ///
    /// # Arguments
    /// * `verbose` - when `true`, every line of stage output is echoed dimmed
    pub fn new(verbose: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            live: Mutex::new(None),
            verbose,
        }
    }

    /// Print a line above any live bar, falling back to stdout.
    ///
    /// A hidden draw target (stdout not a terminal) swallows `println`, so
    /// output goes straight to stdout in that case.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.is_hidden() || self.multi.println(msg.as_ref()).is_err() {
            println!("{}", msg.as_ref());
        }
    }

    pub fn line(&self, msg: impl AsRef<str>) {
        self.print_line(msg);
    }

    pub fn blank(&self) {
        self.print_line("");
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}", style(msg.as_ref()).dim()));
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}{}", CHECK, style(msg.as_ref()).green()));
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}{}", WARN, style(msg.as_ref()).yellow()));
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.print_line(format!("{}{}", CROSS, style(msg.as_ref()).red().bold()));
    }

    /// Print a framed box; the border is cyan and the title takes the tone colour.
    pub fn framed(&self, title: &str, rows: &[String], tone: Tone) {
        for (i, line) in render_box(title, rows).into_iter().enumerate() {
            let styled = if line.starts_with("+-") {
                style(line).cyan()
            } else if i == 1 {
                match tone {
                    Tone::Info => style(line).bold().cyan(),
                    Tone::Good => style(line).bold().green(),
                    Tone::Bad => style(line).bold().yellow(),
                }
            } else if line.contains("FAIL") {
                style(line).yellow()
            } else if tone == Tone::Bad {
                style(line).yellow()
            } else {
                style(line).dim()
            };
            self.print_line(styled.to_string());
        }
    }

    /// Banner printed before the first stage of a run.
    ///
    /// # Arguments
    /// * `mode` - run mode name (`full`, `smart`, ...)
    /// * `total` - number of stages planned
    pub fn flow_intro(&self, mode: &str, total: usize) {
        let rows = vec![
            format!("Mode                 : {}", mode.to_uppercase()),
            format!("Target               : {} stage(s)", total),
            "Telemetry            : Live stage progress + timing recap".to_string(),
        ];
        self.blank();
        self.framed("GATEHOUSE STAGE FLOW", &rows, Tone::Info);
        self.blank();
    }

    pub fn stage_start(&self, index: usize, total: usize, command: &str, label: &str) {
        self.print_line(format!(
            "{}",
            style(stage_start_line(index, total, command, label)).cyan()
        ));
    }

    pub fn stage_end(&self, index: usize, total: usize, command: &str, passed: bool, ms: u64) {
        let text = stage_end_line(index, total, command, passed, ms);
        if passed {
            self.print_line(format!("{}", style(text).green()));
        } else {
            self.print_line(format!("{}", style(text).yellow()));
        }
    }

    /// Echo one line of stage output when running verbose.
    pub fn stage_output(&self, line: &str) {
        if self.verbose {
            self.print_line(format!("    {}", style(line).dim()));
        }
    }

    /// Framed digest of a finished stage.
    ///
    /// # Arguments
    /// * `output` - combined stdout/stderr the highlights are chosen from
    /// * `log_path` - workspace-relative log artifact, when one was written
    /// * `rerun` - on failure, the exact command to reproduce it
    #[allow(clippy::too_many_arguments)]
    pub fn stage_digest(
        &self,
        index: usize,
        total: usize,
        command: &str,
        passed: bool,
        output: &str,
        progress_stage: &str,
        log_path: Option<&str>,
        rerun: Option<&str>,
    ) {
        let mut rows: Vec<String> = collect_highlights(command, output, progress_stage)
            .into_iter()
            .map(|l| format!("- {}", l))
            .collect();
        if let Some(path) = log_path {
            rows.push(format!("- Log file: {}", path));
        }
        if let Some(cmd) = rerun {
            rows.push(format!("- Re-run: {}", cmd));
            rows.push(format!("- Rescue: gatehouse rescue {}", command));
        }
        let title = format!(
            "STAGE {:02}/{:02} {} DIGEST ({})",
            index,
            total,
            if passed { "PASS" } else { "FAIL" },
            command
        );
        self.framed(&title, &rows, if passed { Tone::Good } else { Tone::Bad });
    }

    /// Start the live bar for the streaming stage.
    pub fn live_start(&self, label: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .expect("progress bar template is a valid static string"),
        );
        bar.set_message(format!("{} {}", RUNNING, style(label).dim()));
        bar.enable_steady_tick(Duration::from_millis(120));
        if let Ok(mut live) = self.live.lock() {
            *live = Some(bar);
        }
    }

    /// Move the live bar to `current/total`.
    pub fn live_update(&self, current: u64, total: u64) {
        if let Ok(live) = self.live.lock()
            && let Some(ref bar) = *live
        {
            bar.set_message(format!(
                "{}",
                style(live_progress_line("    Progress", current, total)).dim()
            ));
        }
    }

    pub fn live_finish(&self) {
        if let Ok(mut live) = self.live.lock()
            && let Some(bar) = live.take()
        {
            bar.finish_and_clear();
        }
    }

    /// STAGE TIMELINE box listing every executed stage in canonical order.
    pub fn timeline(&self, results: &[StageResult], log_dir: Option<&str>) {
        if results.is_empty() {
            return;
        }
        self.blank();
        let any_failed = results.iter().any(|r| !r.passed());
        self.framed(
            "STAGE TIMELINE",
            &timeline_rows(results, log_dir),
            if any_failed { Tone::Bad } else { Tone::Info },
        );
    }

    /// Victory report printed after a fully green run.
    pub fn victory(
        &self,
        mode: &str,
        total_ms: u64,
        results: &[StageResult],
        log_dir: Option<&str>,
    ) {
        let passed = results.iter().filter(|r| r.passed()).count();
        let slowest = slowest(results)
            .map(|s| format!("{} ({})", s.command, format_duration(s.duration_ms)))
            .unwrap_or_else(|| "n/a".to_string());
        let rows = vec![
            "Release Gate         : PASSED".to_string(),
            format!("Mode                 : {}", mode),
            format!("Gate Stages          : {}/{} passed", passed, results.len()),
            format!("Slowest Stage        : {}", slowest),
            format!("Total Runtime        : {}", format_duration(total_ms)),
            format!(
                "Completed At         : {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            format!("Stage Log Folder     : {}", log_dir.unwrap_or("(none)")),
            "Status               : READY TO SHIP".to_string(),
        ];
        self.blank();
        self.framed("GATEHOUSE VICTORY REPORT", &rows, Tone::Good);
        self.blank();
        self.print_line(format!(
            "{}{}",
            SPARKLE,
            style("ALL SYSTEMS GREEN.").bold().green()
        ));
    }

    /// Announce a rescue report location.
    pub fn rescue_saved(&self, path: &str) {
        self.print_line(format!(
            "{}{} {}",
            RESCUE,
            style("Fix request saved:").yellow().bold(),
            path
        ));
    }
}
