//! File-backed configuration read from `.gatehouse/gatehouse.toml`.
//!
//! Every section is optional; a missing file yields the built-in release gate
//! (twelve npm-script stages, eleven snapshot targets, a 25-entry snapshot cap).
//!
//! # Configuration File Format
//!
//! ```toml
//! [runner]
//! program = "npm"
//! args = ["run", "--silent"]
//! progress_stage = "test"
//!
//! [[stages]]
//! command = "lint"
//! label = "Lint sources"
//!
//! [[stages]]
//! command = "e2e"
//! label = "End-to-end suite"
//! exec = "npx playwright test"
//!
//! [snapshots]
//! targets = ["src", "package.json"]
//! limit = 25
//!
//! [parallel]
//! head = 1
//! branch_a = ["e2e"]
//! branch_b = []
//!
//! [journal]
//! root = "docs/ai-memory"
//! ```

use crate::config::STATE_DIR;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Name of the configuration file inside the state directory.
pub const CONFIG_FILE: &str = "gatehouse.toml";

/// How stage commands are turned into processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Program used for stages without an `exec` line
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the stage command
    #[serde(default = "default_program_args")]
    pub args: Vec<String>,
    /// Stage whose output is streamed to drive the live progress bar
    #[serde(default = "default_progress_stage")]
    pub progress_stage: String,
}

fn default_program() -> String {
    "npm".to_string()
}

fn default_program_args() -> Vec<String> {
    vec!["run".to_string(), "--silent".to_string()]
}

fn default_progress_stage() -> String {
    "test".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_program_args(),
            progress_stage: default_progress_stage(),
        }
    }
}

/// One stage entry, either in the canonical pipeline or the auxiliary set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageToml {
    pub command: String,
    #[serde(default)]
    pub label: String,
    /// Shell line run via `sh -c` instead of the default runner program
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
}

impl StageToml {
    fn npm(command: &str, label: &str) -> Self {
        Self {
            command: command.to_string(),
            label: label.to_string(),
            exec: None,
        }
    }
}

fn default_stages() -> Vec<StageToml> {
    vec![
        StageToml::npm("test:all:contract", "Contract guard"),
        StageToml::npm("sync:dist-site", "Sync dist_site assets"),
        StageToml::npm("test:sync:dist-site", "Verify dist_site sync"),
        StageToml::npm("test:memory", "Validate AI memory docs"),
        StageToml::npm("test:frank:safety", "Validate Franklin safety"),
        StageToml::npm("test:integrity", "Validate test integrity rules"),
        StageToml::npm("test", "Run Playwright E2E suite"),
        StageToml::npm("test:desktop:icon", "Build desktop icons"),
        StageToml::npm("test:desktop:pack", "Pack desktop app"),
        StageToml::npm("test:desktop:dist", "Build Windows installer"),
        StageToml::npm("deploy:siteground", "Prepare SiteGround package"),
        StageToml::npm("verify:siteground", "Verify SiteGround package"),
    ]
}

fn default_auxiliary() -> Vec<StageToml> {
    vec![
        StageToml::npm("test:changed", "Run changed-file E2E lane"),
        StageToml::npm("test:smoke", "Run smoke E2E lane"),
        StageToml::npm("test:flake:critical", "Run critical flake detector"),
    ]
}

/// Guardian snapshot targets and retention cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotsConfig {
    /// Workspace-relative files and directories captured by each snapshot
    #[serde(default = "default_snapshot_targets")]
    pub targets: Vec<String>,
    /// Maximum number of snapshots kept in the index
    #[serde(default = "default_snapshot_limit")]
    pub limit: usize,
}

fn default_snapshot_targets() -> Vec<String> {
    [
        "assets",
        "config",
        "desktop",
        "scripts",
        "tests",
        "docs/ai-memory",
        "index.html",
        "package.json",
        "package-lock.json",
        "manifest.webmanifest",
        ".htaccess",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_snapshot_limit() -> usize {
    25
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            targets: default_snapshot_targets(),
            limit: default_snapshot_limit(),
        }
    }
}

/// Change classification used by `smart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartConfig {
    /// Core verification stages always run first
    #[serde(default = "default_core_stages")]
    pub core: Vec<String>,
    /// Lane run when runtime, infrastructure or test files changed
    #[serde(default = "default_changed_lane")]
    pub changed_lane: String,
    /// Lane run when nothing significant changed
    #[serde(default = "default_smoke_lane")]
    pub smoke_lane: String,
    #[serde(default = "default_runtime_patterns")]
    pub runtime_patterns: Vec<String>,
    #[serde(default = "default_infrastructure_patterns")]
    pub infrastructure_patterns: Vec<String>,
    #[serde(default = "default_test_patterns")]
    pub test_patterns: Vec<String>,
}

fn default_core_stages() -> Vec<String> {
    [
        "test:all:contract",
        "sync:dist-site",
        "test:sync:dist-site",
        "test:memory",
        "test:frank:safety",
        "test:integrity",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_changed_lane() -> String {
    "test:changed".to_string()
}

fn default_smoke_lane() -> String {
    "test:smoke".to_string()
}

fn default_runtime_patterns() -> Vec<String> {
    ["assets/**", "index.html", "manifest.webmanifest", "*.css", "*.js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_infrastructure_patterns() -> Vec<String> {
    [
        "config/**",
        "scripts/**",
        "desktop/**",
        "package.json",
        "package-lock.json",
        "playwright.config.*",
        ".htaccess",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_test_patterns() -> Vec<String> {
    vec!["tests/**".to_string()]
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            core: default_core_stages(),
            changed_lane: default_changed_lane(),
            smoke_lane: default_smoke_lane(),
            runtime_patterns: default_runtime_patterns(),
            infrastructure_patterns: default_infrastructure_patterns(),
            test_patterns: default_test_patterns(),
        }
    }
}

/// Stages run by `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default = "default_check_stages")]
    pub stages: Vec<String>,
}

fn default_check_stages() -> Vec<String> {
    [
        "test:all:contract",
        "test:sync:dist-site",
        "test:memory",
        "test:frank:safety",
        "test:integrity",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            stages: default_check_stages(),
        }
    }
}

/// Sequential head plus two concurrent tail branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of leading canonical stages run sequentially
    #[serde(default = "default_parallel_head")]
    pub head: usize,
    #[serde(default = "default_branch_a")]
    pub branch_a: Vec<String>,
    #[serde(default = "default_branch_b")]
    pub branch_b: Vec<String>,
}

fn default_parallel_head() -> usize {
    6
}

fn default_branch_a() -> Vec<String> {
    vec!["test".to_string()]
}

fn default_branch_b() -> Vec<String> {
    [
        "test:desktop:icon",
        "test:desktop:pack",
        "test:desktop:dist",
        "deploy:siteground",
        "verify:siteground",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            head: default_parallel_head(),
            branch_a: default_branch_a(),
            branch_b: default_branch_b(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Auxiliary stage executed by `flake`
    #[serde(default = "default_flake_suite")]
    pub flake_suite: String,
    /// Records shown by `observability` when no limit is given
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,
}

fn default_flake_suite() -> String {
    "test:flake:critical".to_string()
}

fn default_report_limit() -> usize {
    10
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            flake_suite: default_flake_suite(),
            report_limit: default_report_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescueConfig {
    /// Write the fix request automatically when a pipeline mode fails
    #[serde(default = "default_true")]
    pub auto_report: bool,
    /// Cap on each captured output block in the fix request
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_output_chars() -> usize {
    4000
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            auto_report: true,
            max_output_chars: default_max_output_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_keep_failed_runs")]
    pub keep_failed_runs: usize,
    #[serde(default = "default_keep_snapshots")]
    pub keep_snapshots: usize,
}

fn default_keep_failed_runs() -> usize {
    1
}

fn default_keep_snapshots() -> usize {
    2
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_failed_runs: default_keep_failed_runs(),
            keep_snapshots: default_keep_snapshots(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorConfig {
    /// JSON manifest with a `scripts` object; stages without `exec` must be listed in it
    #[serde(default = "default_script_manifest")]
    pub script_manifest: Option<String>,
    /// Extra script names that must exist in the manifest
    #[serde(default)]
    pub required_scripts: Vec<String>,
}

fn default_script_manifest() -> Option<String> {
    Some("package.json".to_string())
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            script_manifest: default_script_manifest(),
            required_scripts: Vec::new(),
        }
    }
}

/// Project memory documents written by `note`, `error` and rescue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_root")]
    pub root: String,
    #[serde(default = "default_decisions")]
    pub decisions: String,
    #[serde(default = "default_errors")]
    pub errors: String,
    #[serde(default = "default_fix_request")]
    pub fix_request: String,
}

fn default_journal_root() -> String {
    "docs/ai-memory".to_string()
}

fn default_decisions() -> String {
    "decisions.md".to_string()
}

fn default_errors() -> String {
    "error-catalog.md".to_string()
}

fn default_fix_request() -> String {
    "fix-request.md".to_string()
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            root: default_journal_root(),
            decisions: default_decisions(),
            errors: default_errors(),
            fix_request: default_fix_request(),
        }
    }
}

/// Root structure of `gatehouse.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateToml {
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Canonical pipeline, in execution order
    #[serde(default = "default_stages")]
    pub stages: Vec<StageToml>,
    /// Stages outside the pipeline (smart lanes, flake suite)
    #[serde(default = "default_auxiliary")]
    pub auxiliary: Vec<StageToml>,
    #[serde(default)]
    pub snapshots: SnapshotsConfig,
    #[serde(default)]
    pub smart: SmartConfig,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub rescue: RescueConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub doctor: DoctorConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

impl Default for GateToml {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            stages: default_stages(),
            auxiliary: default_auxiliary(),
            snapshots: SnapshotsConfig::default(),
            smart: SmartConfig::default(),
            check: CheckConfig::default(),
            parallel: ParallelConfig::default(),
            observability: ObservabilityConfig::default(),
            rescue: RescueConfig::default(),
            retention: RetentionConfig::default(),
            doctor: DoctorConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

impl GateToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse gatehouse.toml")
    }

    /// Load configuration from `<state_dir>/gatehouse.toml`.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize gatehouse.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Check structural consistency. Returns one message per problem.
    ///
    /// Smart lanes and parallel branches are resolved when those modes plan
    /// their stages, so an unused section never blocks the other modes.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.stages.is_empty() {
            problems.push("No stages configured".to_string());
        }

        let mut seen = HashSet::new();
        for stage in self.stages.iter().chain(self.auxiliary.iter()) {
            if stage.command.trim().is_empty() {
                problems.push("Stage with empty command".to_string());
            } else if !seen.insert(stage.command.as_str()) {
                problems.push(format!("Duplicate stage '{}'", stage.command));
            }
            if let Some(ref exec) = stage.exec
                && exec.trim().is_empty()
            {
                problems.push(format!("Stage '{}' has an empty exec line", stage.command));
            }
        }

        let all_patterns = self
            .smart
            .runtime_patterns
            .iter()
            .chain(&self.smart.infrastructure_patterns)
            .chain(&self.smart.test_patterns);
        for pattern in all_patterns {
            if let Err(e) = glob::Pattern::new(pattern) {
                problems.push(format!("Invalid smart pattern '{}': {}", pattern, e));
            }
        }

        if self.snapshots.limit == 0 {
            problems.push("snapshots.limit must be at least 1".to_string());
        }
        for target in &self.snapshots.targets {
            let path = Path::new(target);
            if target.trim().is_empty()
                || path.is_absolute()
                || path.components().any(|c| matches!(c, std::path::Component::ParentDir))
            {
                problems.push(format!(
                    "Snapshot target '{}' must be a workspace-relative path",
                    target
                ));
                continue;
            }
            let mut parts = path.components().filter_map(|c| match c {
                std::path::Component::Normal(part) => Some(part),
                _ => None,
            });
            match parts.next() {
                None => problems.push(format!(
                    "Snapshot target '{}' must name a path inside the workspace, not its root",
                    target
                )),
                Some(first) if first == STATE_DIR => problems.push(format!(
                    "Snapshot target '{}' overlaps the {} state directory",
                    target, STATE_DIR
                )),
                Some(_) => {}
            }
        }

        if self.rescue.max_output_chars == 0 {
            problems.push("rescue.max_output_chars must be at least 1".to_string());
        }

        problems
    }
}
