//! Smart change classifier.
//!
//! Changed paths are sorted into runtime, infrastructure and test categories
//! by glob pattern. Any categorized change selects the changed-code lane;
//! otherwise (including an empty change set) the smoke lane runs. The core
//! verification stages always run first. This is a heuristic, not a
//! guarantee that the skipped stages would pass.

pub mod git;

use crate::config::Config;
use crate::errors::{GateError, GateResult};
use crate::gate_config::SmartConfig;
use crate::stage::StageDefinition;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeCategory {
    Runtime,
    Infrastructure,
    Test,
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCategory::Runtime => write!(f, "runtime"),
            ChangeCategory::Infrastructure => write!(f, "infrastructure"),
            ChangeCategory::Test => write!(f, "test"),
        }
    }
}

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

pub struct ChangeClassifier {
    rules: Vec<(ChangeCategory, Vec<Pattern>)>,
}

fn compile(patterns: &[String]) -> GateResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| GateError::Configuration(format!("invalid pattern '{}': {}", p, e)))
        })
        .collect()
}

fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/").to_lowercase();
    path.trim_start_matches("./").to_string()
}

impl ChangeClassifier {
    pub fn new(settings: &SmartConfig) -> GateResult<Self> {
        Ok(Self {
            rules: vec![
                (ChangeCategory::Runtime, compile(&settings.runtime_patterns)?),
                (
                    ChangeCategory::Infrastructure,
                    compile(&settings.infrastructure_patterns)?,
                ),
                (ChangeCategory::Test, compile(&settings.test_patterns)?),
            ],
        })
    }

    /// First category whose patterns match the path.
    pub fn classify(&self, path: &str) -> Option<ChangeCategory> {
        let path = normalize(path);
        self.rules
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.matches_with(&path, MATCH)))
            .map(|(category, _)| *category)
    }
}

/// Stages selected for a change set, with the reasoning behind the lane.
#[derive(Debug, Clone)]
pub struct SmartPlan {
    pub changed: usize,
    pub categories: BTreeMap<ChangeCategory, Vec<String>>,
    pub lane: String,
    pub stages: Vec<StageDefinition>,
}

impl SmartPlan {
    /// Core stages plus the lane picked for `changed_paths`.
    pub fn build<I, S>(config: &Config, changed_paths: I) -> GateResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let settings = &config.settings().smart;
        let classifier = ChangeClassifier::new(settings)?;

        let mut changed = 0;
        let mut categories: BTreeMap<ChangeCategory, Vec<String>> = BTreeMap::new();
        for path in changed_paths {
            changed += 1;
            if let Some(category) = classifier.classify(path.as_ref()) {
                categories
                    .entry(category)
                    .or_default()
                    .push(path.as_ref().to_string());
            }
        }

        let lane = if categories.is_empty() {
            settings.smoke_lane.clone()
        } else {
            settings.changed_lane.clone()
        };
        let mut names = settings.core.clone();
        names.push(lane.clone());
        let stages = config.pipeline.select(&names)?;
        tracing::info!(changed, lane = %lane, stages = stages.len(), "Smart plan built");

        Ok(Self {
            changed,
            categories,
            lane,
            stages,
        })
    }
}
