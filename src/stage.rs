//! Stage definitions, results and plan slicing.
//!
//! The canonical pipeline is an immutable ordered list. Every mode works on a
//! slice or selection of it; nothing mutates the list itself.

use crate::errors::{GateError, GateResult};
use crate::gate_config::StageToml;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One external command in the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    pub command: String,
    pub label: String,
    /// Position in the canonical order (auxiliary stages sort after the pipeline)
    pub sequence_index: usize,
    /// Shell line overriding the default runner invocation
    pub exec: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Passed,
    Failed,
}

impl StageStatus {
    /// Suffix used in stage log file names.
    pub fn log_suffix(&self) -> &'static str {
        match self {
            StageStatus::Passed => "pass",
            StageStatus::Failed => "fail",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Passed => write!(f, "passed"),
            StageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub command: String,
    pub label: String,
    pub sequence_index: usize,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl StageResult {
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Passed
    }
}

/// The canonical pipeline plus auxiliary stages reachable by name.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<StageDefinition>,
    auxiliary: Vec<StageDefinition>,
}

fn definition(entry: &StageToml, sequence_index: usize) -> StageDefinition {
    let label = if entry.label.trim().is_empty() {
        entry.command.clone()
    } else {
        entry.label.clone()
    };
    StageDefinition {
        command: entry.command.clone(),
        label,
        sequence_index,
        exec: entry.exec.clone(),
    }
}

impl Pipeline {
    pub fn from_toml(stages: &[StageToml], auxiliary: &[StageToml]) -> Self {
        let stages: Vec<StageDefinition> = stages
            .iter()
            .enumerate()
            .map(|(i, entry)| definition(entry, i))
            .collect();
        let offset = stages.len();
        let auxiliary = auxiliary
            .iter()
            .enumerate()
            .map(|(i, entry)| definition(entry, offset + i))
            .collect();
        Self { stages, auxiliary }
    }

    /// Canonical stages in execution order.
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn auxiliary(&self) -> &[StageDefinition] {
        &self.auxiliary
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Canonical index of a pipeline stage.
    pub fn index_of(&self, name: &str) -> GateResult<usize> {
        self.stages
            .iter()
            .position(|s| s.command == name)
            .ok_or_else(|| GateError::UnknownStage {
                name: name.to_string(),
            })
    }

    /// Look up any known stage, pipeline first.
    pub fn find(&self, name: &str) -> Option<&StageDefinition> {
        self.stages
            .iter()
            .chain(self.auxiliary.iter())
            .find(|s| s.command == name)
    }

    /// Inclusive canonical sub-range between two optional stage names.
    ///
    /// Both names are resolved before anything runs; an unknown name or a
    /// reversed range is a configuration error.
    pub fn bounded(
        &self,
        from: Option<&str>,
        until: Option<&str>,
    ) -> GateResult<Vec<StageDefinition>> {
        let start = match from {
            Some(name) => self.index_of(name)?,
            None => 0,
        };
        let end = match until {
            Some(name) => self.index_of(name)?,
            None => self.stages.len().saturating_sub(1),
        };
        if self.stages.is_empty() {
            return Ok(Vec::new());
        }
        if start > end {
            return Err(GateError::Configuration(format!(
                "start stage '{}' comes after end stage '{}'",
                self.stages[start].command, self.stages[end].command
            )));
        }
        Ok(self.stages[start..=end].to_vec())
    }

    /// Resolve a list of names (pipeline or auxiliary) in the given order.
    pub fn select(&self, names: &[String]) -> GateResult<Vec<StageDefinition>> {
        names
            .iter()
            .map(|name| {
                self.find(name).cloned().ok_or_else(|| GateError::UnknownStage {
                    name: name.clone(),
                })
            })
            .collect()
    }
}
