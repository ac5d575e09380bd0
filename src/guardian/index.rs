//! Snapshot index persisted as `snapshots/index.json`.

use crate::errors::{GateError, GateResult};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_VERSION: u32 = 1;

/// Header of one snapshot, stored in the index and as `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub id: String,
    pub label: String,
    pub reason: String,
    /// RFC 3339 timestamp
    pub created_at: String,
    #[serde(default)]
    pub included_targets: Vec<String>,
    #[serde(default)]
    pub skipped_targets: Vec<String>,
    #[serde(default)]
    pub missing_targets: Vec<String>,
}

impl SnapshotEntry {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotIndex {
    pub version: u32,
    /// Newest first
    #[serde(default)]
    pub snapshots: Vec<SnapshotEntry>,
}

impl Default for SnapshotIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            snapshots: Vec::new(),
        }
    }
}

/// Newest-first JSON index behind [`RecordStore`].
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> GateResult<SnapshotIndex> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SnapshotIndex::default());
            }
            Err(e) => return Err(GateError::filesystem(&self.path, e)),
        };
        serde_json::from_str(&raw).map_err(|source| GateError::Json {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, index: &SnapshotIndex) -> GateResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| GateError::filesystem(parent, e))?;
        }
        let json = serde_json::to_string_pretty(index).map_err(|source| GateError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|e| GateError::filesystem(&self.path, e))
    }

    /// Resolve `latest`, an exact id, or a unique id prefix.
    pub fn resolve(&self, selector: &str) -> GateResult<SnapshotEntry> {
        let index = self.load()?;
        if index.snapshots.is_empty() {
            return Err(GateError::NoSnapshots);
        }
        let selector = selector.trim();
        if selector.is_empty() || selector == "latest" {
            return Ok(index.snapshots[0].clone());
        }
        if let Some(entry) = index.snapshots.iter().find(|s| s.id == selector) {
            return Ok(entry.clone());
        }
        let matches: Vec<&SnapshotEntry> = index
            .snapshots
            .iter()
            .filter(|s| s.id.starts_with(selector))
            .collect();
        match matches.as_slice() {
            [entry] => Ok((*entry).clone()),
            [] => Err(GateError::SnapshotNotFound {
                selector: selector.to_string(),
            }),
            _ => Err(GateError::InvalidInput(format!(
                "snapshot prefix '{}' matches {} snapshots",
                selector,
                matches.len()
            ))),
        }
    }
}

impl RecordStore<SnapshotEntry> for IndexStore {
    fn append(&self, record: &SnapshotEntry) -> GateResult<()> {
        let mut index = self.load()?;
        index.snapshots.insert(0, record.clone());
        self.save(&index)
    }

    fn list(&self, limit: Option<usize>) -> GateResult<Vec<SnapshotEntry>> {
        let mut snapshots = self.load()?.snapshots;
        if let Some(limit) = limit {
            snapshots.truncate(limit);
        }
        Ok(snapshots)
    }

    fn prune(&self, keep: usize) -> GateResult<Vec<SnapshotEntry>> {
        let mut index = self.load()?;
        if index.snapshots.len() <= keep {
            return Ok(Vec::new());
        }
        let removed = index.snapshots.split_off(keep);
        self.save(&index)?;
        Ok(removed)
    }
}
