//! Guardian snapshots: pre-flight copies of curated workspace targets.
//!
//! Each snapshot lives in `snapshots/<id>/` as `metadata.json` plus a
//! `payload/` tree mirroring the workspace layout of the captured targets.
//! The newest-first index is capped; overflow entries are pruned together
//! with their directories.
//!
//! `create` and `restore` degrade on lock, busy and disk-capacity errors (the
//! target is recorded as skipped) rather than abort. `verify` is the only operation that reports
//! partial problems as a failure.

pub mod fsops;
pub mod index;
pub mod manifest;

use crate::config::Config;
use crate::errors::{GateError, GateResult};
use crate::store::RecordStore;
use crate::util::{now_millis, sanitize_label};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use index::{IndexStore, SnapshotEntry, SnapshotIndex};
pub use manifest::{Manifest, ManifestDiff};

const METADATA_FILE: &str = "metadata.json";
const PAYLOAD_DIR: &str = "payload";

/// Copies one target tree between the workspace and a payload.
type CopyFn = fn(&Path, &Path) -> io::Result<()>;

/// Verification result for one snapshot.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub id: String,
    pub issues: Vec<String>,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// What a restore touched.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub id: String,
    pub restored: Vec<String>,
    pub skipped: Vec<String>,
}

/// Result of `snapshot diff`.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub left: String,
    pub right: String,
    pub diff: ManifestDiff,
}

pub struct SnapshotManager {
    project_dir: PathBuf,
    snapshots_dir: PathBuf,
    targets: Vec<String>,
    limit: usize,
    index: IndexStore,
    copy: CopyFn,
}

impl SnapshotManager {
    pub fn new(config: &Config) -> Self {
        let settings = &config.settings().snapshots;
        Self::with_targets(
            &config.project_dir,
            &config.snapshots_dir,
            settings.targets.clone(),
            settings.limit,
        )
    }

    pub fn with_targets(
        project_dir: &Path,
        snapshots_dir: &Path,
        targets: Vec<String>,
        limit: usize,
    ) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            snapshots_dir: snapshots_dir.to_path_buf(),
            targets,
            limit,
            index: IndexStore::new(snapshots_dir.join("index.json")),
            copy: fsops::copy_tree,
        }
    }

    #[cfg(test)]
    fn with_copy(mut self, copy: CopyFn) -> Self {
        self.copy = copy;
        self
    }

    fn snapshot_dir(&self, id: &str) -> PathBuf {
        self.snapshots_dir.join(id)
    }

    fn payload_dir(&self, id: &str) -> PathBuf {
        self.snapshot_dir(id).join(PAYLOAD_DIR)
    }

    fn unique_id(&self, label: &str) -> GateResult<String> {
        let base = format!("{}-{}", now_millis(), sanitize_label(label, "snapshot"));
        let existing = self.index.list(None)?;
        let taken = |id: &str| existing.iter().any(|e| e.id == id) || self.snapshot_dir(id).exists();
        if !taken(&base) {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !taken(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Capture every configured target into a new snapshot.
    ///
    /// # Arguments
    /// * `label` - free-form name, sanitized into the id
    /// * `reason` - why the snapshot was taken (`manual`, `guardian-preflight`, ...)
    pub fn create(&self, label: &str, reason: &str) -> GateResult<SnapshotEntry> {
        let id = self.unique_id(label)?;
        let dir = self.snapshot_dir(&id);
        let payload = self.payload_dir(&id);
        fs::create_dir_all(&payload).map_err(|e| GateError::filesystem(&payload, e))?;

        let mut entry = SnapshotEntry {
            id: id.clone(),
            label: sanitize_label(label, "snapshot"),
            reason: reason.to_string(),
            created_at: Utc::now().to_rfc3339(),
            included_targets: Vec::new(),
            skipped_targets: Vec::new(),
            missing_targets: Vec::new(),
        };

        for target in &self.targets {
            let source = self.project_dir.join(target);
            if !source.exists() {
                entry.missing_targets.push(target.clone());
                continue;
            }
            let dest = payload.join(target);
            match (self.copy)(&source, &dest) {
                Ok(()) => entry.included_targets.push(target.clone()),
                Err(e) if fsops::is_recoverable(&e, true) => {
                    tracing::warn!(target = %target, error = %e, "Skipping snapshot target");
                    if let Err(cleanup) = fsops::remove_path(&dest) {
                        tracing::warn!(path = %dest.display(), error = %cleanup, "Could not remove partial copy");
                    }
                    entry.skipped_targets.push(target.clone());
                }
                Err(e) => {
                    let _ = fsops::remove_path(&dir);
                    return Err(GateError::filesystem(source, e));
                }
            }
        }

        let metadata = dir.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(&entry).map_err(|source| GateError::Json {
            path: metadata.clone(),
            source,
        })?;
        fs::write(&metadata, json).map_err(|e| GateError::filesystem(&metadata, e))?;

        self.index.append(&entry)?;
        self.prune_to(self.limit)?;
        tracing::info!(
            id = %entry.id,
            included = entry.included_targets.len(),
            skipped = entry.skipped_targets.len(),
            missing = entry.missing_targets.len(),
            "Snapshot created"
        );
        Ok(entry)
    }

    /// Newest snapshots first.
    pub fn list(&self, limit: Option<usize>) -> GateResult<Vec<SnapshotEntry>> {
        self.index.list(limit)
    }

    pub fn resolve(&self, selector: &str) -> GateResult<SnapshotEntry> {
        self.index.resolve(selector)
    }

    /// Keep the newest `keep` snapshots, deleting the rest with their payloads.
    pub fn prune_to(&self, keep: usize) -> GateResult<Vec<SnapshotEntry>> {
        let removed = self.index.prune(keep)?;
        for entry in &removed {
            let dir = self.snapshot_dir(&entry.id);
            if let Err(e) = fsops::remove_path(&dir) {
                tracing::warn!(id = %entry.id, error = %e, "Could not remove pruned snapshot");
            }
        }
        Ok(removed)
    }

    fn verify_entry(&self, entry: &SnapshotEntry) -> VerifyReport {
        let mut issues = Vec::new();
        let dir = self.snapshot_dir(&entry.id);
        if !dir.is_dir() {
            issues.push(format!("snapshot directory missing: {}", dir.display()));
            return VerifyReport {
                id: entry.id.clone(),
                issues,
            };
        }

        let metadata_path = dir.join(METADATA_FILE);
        let metadata = fs::read_to_string(&metadata_path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<SnapshotEntry>(&raw).map_err(|e| e.to_string()));
        let metadata = match metadata {
            Ok(metadata) => metadata,
            Err(e) => {
                issues.push(format!("metadata unreadable: {}", e));
                return VerifyReport {
                    id: entry.id.clone(),
                    issues,
                };
            }
        };
        if metadata.id != entry.id {
            issues.push(format!("metadata id mismatch: {}", metadata.id));
        }
        if metadata.created_at().is_none() {
            issues.push(format!("invalid createdAt: {}", metadata.created_at));
        }
        let payload = self.payload_dir(&entry.id);
        for target in &metadata.included_targets {
            if !payload.join(target).exists() {
                issues.push(format!("payload missing target: {}", target));
            }
        }
        VerifyReport {
            id: entry.id.clone(),
            issues,
        }
    }

    /// Verify one snapshot (`latest`, id, prefix) or every snapshot (`all`).
    pub fn verify(&self, selector: &str) -> GateResult<Vec<VerifyReport>> {
        if selector.trim() == "all" {
            let entries = self.index.list(None)?;
            if entries.is_empty() {
                return Err(GateError::NoSnapshots);
            }
            return Ok(entries.iter().map(|e| self.verify_entry(e)).collect());
        }
        let entry = self.resolve(selector)?;
        Ok(vec![self.verify_entry(&entry)])
    }

    /// Copy a snapshot's included targets back into the workspace.
    ///
    /// Targets the snapshot skipped at capture time are left alone, as is
    /// anything in the workspace the snapshot never tracked. In `strict` mode
    /// any problem aborts the restore.
    pub fn restore(&self, selector: &str, strict: bool) -> GateResult<RestoreReport> {
        let entry = self.resolve(selector)?;
        let payload = self.payload_dir(&entry.id);
        let mut report = RestoreReport {
            id: entry.id.clone(),
            skipped: entry.skipped_targets.clone(),
            ..Default::default()
        };

        for target in &entry.included_targets {
            if entry.skipped_targets.contains(target) {
                continue;
            }
            let source = payload.join(target);
            if !source.exists() {
                if strict {
                    return Err(GateError::Verification {
                        issues: vec![format!("payload missing target: {}", target)],
                    });
                }
                tracing::warn!(target = %target, "Snapshot payload missing target");
                report.skipped.push(target.clone());
                continue;
            }
            let dest = self.project_dir.join(target);
            let result = fsops::remove_path(&dest).and_then(|()| (self.copy)(&source, &dest));
            match result {
                Ok(()) => report.restored.push(target.clone()),
                Err(e) if !strict && fsops::is_recoverable(&e, true) => {
                    tracing::warn!(target = %target, error = %e, "Skipping restore target");
                    report.skipped.push(target.clone());
                }
                Err(e) => return Err(GateError::filesystem(dest, e)),
            }
        }
        tracing::info!(
            id = %report.id,
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            "Snapshot restored"
        );
        Ok(report)
    }

    fn manifest_of(&self, entry: &SnapshotEntry) -> GateResult<Manifest> {
        let payload = self.payload_dir(&entry.id);
        manifest::build(&payload, &entry.included_targets)
            .map_err(|e| GateError::filesystem(payload, e))
    }

    /// Compare a snapshot against another snapshot or the live workspace.
    ///
    /// `right` of `None` or `workspace` compares against the workspace copies
    /// of the left snapshot's included targets.
    pub fn diff(&self, left: &str, right: Option<&str>) -> GateResult<DiffReport> {
        let left_entry = self.resolve(left)?;
        let left_manifest = self.manifest_of(&left_entry)?;
        let (right_name, right_manifest) = match right.map(str::trim) {
            None | Some("workspace") => {
                let manifest = manifest::build(&self.project_dir, &left_entry.included_targets)
                    .map_err(|e| GateError::filesystem(&self.project_dir, e))?;
                ("workspace".to_string(), manifest)
            }
            Some(selector) => {
                let entry = self.resolve(selector)?;
                let manifest = self.manifest_of(&entry)?;
                (entry.id, manifest)
            }
        };
        Ok(DiffReport {
            left: left_entry.id,
            right: right_name,
            diff: ManifestDiff::compare(&left_manifest, &right_manifest),
        })
    }
}
