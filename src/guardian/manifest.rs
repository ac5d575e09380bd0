//! Size and mtime manifests used by `snapshot diff`.
//!
//! A manifest maps each file path (relative to the snapshot or workspace
//! root, `/`-separated) to its size and modification time. Content is not
//! hashed: two files with the same size and mtime compare equal.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileSignature {
    pub size: u64,
    pub mtime_ms: u128,
}

pub type Manifest = BTreeMap<String, FileSignature>;

fn signature(meta: &fs::Metadata) -> io::Result<FileSignature> {
    let mtime_ms = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    Ok(FileSignature {
        size: meta.len(),
        mtime_ms,
    })
}

fn key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the manifest of the given targets under `root`. Missing targets are
/// skipped.
pub fn build(root: &Path, targets: &[String]) -> io::Result<Manifest> {
    let mut manifest = Manifest::new();
    for target in targets {
        let start = root.join(target);
        if !start.exists() {
            continue;
        }
        for entry in WalkDir::new(&start).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| io::Error::other(e.to_string()))?;
            manifest.insert(key(relative), signature(&entry.metadata()?)?);
        }
    }
    Ok(manifest)
}

/// Paths that differ between two manifests, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl ManifestDiff {
    /// Compare `left` (baseline) against `right`.
    pub fn compare(left: &Manifest, right: &Manifest) -> Self {
        let mut diff = Self::default();
        for (path, sig) in left {
            match right.get(path) {
                None => diff.removed.push(path.clone()),
                Some(other) if other != sig => diff.changed.push(path.clone()),
                Some(_) => {}
            }
        }
        diff.added = right
            .keys()
            .filter(|path| !left.contains_key(*path))
            .cloned()
            .collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
