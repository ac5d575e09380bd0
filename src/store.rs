//! Append-only record persistence.
//!
//! Run history, flake history and the snapshot index all sit behind
//! [`RecordStore`], so their callers never touch the file format directly.

use crate::errors::{GateError, GateResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Ordered, append-only collection of records.
pub trait RecordStore<T> {
    /// Persist one new record as the most recent entry.
    fn append(&self, record: &T) -> GateResult<()>;

    /// Records newest first, at most `limit` when given.
    fn list(&self, limit: Option<usize>) -> GateResult<Vec<T>>;

    /// Keep only the newest `keep` records and return the ones removed.
    fn prune(&self, keep: usize) -> GateResult<Vec<T>>;
}

/// One JSON document per line, oldest first on disk.
pub struct JsonlStore<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonlStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize + DeserializeOwned> JsonlStore<T> {
    /// All parseable records, oldest first. Corrupt lines are skipped.
    fn read_all(&self) -> GateResult<Vec<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GateError::filesystem(&self.path, e)),
        };
        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "Skipping unreadable record"
                ),
            }
        }
        Ok(records)
    }

    fn encode(&self, record: &T) -> GateResult<String> {
        serde_json::to_string(record).map_err(|source| GateError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

impl<T: Serialize + DeserializeOwned> RecordStore<T> for JsonlStore<T> {
    fn append(&self, record: &T) -> GateResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| GateError::filesystem(parent, e))?;
        }
        let line = self.encode(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| GateError::filesystem(&self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| GateError::filesystem(&self.path, e))
    }

    fn list(&self, limit: Option<usize>) -> GateResult<Vec<T>> {
        let mut records = self.read_all()?;
        records.reverse();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn prune(&self, keep: usize) -> GateResult<Vec<T>> {
        let mut records = self.read_all()?;
        if records.len() <= keep {
            return Ok(Vec::new());
        }
        let kept = records.split_off(records.len() - keep);
        let mut body = String::new();
        for record in &kept {
            body.push_str(&self.encode(record)?);
            body.push('\n');
        }
        fs::write(&self.path, body).map_err(|e| GateError::filesystem(&self.path, e))?;
        Ok(records)
    }
}
