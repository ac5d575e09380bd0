//! Filesystem helpers for snapshot payloads.

use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Whether an IO error should degrade a snapshot operation instead of
/// aborting it.
///
/// Lock and busy errors are always recoverable; disk-capacity errors only
/// when `allow_capacity` is set.
pub fn is_recoverable(err: &io::Error, allow_capacity: bool) -> bool {
    match err.raw_os_error() {
        // EPERM, EBUSY
        Some(1) | Some(16) => return true,
        // ENOSPC, ERROR_DISK_FULL
        Some(28) | Some(112) => return allow_capacity,
        _ => {}
    }
    match err.kind() {
        io::ErrorKind::ResourceBusy => true,
        io::ErrorKind::StorageFull => allow_capacity,
        _ => false,
    }
}

/// Remove a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Copy one file, keeping its modification time.
fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    let modified = fs::metadata(src)?.modified()?;
    fs::File::options()
        .write(true)
        .open(dst)?
        .set_modified(modified)
}

/// Copy a file or directory tree from `src` to `dst`.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::metadata(src)?;
    if !meta.is_dir() {
        return copy_file(src, dst);
    }
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_recoverable_classification() {
        let busy = io::Error::from_raw_os_error(16);
        let perm = io::Error::from_raw_os_error(1);
        let full = io::Error::from_raw_os_error(28);
        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert!(is_recoverable(&busy, false));
        assert!(is_recoverable(&perm, false));
        assert!(is_recoverable(&full, true));
        assert!(!is_recoverable(&full, false));
        assert!(!is_recoverable(&missing, true));
    }

    #[test]
    fn test_copy_tree_preserves_layout_and_mtime() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/b.txt"), "bb").unwrap();

        let dst = dir.path().join("copy");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "bb");
        let original = fs::metadata(src.join("a.txt")).unwrap().modified().unwrap();
        let copied = fs::metadata(dst.join("a.txt")).unwrap().modified().unwrap();
        assert_eq!(original, copied);
    }

    #[test]
    fn test_copy_single_file_creates_parents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("index.html");
        fs::write(&src, "<html>").unwrap();
        let dst = dir.path().join("payload/deep/index.html");
        copy_tree(&src, &dst).unwrap();
        assert!(dst.is_file());
    }

    #[test]
    fn test_remove_path_handles_missing_file_and_dir() {
        let dir = tempdir().unwrap();
        remove_path(&dir.path().join("nope")).unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("x")).unwrap();
        remove_path(&tree).unwrap();
        assert!(!tree.exists());
    }
}
