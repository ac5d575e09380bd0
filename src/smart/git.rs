use anyhow::{Context, Result};
use git2::{DiffOptions, Repository};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Reads working-tree changes relative to HEAD.
///
/// The workspace may sit below the repository root; paths are then reported
/// relative to the workspace and changes outside it are ignored.
pub struct ChangeTracker {
    repo: Repository,
    /// Workspace location inside the repository work tree (empty at the root)
    prefix: PathBuf,
}

impl ChangeTracker {
    pub fn new(project_dir: &Path) -> Result<Self> {
        let repo = Repository::discover(project_dir).context("Failed to open git repository")?;
        let workdir = repo
            .workdir()
            .context("Repository has no working tree")?
            .canonicalize()
            .context("Failed to resolve repository work tree")?;
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let prefix = project_dir
            .strip_prefix(&workdir)
            .context("Project directory is outside the repository work tree")?
            .to_path_buf();
        Ok(Self { repo, prefix })
    }

    /// Get the HEAD commit if it exists (returns None for unborn branches)
    fn head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    /// Modified, staged, deleted, renamed and untracked paths versus HEAD,
    /// `/`-separated and relative to the workspace.
    pub fn changed_paths(&self) -> Result<BTreeSet<String>> {
        let head_tree = match self.head_commit() {
            Some(commit) => Some(commit.tree()?),
            None => None,
        };

        let mut opts = DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);

        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

        let mut paths = BTreeSet::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(relative) = file.path().and_then(|p| p.strip_prefix(&self.prefix).ok()) {
                    paths.insert(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(paths)
    }
}

/// Changed paths for `smart`, or an empty set outside a git repository.
pub fn changed_paths_or_empty(project_dir: &Path) -> BTreeSet<String> {
    let tracker = match ChangeTracker::new(project_dir) {
        Ok(tracker) => tracker,
        Err(e) => {
            tracing::warn!(error = %e, "Not a git repository; treating change set as empty");
            return BTreeSet::new();
        }
    };
    match tracker.changed_paths() {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read git changes; treating change set as empty");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn commit_all(dir: &Path, msg: &str) {
        let repo = Repository::open(dir).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        if let Ok(head) = repo.head() {
            let parent = head.peel_to_commit().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[&parent])
                .unwrap();
        } else {
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[])
                .unwrap();
        }
    }

    #[test]
    fn test_clean_tree_has_no_changes() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("README.md"), "x").unwrap();
        commit_all(dir.path(), "init");
        let tracker = ChangeTracker::new(dir.path()).unwrap();
        assert!(tracker.changed_paths().unwrap().is_empty());
    }

    #[test]
    fn test_detects_modified_deleted_and_untracked() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("keep.txt"), "1").unwrap();
        fs::write(dir.path().join("gone.txt"), "1").unwrap();
        commit_all(dir.path(), "init");

        fs::write(dir.path().join("keep.txt"), "2").unwrap();
        fs::remove_file(dir.path().join("gone.txt")).unwrap();
        fs::create_dir_all(dir.path().join("assets/js")).unwrap();
        fs::write(dir.path().join("assets/js/new.js"), "n").unwrap();

        let paths = ChangeTracker::new(dir.path()).unwrap().changed_paths().unwrap();
        assert!(paths.contains("keep.txt"));
        assert!(paths.contains("gone.txt"));
        assert!(paths.contains("assets/js/new.js"));
    }

    #[test]
    fn test_unborn_repository_lists_untracked() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("index.html"), "x").unwrap();
        let paths = ChangeTracker::new(dir.path()).unwrap().changed_paths().unwrap();
        assert!(paths.contains("index.html"));
    }

    #[test]
    fn test_workspace_in_repository_subdirectory() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let site = dir.path().join("site");
        fs::create_dir_all(site.join("assets")).unwrap();
        fs::write(site.join("assets/app.js"), "1").unwrap();
        fs::write(dir.path().join("other.txt"), "1").unwrap();
        commit_all(dir.path(), "init");

        fs::write(site.join("assets/app.js"), "2").unwrap();
        fs::write(dir.path().join("other.txt"), "2").unwrap();

        let paths = changed_paths_or_empty(&site);
        assert_eq!(paths.into_iter().collect::<Vec<_>>(), vec!["assets/app.js"]);
    }

    #[test]
    fn test_not_a_repository_is_empty() {
        let dir = tempdir().unwrap();
        assert!(changed_paths_or_empty(dir.path()).is_empty());
    }
}
