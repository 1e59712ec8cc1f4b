// src/core/paths.rs

use crate::constants::CONFIG_FILENAMES;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Errors raised while locating the repository.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Not in a Git repository (searched from '{0}').")]
    NotInRepository(PathBuf),
    #[error("Could not run git to locate the repository root: {0}")]
    GitUnavailable(#[source] std::io::Error),
}

/// Returns the top-level directory of the Git repository containing `start`.
///
/// This shells out to `git rev-parse --show-toplevel`, so it honours worktrees,
/// submodules and `GIT_DIR` the same way the user's own git does.
pub fn find_repo_root(start: &Path) -> Result<PathBuf, PathError> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(PathError::GitUnavailable)?;

    if !output.status.success() {
        return Err(PathError::NotInRepository(start.to_path_buf()));
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if root.is_empty() {
        return Err(PathError::NotInRepository(start.to_path_buf()));
    }
    log::debug!("Repository root resolved to '{}'", root);
    Ok(PathBuf::from(root))
}

/// Rebases `subdir` onto `root`.
///
/// A path that already lives under `root` is returned unchanged. Anything else has
/// its root and prefix components stripped and is joined onto `root`, so both
/// `"api"` and `"/api"` resolve to `<root>/api`.
pub fn rebase_path(root: &Path, subdir: &Path) -> PathBuf {
    if subdir.starts_with(root) {
        return subdir.to_path_buf();
    }
    let relative: PathBuf = subdir
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    root.join(relative)
}

/// Locates the configuration file for a run.
///
/// The repository root is checked first, in `CONFIG_FILENAMES` order. If none of
/// those exist, the tree below `cwd` is searched (hidden directories skipped,
/// entries sorted) and the first match for the highest-priority name wins.
pub fn find_config_file(repo_root: &Path, cwd: &Path) -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let candidate = repo_root.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let found: Vec<PathBuf> = WalkDir::new(cwd)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| CONFIG_FILENAMES.contains(&n))
        })
        .collect();

    CONFIG_FILENAMES.iter().find_map(|name| {
        found
            .iter()
            .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(*name))
            .cloned()
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
