use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::tools::is_tmp_artifact;
use crate::utils::config::TMP_PREFIX;

/// Sibling scratch directory for a target: `<parent>/tmp_<target-name>`.
pub fn tmp_path_for(target_path: &Path) -> PathBuf {
    let name = target_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());
    target_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{TMP_PREFIX}_{name}"))
}

/// Create an empty directory at `path`, removing whatever a previous attempt left there.
pub fn fresh_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("remove stale scratch dir {}", path.display()))?;
    }
    fs::create_dir_all(path).with_context(|| format!("create scratch dir {}", path.display()))
}

/// Remove `path` if present, logging instead of failing. Used on the failure path.
pub fn remove_dir_best_effort(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_dir_all(path)
    {
        warn!("could not remove {}: {}", path.display(), e);
    }
}

/// Publish `tmp_path` as `target_path`: drop the old target, then rename the scratch dir over it.
pub fn publish_tmp(tmp_path: &Path, target_path: &Path) -> Result<()> {
    if target_path.exists() {
        fs::remove_dir_all(target_path)
            .with_context(|| format!("remove previous target {}", target_path.display()))?;
    }
    fs::rename(tmp_path, target_path).with_context(|| {
        format!(
            "atomic rename scratch dir to target ({} -> {})",
            tmp_path.display(),
            target_path.display()
        )
    })
}

/// Remove the scratch directory of `target_path` left by an interrupted merge, if any.
/// Only `tmp_path_for(target_path)` is touched. Returns whether something was deleted.
pub fn remove_stale_scratch(target_path: &Path) -> Result<bool> {
    let scratch = tmp_path_for(target_path);
    if !scratch.is_dir() {
        return Ok(false);
    }
    debug!("deleting stray scratch dir {}", scratch.display());
    fs::remove_dir_all(&scratch).with_context(|| format!("delete {}", scratch.display()))?;
    Ok(true)
}

/// Delete the `<prefix>_*` directories directly inside `root` (scratch siblings of targets kept
/// there). Nothing below those children is inspected, so `tmp_*` folders inside committed targets
/// or source trees survive. An empty `root` means the working directory; a missing root deletes
/// nothing. Returns the number deleted.
pub fn delete_temp_folders(root: &Path, prefix: &str) -> Result<usize> {
    let root = if root.as_os_str().is_empty() {
        Path::new(".")
    } else {
        root
    };
    if !root.is_dir() {
        return Ok(0);
    }
    let mut stale = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("list {}", root.display()))?;
        if entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|n| is_tmp_artifact(n, prefix))
        {
            stale.push(entry.into_path());
        }
    }
    for dir in &stale {
        debug!("deleting stray scratch dir {}", dir.display());
        fs::remove_dir_all(dir).with_context(|| format!("delete {}", dir.display()))?;
    }
    Ok(stale.len())
}

/// Recursively copy `src` (file or directory) to `dst`, creating parents.
/// Entries named in `skip_names` at the top level of `src` are not copied.
pub fn copy_tree(src: &Path, dst: &Path, skip_names: &[&str]) -> Result<u64> {
    if src.is_file() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        return fs::copy(src, dst)
            .with_context(|| format!("copy {} -> {}", src.display(), dst.display()));
    }
    let mut copied = 0_u64;
    let mut it = WalkDir::new(src).sort_by_file_name().into_iter();
    while let Some(entry) = it.next() {
        let entry = entry.with_context(|| format!("walk {}", src.display()))?;
        if entry.depth() == 1
            && entry
                .file_name()
                .to_str()
                .is_some_and(|n| skip_names.contains(&n))
        {
            if entry.file_type().is_dir() {
                it.skip_current_dir();
            }
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let out = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&out).with_context(|| format!("create {}", out.display()))?;
        } else {
            copied += fs::copy(entry.path(), &out).with_context(|| {
                format!("copy {} -> {}", entry.path().display(), out.display())
            })?;
        }
    }
    Ok(copied)
}
