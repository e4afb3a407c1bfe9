//! Path and filter utilities

use anyhow::{Context, Result};
use std::fs::Metadata;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::utils::config::TMP_PREFIX;

/// Check if a file should be excluded based on OS-specific hidden files
pub fn is_os_hidden_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        match name {
            // macOS
            ".DS_Store" | ".AppleDouble" | ".LSOverride" => true,
            // Windows
            "Thumbs.db" | "ehthumbs.db" | "Desktop.ini" | "$RECYCLE.BIN" => true,
            // Linux
            ".directory" => true,
            _ => {
                // macOS resource fork files start with ._
                name.starts_with("._") || name.starts_with(".Trash-")
            }
        }
    } else {
        false
    }
}

/// True for `tmp_<name>` scratch directories left behind by an interrupted merge.
pub fn is_tmp_artifact(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('_'))
}

/// Returns true if a directory entry may be treated as a pipeline entry (not hidden, not a crash artifact).
pub fn is_candidate_entry(path: &Path) -> bool {
    if is_os_hidden_file(path) {
        return false;
    }
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => !is_tmp_artifact(name, TMP_PREFIX),
        None => false,
    }
}

/// Match one path segment against a pattern with `*` (any run) and `?` (one char).
/// Backtracks to the most recent `*` only, so it runs in O(pattern * text).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut last_star: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                last_star = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match last_star {
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    last_star = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Modification time as float seconds since the epoch (the `meta.inf` timestamp unit).
pub fn mtime_secs(meta: &Metadata) -> f64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Modification time of `path` as float seconds since the epoch.
pub fn path_mtime_secs(path: &Path) -> Result<f64> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("read metadata of {}", path.display()))?;
    Ok(mtime_secs(&meta))
}
