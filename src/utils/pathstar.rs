//! Locating the wildcard entry inside a pathfilter.
//!
//! A pathfilter is a relative, `/`-separated pattern with exactly one segment containing `*`
//! (`"*"`, `"*/BS"`, `"20*.zip/BS/x"`). The segment holding the star names the entry; the
//! literal segments after it are fixed subfolders below every entry. Counting those lets us
//! recover the entry name from any concrete path, however deep the subfolders go.

use anyhow::{Context, Result, bail};
use std::path::{Component, Path, PathBuf};

use crate::engine::tools::{glob_match, is_candidate_entry};

/// Parsed pathfilter: literal segments before the star, the star segment, literal segments after.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathFilter {
    pub prefix: Vec<String>,
    pub star: String,
    pub suffix: Vec<String>,
}

impl PathFilter {
    pub fn parse(pathfilter: &str) -> Result<Self> {
        let segments: Vec<&str> = pathfilter
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        let stars: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contains('*'))
            .map(|(i, _)| i)
            .collect();
        let &[star_idx] = stars.as_slice() else {
            bail!(
                "pathfilter {:?} must contain exactly one '*' segment (found {})",
                pathfilter,
                stars.len()
            );
        };
        if segments.contains(&"..") {
            bail!("pathfilter {:?} must not contain '..'", pathfilter);
        }
        Ok(Self {
            prefix: segments[..star_idx].iter().map(|s| s.to_string()).collect(),
            star: segments[star_idx].to_string(),
            suffix: segments[star_idx + 1..]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }

    /// Number of literal segments after the star.
    pub fn star_position_from_end(&self) -> usize {
        self.suffix.len()
    }
}

/// Count of fixed segments following the `*` segment: `"*"` → 0, `"*/BS"` → 1, `"*/BS/x"` → 2.
pub fn star_position_from_end(pathfilter: &str) -> Result<usize> {
    Ok(PathFilter::parse(pathfilter)?.star_position_from_end())
}

/// Path component `n` segments from the end (`n = 0` is the file name itself).
pub fn name_at_star_position(path: &Path, n: usize) -> Option<String> {
    let names: Vec<&std::ffi::OsStr> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect();
    let idx = names.len().checked_sub(n + 1)?;
    Some(names[idx].to_string_lossy().into_owned())
}

/// One concrete source matched by a pathfilter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceEntry {
    /// Text the star segment matched; the stable key recorded in `meta.inf`.
    pub name: String,
    /// Full path including the fixed suffix segments.
    pub path: PathBuf,
}

/// All existing paths under `root` matching `pathfilter`, sorted by path.
///
/// Hidden OS files and `tmp_*` scratch directories never match the star segment.
/// A missing root or prefix yields an empty list.
pub fn matching_entries(root: &Path, pathfilter: &str) -> Result<Vec<SourceEntry>> {
    let filter = PathFilter::parse(pathfilter)?;
    let base = filter.prefix.iter().fold(root.to_path_buf(), |p, s| p.join(s));
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let read = std::fs::read_dir(&base).with_context(|| format!("list {}", base.display()))?;
    let mut found = Vec::new();
    for dir_entry in read {
        let dir_entry = dir_entry.with_context(|| format!("list {}", base.display()))?;
        let candidate = dir_entry.path();
        if !is_candidate_entry(&candidate) {
            continue;
        }
        let Some(name) = candidate.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !glob_match(&filter.star, name) {
            continue;
        }
        let name = name.to_string();
        let path = filter.suffix.iter().fold(candidate, |p, s| p.join(s));
        if path.exists() {
            found.push(SourceEntry { name, path });
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

/// Paths only, across several roots, in root order.
pub fn matching_paths(roots: &[PathBuf], pathfilter: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for root in roots {
        out.extend(matching_entries(root, pathfilter)?.into_iter().map(|e| e.path));
    }
    Ok(out)
}
