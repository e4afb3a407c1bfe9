//! Shared layout and publish logic for tasks that merge several sources into one target.
//!
//! All writes go to the sibling `tmp_<target-name>` directory; `commit` replaces the target
//! with it in one rename. On disk the target is therefore either absent or a complete,
//! previously committed result, and `target/meta.inf` records what went into it.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::task::Task;
use crate::task::subfolders::parse_entry_list;
use crate::utils::config::META_INF_FILENAME;
use crate::utils::tempfiles::{fresh_dir, publish_tmp, remove_dir_best_effort, tmp_path_for};

/// A task that only needs to run when its sources changed since the last commit.
pub trait MergeTask: Task {
    /// Compare the sources with `target/meta.inf`. A task run without this check makes it in
    /// `prepare()`; when the target is up to date the run is a no-op that succeeds.
    fn has_work_todo(&mut self) -> Result<bool>;

    fn target_path(&self) -> &Path;
}

/// Source roots, filter and the target/scratch/meta locations of one merge task.
#[derive(Clone, Debug)]
pub struct MergePaths {
    pub root_paths: Vec<PathBuf>,
    pub pathfilter: String,
    pub target_path: PathBuf,
    pub tmp_path: PathBuf,
    pub meta_inf_file: PathBuf,
}

impl MergePaths {
    pub fn new(root_paths: Vec<PathBuf>, pathfilter: impl Into<String>, target_path: PathBuf) -> Self {
        let tmp_path = tmp_path_for(&target_path);
        let meta_inf_file = target_path.join(META_INF_FILENAME);
        Self {
            root_paths,
            pathfilter: pathfilter.into(),
            target_path,
            tmp_path,
            meta_inf_file,
        }
    }

    /// `meta.inf` inside the scratch directory; becomes `meta_inf_file` after publish.
    pub fn tmp_meta_inf_file(&self) -> PathBuf {
        self.tmp_path.join(META_INF_FILENAME)
    }

    /// Committed `meta.inf` contents, or None when the target was never published.
    pub fn read_meta_inf(&self) -> Result<Option<String>> {
        if !self.meta_inf_file.is_file() {
            return Ok(None);
        }
        fs::read_to_string(&self.meta_inf_file)
            .map(Some)
            .with_context(|| format!("read {}", self.meta_inf_file.display()))
    }

    pub fn write_tmp_meta_inf(&self, contents: &str) -> Result<()> {
        let path = self.tmp_meta_inf_file();
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Fresh, empty scratch directory.
    pub fn prepare_tmp(&self) -> Result<()> {
        fresh_dir(&self.tmp_path)
    }

    /// Replace the target with the scratch directory. Returns the target path as payload.
    pub fn commit(&self) -> Result<String> {
        publish_tmp(&self.tmp_path, &self.target_path)?;
        Ok(self.target_path.display().to_string())
    }

    /// Drop the scratch directory; the target is left untouched. Returns the error as payload.
    pub fn exception(&self, err: &anyhow::Error) -> String {
        remove_dir_best_effort(&self.tmp_path);
        format!("{err:#}")
    }
}

/// What a target's `meta.inf` says about it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TargetStatus {
    pub target: PathBuf,
    pub published: bool,
    /// Set for timestamp-policy targets.
    pub timestamp: Option<f64>,
    /// Set for subfolder-policy targets.
    pub entries: Vec<String>,
}

/// Read `target/meta.inf` and classify it: a single float is a timestamp, anything else an entry list.
pub fn inspect_target(target: &Path) -> Result<TargetStatus> {
    let paths = MergePaths::new(Vec::new(), "*", target.to_path_buf());
    let raw = paths.read_meta_inf()?;
    let published = raw.is_some();
    let raw = raw.unwrap_or_default();
    let (timestamp, entries) = match raw.trim().parse::<f64>() {
        Ok(ts) => (Some(ts), Vec::new()),
        Err(_) => (None, parse_entry_list(&raw).into_iter().collect()),
    };
    Ok(TargetStatus {
        target: target.to_path_buf(),
        published,
        timestamp,
        entries,
    })
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.published {
            return write!(f, "{}: never published", self.target.display());
        }
        match self.timestamp {
            Some(ts) => write!(f, "{}: sources as of {}", self.target.display(), ts),
            None => {
                writeln!(f, "{}: {} entries", self.target.display(), self.entries.len())?;
                for e in &self.entries {
                    writeln!(f, "  {e}")?;
                }
                Ok(())
            }
        }
    }
}
