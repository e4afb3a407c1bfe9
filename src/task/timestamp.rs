//! Merge invalidated by modification time.
//!
//! The newest mtime of any file or directory under the roots is compared to the float stored in
//! `meta.inf`. This policy tracks nothing finer, so when something changed the whole filtered
//! source set is merged again.

use anyhow::{Context, Result};
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::tools::mtime_secs;
use crate::task::{MergePaths, MergeTask, Task};
use crate::types::RunContext;
use crate::utils::pathstar::matching_paths;

/// Merge logic plugged into [`MergeByTimestampTask`].
pub trait TimestampMerge: Send {
    /// Write the merged result of `paths_to_process` into `tmp_path`.
    fn do_execution(&self, paths_to_process: &[PathBuf], tmp_path: &Path) -> Result<()>;
}

/// Newest modification time (seconds since epoch) of anything under `roots`,
/// ignoring files whose name is in `skip_files`. None when no root exists.
pub fn max_modification_time(roots: &[PathBuf], skip_files: &[String]) -> Result<Option<f64>> {
    let mut newest: Option<f64> = None;
    for root in roots.iter().filter(|r| r.exists()) {
        for entry in WalkDir::new(root) {
            let entry = entry.with_context(|| format!("walk {}", root.display()))?;
            if entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| skip_files.iter().any(|s| s == n))
            {
                continue;
            }
            let meta = entry
                .metadata()
                .with_context(|| format!("read metadata of {}", entry.path().display()))?;
            let t = mtime_secs(&meta);
            newest = Some(newest.map_or(t, |n| n.max(t)));
        }
    }
    Ok(newest)
}

/// Pending work computed by `has_work_todo`.
struct Plan {
    last_modified: f64,
    paths_to_process: Vec<PathBuf>,
}

pub struct MergeByTimestampTask<M: TimestampMerge> {
    pub paths: MergePaths,
    pub skip_files: Vec<String>,
    merger: M,
    ctx: RunContext,
    plan: Option<Plan>,
}

impl<M: TimestampMerge> MergeByTimestampTask<M> {
    pub fn new(paths: MergePaths, skip_files: Vec<String>, merger: M, ctx: RunContext) -> Self {
        Self {
            paths,
            skip_files,
            merger,
            ctx,
            plan: None,
        }
    }

    /// Timestamp recorded by the last commit.
    pub fn committed_timestamp(&self) -> Result<Option<f64>> {
        let Some(raw) = self.paths.read_meta_inf()? else {
            return Ok(None);
        };
        let ts = raw.trim().parse::<f64>().with_context(|| {
            format!(
                "{} does not hold a timestamp: {:?}",
                self.paths.meta_inf_file.display(),
                raw.trim()
            )
        })?;
        Ok(Some(ts))
    }

    /// Paths the next execution will merge (empty until `has_work_todo` found work).
    pub fn paths_to_process(&self) -> &[PathBuf] {
        self.plan
            .as_ref()
            .map(|p| p.paths_to_process.as_slice())
            .unwrap_or(&[])
    }

    fn compute_plan(&self) -> Result<Option<Plan>> {
        let Some(last_modified) = max_modification_time(&self.paths.root_paths, &self.skip_files)?
        else {
            debug!("{} {}: no source root exists", self.ctx, self);
            return Ok(None);
        };
        let stale = match self.committed_timestamp()? {
            None => true,
            Some(committed) => last_modified > committed,
        };
        if !stale {
            return Ok(None);
        }
        let paths_to_process = matching_paths(&self.paths.root_paths, &self.paths.pathfilter)?;
        Ok(Some(Plan {
            last_modified,
            paths_to_process,
        }))
    }
}

impl<M: TimestampMerge> fmt::Display for MergeByTimestampTask<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge-by-timestamp {}", self.paths.target_path.display())
    }
}

impl<M: TimestampMerge> MergeTask for MergeByTimestampTask<M> {
    fn has_work_todo(&mut self) -> Result<bool> {
        self.plan = self.compute_plan()?;
        Ok(self.plan.is_some())
    }

    fn target_path(&self) -> &Path {
        &self.paths.target_path
    }
}

impl<M: TimestampMerge> Task for MergeByTimestampTask<M> {
    fn prepare(&mut self) -> Result<()> {
        if self.plan.is_none() {
            self.plan = self.compute_plan()?;
        }
        if self.plan.is_none() {
            debug!("{} {}: up to date, nothing to prepare", self.ctx, self);
            return Ok(());
        }
        self.paths.prepare_tmp()
    }

    fn execute(&mut self) -> Result<()> {
        // Up to date: no scratch dir exists and the target stays as committed.
        let Some(plan) = self.plan.as_ref() else {
            return Ok(());
        };
        info!(
            "{} merging {} source paths into {}",
            self.ctx,
            plan.paths_to_process.len(),
            self.paths.target_path.display()
        );
        self.merger
            .do_execution(&plan.paths_to_process, &self.paths.tmp_path)?;
        self.paths.write_tmp_meta_inf(&plan.last_modified.to_string())
    }

    fn commit(&mut self) -> Result<String> {
        if self.plan.is_none() {
            return Ok(format!("{} unchanged", self.paths.target_path.display()));
        }
        self.paths.commit()
    }

    fn exception(&mut self, err: &anyhow::Error) -> String {
        self.paths.exception(err)
    }
}
