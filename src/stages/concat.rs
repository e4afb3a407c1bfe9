//! `concat` stage: append every file of every matched source into one target tree.
//!
//! For sources `2010q1/BS/num.txt` and `2010q2/BS/num.txt` under pathfilter `*/BS`, the target
//! gets a single `num.txt` holding both, in source order. Invalidated by timestamp, so any
//! change below the roots rebuilds the whole target.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::tools::is_os_hidden_file;
use crate::pipeline::{Process, pending_tasks, recover_crashed_runs};
use crate::task::{MergeByTimestampTask, MergePaths, Task, TimestampMerge};
use crate::types::{ProcessOpts, RunContext};
use crate::utils::config::META_INF_FILENAME;

/// Append `src` to `dst`. When `skip_header` and `dst` already has content, the first line of
/// `src` is dropped.
pub fn append_file(src: &Path, dst: &Path, skip_header: bool) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let has_content = fs::metadata(dst).map(|m| m.len() > 0).unwrap_or(false);
    let mut reader =
        BufReader::new(File::open(src).with_context(|| format!("open {}", src.display()))?);
    if skip_header && has_content {
        let mut header = Vec::new();
        reader
            .read_until(b'\n', &mut header)
            .with_context(|| format!("read header of {}", src.display()))?;
    }
    let out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dst)
        .with_context(|| format!("open {} for append", dst.display()))?;
    let mut writer = BufWriter::new(out);
    let n = io::copy(&mut reader, &mut writer)
        .with_context(|| format!("append {} -> {}", src.display(), dst.display()))?;
    writer
        .flush()
        .with_context(|| format!("flush {}", dst.display()))?;
    Ok(n)
}

/// Byte-wise concatenation by relative path.
#[derive(Clone, Debug, Default)]
pub struct ConcatMerge {
    pub skip_repeated_header: bool,
}

impl TimestampMerge for ConcatMerge {
    fn do_execution(&self, paths_to_process: &[PathBuf], tmp_path: &Path) -> Result<()> {
        for source in paths_to_process {
            if source.is_file() {
                let Some(name) = source.file_name() else {
                    continue;
                };
                append_file(source, &tmp_path.join(name), self.skip_repeated_header)?;
                continue;
            }
            for entry in WalkDir::new(source).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walk {}", source.display()))?;
                if !entry.file_type().is_file()
                    || is_os_hidden_file(entry.path())
                    || entry.file_name() == META_INF_FILENAME
                {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(source)
                    .with_context(|| format!("relativize {}", entry.path().display()))?;
                append_file(entry.path(), &tmp_path.join(rel), self.skip_repeated_header)?;
            }
        }
        Ok(())
    }
}

/// One concat target and where its sources come from.
#[derive(Clone, Debug)]
pub struct ConcatSpec {
    pub roots: Vec<PathBuf>,
    pub pathfilter: String,
    pub target: PathBuf,
    pub skip_repeated_header: bool,
    pub skip_files: Vec<String>,
}

pub struct ConcatProcess {
    name: String,
    specs: Vec<ConcatSpec>,
    opts: ProcessOpts,
    ctx: RunContext,
}

impl ConcatProcess {
    pub fn new(name: impl Into<String>, specs: Vec<ConcatSpec>, opts: ProcessOpts, ctx: &RunContext) -> Self {
        let name = name.into();
        Self {
            ctx: ctx.for_stage(&name),
            name,
            specs,
            opts,
        }
    }

    /// Tasks for every spec, whether or not they have work.
    pub fn build_tasks(&self) -> Vec<MergeByTimestampTask<ConcatMerge>> {
        self.specs
            .iter()
            .map(|spec| {
                MergeByTimestampTask::new(
                    MergePaths::new(spec.roots.clone(), &spec.pathfilter, spec.target.clone()),
                    spec.skip_files.clone(),
                    ConcatMerge {
                        skip_repeated_header: spec.skip_repeated_header,
                    },
                    self.ctx.clone(),
                )
            })
            .collect()
    }
}

impl Process for ConcatProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn opts(&self) -> &ProcessOpts {
        &self.opts
    }

    fn pre_process(&mut self) -> Result<()> {
        let targets: Vec<PathBuf> = self.specs.iter().map(|s| s.target.clone()).collect();
        recover_crashed_runs(&targets)?;
        Ok(())
    }

    fn calculate_tasks(&mut self) -> Result<Vec<Box<dyn Task>>> {
        pending_tasks(self.build_tasks())
    }
}
