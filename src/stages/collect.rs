//! `collect` stage: gather each matched entry into `target/<entry-name>`.
//!
//! Invalidated by new subfolders: entries already listed in the target's `meta.inf` are carried
//! over from the existing target instead of being read from the source again.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::pipeline::{Process, pending_tasks, recover_crashed_runs};
use crate::task::{MergeBySubfoldersTask, MergePaths, SubfolderMerge, Task};
use crate::types::{ProcessOpts, RunContext};
use crate::utils::config::META_INF_FILENAME;
use crate::utils::pathstar::SourceEntry;
use crate::utils::tempfiles::copy_tree;

#[derive(Clone, Copy, Debug, Default)]
pub struct CopyMerge;

impl SubfolderMerge for CopyMerge {
    fn do_execution(
        &self,
        new_entries: &[SourceEntry],
        target_path: &Path,
        tmp_path: &Path,
    ) -> Result<()> {
        if target_path.is_dir() {
            copy_tree(target_path, tmp_path, &[META_INF_FILENAME])?;
        }
        for entry in new_entries {
            copy_tree(&entry.path, &tmp_path.join(&entry.name), &[])?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct CollectSpec {
    pub roots: Vec<PathBuf>,
    pub pathfilter: String,
    pub target: PathBuf,
}

pub struct CollectProcess {
    name: String,
    specs: Vec<CollectSpec>,
    opts: ProcessOpts,
    ctx: RunContext,
}

impl CollectProcess {
    pub fn new(name: impl Into<String>, specs: Vec<CollectSpec>, opts: ProcessOpts, ctx: &RunContext) -> Self {
        let name = name.into();
        Self {
            ctx: ctx.for_stage(&name),
            name,
            specs,
            opts,
        }
    }

    pub fn build_tasks(&self) -> Vec<MergeBySubfoldersTask<CopyMerge>> {
        self.specs
            .iter()
            .map(|spec| {
                MergeBySubfoldersTask::new(
                    MergePaths::new(spec.roots.clone(), &spec.pathfilter, spec.target.clone()),
                    CopyMerge,
                    self.ctx.clone(),
                )
            })
            .collect()
    }
}

impl Process for CollectProcess {
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
