//! Merge invalidated by new entries.
//!
//! `meta.inf` lists the entry names already merged, one per line. Only entries matched now but
//! missing from that list are handed to the merger, which must fold in the existing target
//! content itself. Fits append-only sources such as one immutable archive per quarter.

use anyhow::Result;
use log::{debug, info};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::task::{MergePaths, MergeTask, Task};
use crate::types::RunContext;
use crate::utils::pathstar::{SourceEntry, matching_entries};

/// Merge logic plugged into [`MergeBySubfoldersTask`].
pub trait SubfolderMerge: Send {
    /// Write `target_path`'s current content plus the `new_entries` into `tmp_path`.
    /// `target_path` may not exist yet.
    fn do_execution(
        &self,
        new_entries: &[SourceEntry],
        target_path: &Path,
        tmp_path: &Path,
    ) -> Result<()>;
}

/// Parse a newline-joined entry list. Names are kept verbatim apart from a CR line ending,
/// since leading or trailing spaces are part of a directory name.
pub fn parse_entry_list(raw: &str) -> BTreeSet<String> {
    raw.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

struct Plan {
    merged_after: BTreeSet<String>,
    new_entries: Vec<SourceEntry>,
}

pub struct MergeBySubfoldersTask<M: SubfolderMerge> {
    pub paths: MergePaths,
    merger: M,
    ctx: RunContext,
    plan: Option<Plan>,
}

impl<M: SubfolderMerge> MergeBySubfoldersTask<M> {
    pub fn new(paths: MergePaths, merger: M, ctx: RunContext) -> Self {
        Self {
            paths,
            merger,
            ctx,
            plan: None,
        }
    }

    /// Entry names recorded by the last commit.
    pub fn already_merged(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .paths
            .read_meta_inf()?
            .map(|raw| parse_entry_list(&raw))
            .unwrap_or_default())
    }

    /// Entries the next execution will merge (empty until `has_work_todo` found work).
    pub fn paths_to_process(&self) -> &[SourceEntry] {
        self.plan
            .as_ref()
            .map(|p| p.new_entries.as_slice())
            .unwrap_or(&[])
    }

    fn compute_plan(&self) -> Result<Option<Plan>> {
        let merged = self.already_merged()?;
        let mut new_entries: Vec<SourceEntry> = Vec::new();
        for root in &self.paths.root_paths {
            for entry in matching_entries(root, &self.paths.pathfilter)? {
                if !merged.contains(&entry.name) && !new_entries.iter().any(|e| e.name == entry.name)
                {
                    new_entries.push(entry);
                }
            }
        }
        if new_entries.is_empty() {
            return Ok(None);
        }
        let mut merged_after = merged;
        merged_after.extend(new_entries.iter().map(|e| e.name.clone()));
        Ok(Some(Plan {
            merged_after,
            new_entries,
        }))
    }
}

impl<M: SubfolderMerge> fmt::Display for MergeBySubfoldersTask<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge-by-subfolders {}", self.paths.target_path.display())
    }
}

impl<M: SubfolderMerge> MergeTask for MergeBySubfoldersTask<M> {
    fn has_work_todo(&mut self) -> Result<bool> {
        self.plan = self.compute_plan()?;
        Ok(self.plan.is_some())
    }

    fn target_path(&self) -> &Path {
        &self.paths.target_path
    }
}

impl<M: SubfolderMerge> Task for MergeBySubfoldersTask<M> {
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
            "{} merging {} new entries into {}",
            self.ctx,
            plan.new_entries.len(),
            self.paths.target_path.display()
        );
        self.merger.do_execution(
            &plan.new_entries,
            &self.paths.target_path,
            &self.paths.tmp_path,
        )?;
        let listing: Vec<&str> = plan.merged_after.iter().map(String::as_str).collect();
        self.paths.write_tmp_meta_inf(&listing.join("\n"))
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
