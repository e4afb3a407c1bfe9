use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;

use crate::pipeline::strategy::run_tasks;
use crate::task::{MergeTask, Task};
use crate::types::{ProcessOpts, TaskResults};
use crate::utils::tempfiles::remove_stale_scratch;

/// Drives the tasks of one pipeline stage.
///
/// Tasks of one process may run in any order. Work that depends on other work belongs in a
/// later process, never in a sibling task.
pub trait Process {
    fn name(&self) -> &str;

    fn opts(&self) -> &ProcessOpts;

    /// Runs before `calculate_tasks`; the place for crash recovery.
    fn pre_process(&mut self) -> Result<()> {
        Ok(())
    }

    /// The full task list of this run. Errors here are not task failures; they abort the process.
    fn calculate_tasks(&mut self) -> Result<Vec<Box<dyn Task>>>;

    fn post_process(&mut self, _results: &TaskResults) -> Result<()> {
        Ok(())
    }

    /// pre_process → calculate_tasks → run tasks → group by state → post_process.
    fn process(&mut self) -> Result<TaskResults> {
        self.pre_process()?;
        let tasks = self.calculate_tasks()?;
        info!("{}: {} tasks to run", self.name(), tasks.len());
        let results = run_tasks(tasks, self.opts(), self.name())?;
        self.post_process(&results)?;
        Ok(results)
    }
}

/// Keep only merge tasks whose sources changed since their last commit.
pub fn pending_tasks<T>(tasks: Vec<T>) -> Result<Vec<Box<dyn Task>>>
where
    T: MergeTask + 'static,
{
    let mut pending: Vec<Box<dyn Task>> = Vec::new();
    for mut task in tasks {
        if task.has_work_todo()? {
            pending.push(Box::new(task));
        } else {
            debug!("{}: up to date", task.target_path().display());
        }
    }
    Ok(pending)
}

/// Delete the scratch directories an interrupted run left next to `targets`. Run it before any
/// `has_work_todo()` so an up-to-date target with a stray sibling is cleaned too.
pub fn recover_crashed_runs(targets: &[PathBuf]) -> Result<usize> {
    let mut deleted = 0;
    for target in targets {
        if remove_stale_scratch(target)? {
            deleted += 1;
        }
    }
    if deleted > 0 {
        info!("removed {} scratch directories left by an interrupted run", deleted);
    }
    Ok(deleted)
}
