//! The unit of work and the runner that drives it through its lifecycle.
//!
//! A task is driven `Created → Prepared → Executed → Committed | Failed` by [`run_task`]:
//!
//! 1. `prepare()`: side effects only, safe to repeat after a crash.
//! 2. `execute()`: the actual work.
//! 3. `commit()`: publish, returns the success payload.
//!
//! Any error (or panic) in 1-3 calls `exception(err)` instead, whose payload is recorded as
//! [`TaskResultState::Failed`]. A task never retries itself; retrying is left to the process
//! or the fan-out executor.

pub mod merge;
pub mod subfolders;
pub mod timestamp;

use anyhow::{Result, anyhow};
use log::{debug, warn};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::types::{TaskResult, TaskResultState};

pub use merge::{MergePaths, MergeTask};
pub use subfolders::{MergeBySubfoldersTask, SubfolderMerge};
pub use timestamp::{MergeByTimestampTask, TimestampMerge};

/// One unit of work. Owned by its process for one run and moved to exactly one worker.
/// `Display` names the task in logs and summaries.
pub trait Task: Send + fmt::Display {
    fn prepare(&mut self) -> Result<()>;

    fn execute(&mut self) -> Result<()>;

    /// Publish the result; the returned payload is recorded with the success.
    fn commit(&mut self) -> Result<String>;

    /// Clean up after a failure in any earlier step. Must leave no partial artifacts behind.
    fn exception(&mut self, err: &anyhow::Error) -> String;
}

/// Lifecycle position reached by a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStage {
    Created,
    Prepared,
    Executed,
    Committed,
    Failed,
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStage::Created => "created",
            TaskStage::Prepared => "prepared",
            TaskStage::Executed => "executed",
            TaskStage::Committed => "committed",
            TaskStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Run `f`, turning a panic into an error so it is handled like any other task failure.
fn guarded<T>(step: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(anyhow!("panic in {}: {}", step, msg))
        }
    }
}

fn advance(task: &mut dyn Task, stage: &mut TaskStage) -> Result<String> {
    guarded("prepare", || task.prepare())?;
    *stage = TaskStage::Prepared;
    guarded("execute", || task.execute())?;
    *stage = TaskStage::Executed;
    let payload = guarded("commit", || task.commit())?;
    *stage = TaskStage::Committed;
    Ok(payload)
}

/// Drive one task through prepare/execute/commit. Never returns an error: failures become
/// a [`TaskResultState::Failed`] result carrying the `exception()` payload.
pub fn run_task(mut task: Box<dyn Task>) -> TaskResult {
    let mut stage = TaskStage::Created;
    match advance(task.as_mut(), &mut stage) {
        Ok(payload) => {
            debug!("{}: {}", task, stage);
            TaskResult {
                task,
                state: TaskResultState::Success,
                payload,
            }
        }
        Err(err) => {
            warn!("{} failed after reaching '{}': {:#}", task, stage, err);
            let payload = match guarded("exception", || Ok(task.exception(&err))) {
                Ok(p) => p,
                Err(e) => format!("{err:#} (cleanup also failed: {e:#})"),
            };
            debug!("{}: {}", task, TaskStage::Failed);
            TaskResult {
                task,
                state: TaskResultState::Failed,
                payload,
            }
        }
    }
}
