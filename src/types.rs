//! Public types shared by tasks, processes and the driver.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::task::Task;
use crate::utils::config::DEFAULT_CHUNK_SIZE;

/// Outcome of one task run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TaskResultState {
    Success,
    Failed,
}

/// One finished task with the payload returned by `commit()` or `exception()`.
pub struct TaskResult {
    pub task: Box<dyn Task>,
    pub state: TaskResultState,
    pub payload: String,
}

impl fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult")
            .field("task", &self.task.to_string())
            .field("state", &self.state)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Results of one process run, grouped by state.
///
/// Indexing with a state that has no results yields an empty slice:
/// `results[TaskResultState::Failed].len() == 0` when nothing failed.
#[derive(Debug, Default)]
pub struct TaskResults {
    by_state: HashMap<TaskResultState, Vec<TaskResult>>,
}

impl TaskResults {
    pub fn push(&mut self, result: TaskResult) {
        self.by_state.entry(result.state).or_default().push(result);
    }

    pub fn get(&self, state: TaskResultState) -> &[TaskResult] {
        self.by_state.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn succeeded(&self) -> &[TaskResult] {
        self.get(TaskResultState::Success)
    }

    pub fn failed(&self) -> &[TaskResult] {
        self.get(TaskResultState::Failed)
    }

    pub fn len(&self) -> usize {
        self.by_state.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<TaskResultState> for TaskResults {
    type Output = [TaskResult];

    fn index(&self, state: TaskResultState) -> &Self::Output {
        self.get(state)
    }
}

impl FromIterator<TaskResult> for TaskResults {
    fn from_iter<I: IntoIterator<Item = TaskResult>>(iter: I) -> Self {
        let mut results = TaskResults::default();
        for r in iter {
            results.push(r);
        }
        results
    }
}

/// How a process runs its tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// One task after another on the calling thread. Small sets and debugging.
    Serial,
    /// Fixed set of OS worker threads fed through a channel. I/O-bound tasks (network, disk).
    #[default]
    ThreadPool,
    /// Dedicated rayon pool sized to the cores. CPU-bound tasks.
    ComputePool,
}

/// Per-process execution options.
#[derive(Clone, Debug)]
pub struct ProcessOpts {
    pub strategy: ExecutionStrategy,
    /// Tasks handed to the pool at once; a chunk completes before the next starts.
    pub chunk_size: usize,
    /// Pool width. When None, derived from the strategy (I/O default or core count).
    pub workers: Option<usize>,
    /// Show a progress bar over finished tasks.
    pub verbose: bool,
}

impl Default for ProcessOpts {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: None,
            verbose: false,
        }
    }
}

impl ProcessOpts {
    pub fn with_strategy(strategy: ExecutionStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Force serial execution when `execute_serial` is set; keep the strategy otherwise.
    pub fn execute_serial(mut self, execute_serial: bool) -> Self {
        if execute_serial {
            self.strategy = ExecutionStrategy::Serial;
        }
        self
    }
}

/// Correlation context injected into tasks at construction: which run, which stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub stage: String,
}

impl RunContext {
    /// New context with a run id derived from the wall clock and process id.
    pub fn new(stage: impl Into<String>) -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            run_id: format!("{:x}-{}", secs, std::process::id()),
            stage: stage.into(),
        }
    }

    /// Same run, different stage.
    pub fn for_stage(&self, stage: impl Into<String>) -> Self {
        Self {
            run_id: self.run_id.clone(),
            stage: stage.into(),
        }
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.run_id, self.stage)
    }
}
