//! fsdflow: incremental, crash-safe task pipeline for a growing on-disk data corpus.
//!
//! A pipeline is an ordered list of [`Process`]es run by [`execute_processes`]. Each process
//! computes its [`Task`]s up front and runs them serially, on an OS thread pool or on a rayon
//! compute pool; results come back grouped by [`TaskResultState`]. Merge tasks
//! ([`MergeByTimestampTask`], [`MergeBySubfoldersTask`]) only run when their sources changed and
//! publish by atomic rename, so a crashed run never leaves a half-written target behind.
//! [`RateLimitedFanOutExecutor`] covers the remaining shape of work: calling a rate-limited
//! service for every outstanding item until a pass makes no more progress.

pub mod engine;
pub mod fanout;
pub mod pipeline;
pub mod stages;
pub mod task;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use fanout::{FanOutFns, FanOutOpts, FanOutOutcome, RateLimitedFanOutExecutor};
pub use pipeline::{Process, ProcessSummary, execute_processes, pending_tasks, run_tasks};
pub use task::{
    MergeBySubfoldersTask, MergeByTimestampTask, MergePaths, MergeTask, SubfolderMerge, Task,
    TimestampMerge, run_task,
};
pub use utils::{delete_temp_folders, name_at_star_position, star_position_from_end};

/// Result alias used by public fsdflow API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The name the `*` of `pathfilter` matched in `path`.
///
/// ```ignore
/// assert_eq!(fsdflow::entry_name("root/2010q1.zip/BS".as_ref(), "*/BS")?, Some("2010q1.zip".into()));
/// ```
pub fn entry_name(path: &std::path::Path, pathfilter: &str) -> Result<Option<String>> {
    let n = star_position_from_end(pathfilter)?;
    Ok(name_at_star_position(path, n))
}
