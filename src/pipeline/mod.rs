//! Process family: stage trait, execution strategies, ordered driver.

pub mod driver;
pub mod process;
pub mod strategy;

pub use driver::{FailureSummary, ProcessSummary, execute_processes, log_summary};
pub use process::{Process, pending_tasks, recover_crashed_runs};
pub use strategy::{default_workers, run_tasks, spawn_task_workers};
