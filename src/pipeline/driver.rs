//! Runs an ordered list of processes, one after the other.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::time::Instant;

use crate::pipeline::process::Process;
use crate::types::TaskResults;
use crate::utils::Colors;

/// One failed task as reported after a stage.
#[derive(Clone, Debug, Serialize)]
pub struct FailureSummary {
    pub task: String,
    pub payload: String,
}

/// Outcome of one process run.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessSummary {
    pub name: String,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FailureSummary>,
    pub elapsed_ms: u128,
}

impl ProcessSummary {
    pub fn from_results(name: &str, results: &TaskResults, started: Instant) -> Self {
        Self {
            name: name.to_string(),
            succeeded: results.succeeded().len(),
            failed: results.failed().len(),
            failures: results
                .failed()
                .iter()
                .map(|r| FailureSummary {
                    task: r.task.to_string(),
                    payload: r.payload.clone(),
                })
                .collect(),
            elapsed_ms: started.elapsed().as_millis(),
        }
    }
}

/// Log a stage summary; each failure goes out at warn.
pub fn log_summary(summary: &ProcessSummary) {
    if summary.succeeded + summary.failed == 0 {
        info!(
            "{}: {}",
            summary.name,
            Colors::colorize(Colors::SKIPPED, "nothing to do")
        );
        return;
    }
    info!(
        "{}: {} | {} ({} ms)",
        summary.name,
        Colors::colorize(Colors::SUCCESS, &format!("Succeeded: {}", summary.succeeded)),
        Colors::colorize(Colors::FAILED, &format!("Failed: {}", summary.failed)),
        summary.elapsed_ms
    );
    for f in &summary.failures {
        warn!("  {}: {}", f.task, f.payload);
    }
}

/// Run `processes` in literal order. A failed task never stops the run; an `Err` from a
/// process (bad configuration, unreadable roots) does, naming the stage.
pub fn execute_processes(processes: &mut [Box<dyn Process>]) -> Result<Vec<ProcessSummary>> {
    let mut summaries = Vec::with_capacity(processes.len());
    for process in processes.iter_mut() {
        let started = Instant::now();
        let name = process.name().to_string();
        info!("stage '{}' starting", name);
        let results = process
            .process()
            .with_context(|| format!("stage '{name}'"))?;
        let summary = ProcessSummary::from_results(&name, &results, started);
        log_summary(&summary);
        summaries.push(summary);
    }
    Ok(summaries)
}
