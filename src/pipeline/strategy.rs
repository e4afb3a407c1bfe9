//! Task runners: serial, OS thread pool, rayon compute pool.
//!
//! Tasks are handed out in chunks of `chunk_size`; a chunk finishes before the next one is
//! dispatched. No order is guaranteed between tasks of one chunk.

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded};
use log::debug;
use rayon::prelude::*;
use std::thread::{self, JoinHandle};

use crate::engine::progress::{ProgressBar, finish_bar, task_bar, tick};
use crate::task::{Task, run_task};
use crate::types::{ExecutionStrategy, ProcessOpts, TaskResult, TaskResults};
use crate::utils::config::WorkerThreadLimits;
use crate::utils::fd_limit::cap_workers;

/// Pool width for `strategy` before capping: explicit override, else I/O default or core count.
pub fn default_workers(strategy: ExecutionStrategy, requested: Option<usize>) -> usize {
    let limits = WorkerThreadLimits::current();
    let n = match (strategy, requested) {
        (ExecutionStrategy::Serial, _) => 1,
        (_, Some(n)) => n,
        (ExecutionStrategy::ThreadPool, None) => limits.io_threads,
        (ExecutionStrategy::ComputePool, None) => limits.all_threads,
    };
    n.max(limits.floor)
}

/// Single task worker: take tasks from `task_rx` until it closes, send each result on `result_tx`.
fn task_worker_loop(task_rx: Receiver<Box<dyn Task>>, result_tx: Sender<TaskResult>) {
    while let Ok(task) = task_rx.recv() {
        if result_tx.send(run_task(task)).is_err() {
            break;
        }
    }
}

/// Spawn `num_threads` task workers. Caller must drop its own `result_tx` so the result channel
/// closes when the last worker exits.
pub fn spawn_task_workers(
    task_rx: Receiver<Box<dyn Task>>,
    result_tx: &Sender<TaskResult>,
    num_threads: usize,
    label: &str,
) -> Result<Vec<JoinHandle<()>>> {
    (0..num_threads)
        .map(|i| {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("{label}-worker-{i}"))
                .spawn(move || task_worker_loop(task_rx, result_tx))
                .context("spawn task worker")
        })
        .collect()
}

fn run_serial(chunk: Vec<Box<dyn Task>>, bar: Option<&ProgressBar>, out: &mut TaskResults) {
    for task in chunk {
        out.push(run_task(task));
        tick(bar);
    }
}

fn run_thread_pool(
    chunk: Vec<Box<dyn Task>>,
    workers: usize,
    label: &str,
    bar: Option<&ProgressBar>,
    out: &mut TaskResults,
) -> Result<()> {
    let expected = chunk.len();
    let (task_tx, task_rx) = bounded::<Box<dyn Task>>(expected.max(1));
    let (result_tx, result_rx) = bounded::<TaskResult>(expected.max(1));
    for task in chunk {
        task_tx
            .send(task)
            .map_err(|_| anyhow!("task queue closed before dispatch"))?;
    }
    // Closing the queue lets workers exit once it is drained.
    drop(task_tx);

    let handles = spawn_task_workers(task_rx, &result_tx, workers.min(expected), label)?;
    drop(result_tx);

    let mut received = 0_usize;
    while let Ok(result) = result_rx.recv() {
        out.push(result);
        received += 1;
        tick(bar);
    }
    for h in handles {
        h.join()
            .map_err(|_| anyhow!("{label}: task worker panicked"))?;
    }
    if received != expected {
        return Err(anyhow!(
            "{label}: {} of {} task results lost",
            expected - received,
            expected
        ));
    }
    Ok(())
}

fn run_compute_pool(
    chunk: Vec<Box<dyn Task>>,
    pool: &rayon::ThreadPool,
    bar: Option<&ProgressBar>,
    out: &mut TaskResults,
) {
    let results: Vec<TaskResult> = pool.install(|| {
        chunk
            .into_par_iter()
            .map(|task| {
                let r = run_task(task);
                tick(bar);
                r
            })
            .collect()
    });
    for r in results {
        out.push(r);
    }
}

/// Run `tasks` with the strategy in `opts` and group the results by state.
/// Task failures are recorded, never returned as `Err`; `Err` means the runner itself broke.
pub fn run_tasks(tasks: Vec<Box<dyn Task>>, opts: &ProcessOpts, label: &str) -> Result<TaskResults> {
    let mut out = TaskResults::default();
    if tasks.is_empty() {
        return Ok(out);
    }
    let total = tasks.len();
    let chunk_size = opts.chunk_size.max(1);
    let workers = cap_workers(default_workers(opts.strategy, opts.workers), total.min(chunk_size));
    debug!(
        "{}: {} tasks, {:?}, {} workers, chunks of {}",
        label, total, opts.strategy, workers, chunk_size
    );

    let pool = match opts.strategy {
        ExecutionStrategy::ComputePool => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name({
                    let label = label.to_string();
                    move |i| format!("{label}-compute-{i}")
                })
                .build()
                .context("build compute pool")?,
        ),
        _ => None,
    };

    let bar = task_bar(opts.verbose, total, label);
    let mut remaining = tasks.into_iter();
    loop {
        let chunk: Vec<Box<dyn Task>> = remaining.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        match opts.strategy {
            ExecutionStrategy::Serial => run_serial(chunk, bar.as_ref(), &mut out),
            ExecutionStrategy::ThreadPool => {
                run_thread_pool(chunk, workers, label, bar.as_ref(), &mut out)?
            }
            ExecutionStrategy::ComputePool => {
                let pool = pool
                    .as_ref()
                    .ok_or_else(|| anyhow!("{label}: compute pool missing"))?;
                run_compute_pool(chunk, pool, bar.as_ref(), &mut out)
            }
        }
    }
    finish_bar(bar.as_ref());
    Ok(out)
}
