mod common;

use anyhow::{Context, Result};
use fsdflow::pipeline::{Process, execute_processes};
use fsdflow::{ExecutionStrategy, ProcessOpts, Task, TaskResultState, TaskResults, run_tasks};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Fetches `source` into `target`, staging in `target.part`.
struct DownloadTask {
    source: PathBuf,
    target: PathBuf,
}

impl DownloadTask {
    fn part(&self) -> PathBuf {
        self.target.with_extension("part")
    }
}

impl fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "download {}", self.source.display())
    }
}

impl Task for DownloadTask {
    fn prepare(&mut self) -> Result<()> {
        fs::create_dir_all(self.target.parent().unwrap())?;
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        fs::copy(&self.source, self.part())
            .with_context(|| format!("fetch {}", self.source.display()))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<String> {
        fs::rename(self.part(), &self.target)?;
        Ok(self.target.display().to_string())
    }

    fn exception(&mut self, err: &anyhow::Error) -> String {
        let _ = fs::remove_file(self.part());
        format!("{err:#}")
    }
}

struct DownloadProcess {
    name: String,
    jobs: Vec<(PathBuf, PathBuf)>,
    opts: ProcessOpts,
    post_seen: Option<(usize, usize)>,
}

impl DownloadProcess {
    fn new(dir: &Path, names: &[&str], strategy: ExecutionStrategy) -> Self {
        let jobs = names
            .iter()
            .map(|n| (dir.join("remote").join(n), dir.join("local").join(n)))
            .collect();
        Self {
            name: "download".to_string(),
            jobs,
            opts: ProcessOpts::with_strategy(strategy),
            post_seen: None,
        }
    }
}

impl Process for DownloadProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn opts(&self) -> &ProcessOpts {
        &self.opts
    }

    fn calculate_tasks(&mut self) -> Result<Vec<Box<dyn Task>>> {
        Ok(self
            .jobs
            .iter()
            .filter(|(_, target)| !target.exists())
            .map(|(source, target)| -> Box<dyn Task> {
                Box::new(DownloadTask {
                    source: source.clone(),
                    target: target.clone(),
                })
            })
            .collect())
    }

    fn post_process(&mut self, results: &TaskResults) -> Result<()> {
        self.post_seen = Some((results.succeeded().len(), results.failed().len()));
        Ok(())
    }
}

fn remote(dir: &Path, names: &[&str]) {
    for n in names {
        common::write(&dir.join("remote").join(n), &format!("payload of {n}"));
    }
}

// --- end to end ---

#[test]
fn test_thread_pool_partitions_results_by_state() {
    let dir = TempDir::new().unwrap();
    remote(dir.path(), &["2010q1.zip", "2010q2.zip"]);
    let mut process = DownloadProcess::new(
        dir.path(),
        &["2010q1.zip", "2010q2.zip", "missing.zip"],
        ExecutionStrategy::ThreadPool,
    );

    let results = process.process().unwrap();

    assert_eq!(results[TaskResultState::Success].len(), 2);
    assert_eq!(results[TaskResultState::Failed].len(), 1);
    let failed = &results[TaskResultState::Failed][0];
    assert!(failed.task.to_string().contains("missing.zip"));
    assert!(!dir.path().join("local").join("missing.zip").exists());
    assert!(!dir.path().join("local").join("missing.part").exists());
    assert!(dir.path().join("local").join("2010q1.zip").exists());
    assert_eq!(process.post_seen, Some((2, 1)));
}

#[test]
fn test_every_strategy_gives_the_same_partition() {
    for strategy in [
        ExecutionStrategy::Serial,
        ExecutionStrategy::ThreadPool,
        ExecutionStrategy::ComputePool,
    ] {
        let dir = TempDir::new().unwrap();
        remote(dir.path(), &["a", "b", "c", "d"]);
        let mut process =
            DownloadProcess::new(dir.path(), &["a", "b", "c", "d", "x", "y"], strategy);
        let results = process.process().unwrap();
        assert_eq!(results.succeeded().len(), 4, "{strategy:?}");
        assert_eq!(results.failed().len(), 2, "{strategy:?}");
    }
}

#[test]
fn test_rerun_only_retries_what_is_missing() {
    let dir = TempDir::new().unwrap();
    remote(dir.path(), &["a", "b"]);
    let names = ["a", "b", "c"];

    let first = DownloadProcess::new(dir.path(), &names, ExecutionStrategy::ThreadPool)
        .process()
        .unwrap();
    assert_eq!(first.failed().len(), 1);

    remote(dir.path(), &["c"]);
    let second = DownloadProcess::new(dir.path(), &names, ExecutionStrategy::ThreadPool)
        .process()
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second.succeeded().len(), 1);
}

// --- chunking / pool sizing ---

#[test]
fn test_small_chunks_still_run_every_task() {
    let dir = TempDir::new().unwrap();
    let names: Vec<String> = (0..25).map(|i| format!("f{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    remote(dir.path(), &refs);

    for strategy in [ExecutionStrategy::ThreadPool, ExecutionStrategy::ComputePool] {
        let out = TempDir::new().unwrap();
        let tasks: Vec<Box<dyn Task>> = refs
            .iter()
            .map(|n| -> Box<dyn Task> {
                Box::new(DownloadTask {
                    source: dir.path().join("remote").join(n),
                    target: out.path().join(n),
                })
            })
            .collect();
        let opts = ProcessOpts {
            strategy,
            chunk_size: 4,
            workers: Some(3),
            verbose: false,
        };
        let results = run_tasks(tasks, &opts, "chunks").unwrap();
        assert_eq!(results.succeeded().len(), 25, "{strategy:?}");
    }
}

#[test]
fn test_empty_task_list() {
    let results = run_tasks(Vec::new(), &ProcessOpts::default(), "empty").unwrap();
    assert!(results.is_empty());
    assert!(results[TaskResultState::Failed].is_empty());
}

#[test]
fn test_execute_serial_overrides_strategy() {
    let opts = ProcessOpts::with_strategy(ExecutionStrategy::ComputePool).execute_serial(true);
    assert_eq!(opts.strategy, ExecutionStrategy::Serial);
    let opts = ProcessOpts::with_strategy(ExecutionStrategy::ComputePool).execute_serial(false);
    assert_eq!(opts.strategy, ExecutionStrategy::ComputePool);
}

// --- driver ---

struct Recorded {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail_calculate: bool,
    opts: ProcessOpts,
}

struct Noop(bool);

impl fmt::Display for Noop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "noop")
    }
}

impl Task for Noop {
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }
    fn execute(&mut self) -> Result<()> {
        if self.0 {
            anyhow::bail!("noop failed");
        }
        Ok(())
    }
    fn commit(&mut self) -> Result<String> {
        Ok(String::new())
    }
    fn exception(&mut self, err: &anyhow::Error) -> String {
        err.to_string()
    }
}

impl Process for Recorded {
    fn name(&self) -> &str {
        self.name
    }

    fn opts(&self) -> &ProcessOpts {
        &self.opts
    }

    fn pre_process(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(self.name);
        Ok(())
    }

    fn calculate_tasks(&mut self) -> Result<Vec<Box<dyn Task>>> {
        if self.fail_calculate {
            anyhow::bail!("bad configuration");
        }
        Ok(vec![Box::new(Noop(false)), Box::new(Noop(true))])
    }
}

fn recorded(
    name: &'static str,
    log: &Arc<Mutex<Vec<&'static str>>>,
    fail_calculate: bool,
) -> Box<dyn Process> {
    Box::new(Recorded {
        name,
        log: Arc::clone(log),
        fail_calculate,
        opts: ProcessOpts::default(),
    })
}

#[test]
fn test_driver_runs_in_order_past_task_failures() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut processes = vec![
        recorded("download", &log, false),
        recorded("transform", &log, false),
        recorded("index", &log, false),
    ];
    let summaries = execute_processes(&mut processes).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["download", "transform", "index"]);
    assert_eq!(summaries.len(), 3);
    for s in &summaries {
        assert_eq!((s.succeeded, s.failed), (1, 1));
        assert_eq!(s.failures[0].payload, "noop failed");
    }
}

#[test]
fn test_driver_stops_on_process_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut processes = vec![
        recorded("download", &log, false),
        recorded("transform", &log, true),
        recorded("index", &log, false),
    ];
    let err = execute_processes(&mut processes).unwrap_err();
    assert!(format!("{err:#}").contains("bad configuration"));
    assert_eq!(*log.lock().unwrap(), vec!["download", "transform"]);
}

#[test]
fn test_summaries_serialize() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut processes = vec![recorded("download", &log, false)];
    let summaries = execute_processes(&mut processes).unwrap();
    let json = serde_json::to_value(&summaries).unwrap();
    assert_eq!(json[0]["name"], "download");
    assert_eq!(json[0]["failed"], 1);
}
