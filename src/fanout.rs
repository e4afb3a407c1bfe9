//! Rate-limited fan-out with a fixed-point retry loop.
//!
//! The executor repeatedly asks `get_entries` what is still outstanding, runs `process_one` on
//! every item (serially or on a rayon pool), and hands each chunk of outputs to `commit_chunk`,
//! which persists it so `get_entries` stops returning those items. Passes continue while a pass
//! shrinks the outstanding list; the first pass without net progress ends the loop and whatever
//! is left comes back as `missing`. Termination does not depend on errors being raised: some
//! callers report a failed item inside `OUT` and simply leave it uncommitted.
//!
//! # Failure semantics
//!
//! An `Err` from `process_one` is **not** isolated to its item. It aborts the current chunk and
//! is returned from [`RateLimitedFanOutExecutor::execute`]; outputs of that chunk are not
//! committed, earlier committed chunks stay committed. Callers that want per-item isolation must
//! catch inside `process_one` and encode the failure in `OUT`.
//!
//! # Rate limiting
//!
//! With `max_calls_per_sec > 0` each call gets a minimum duration of
//! `degree_of_parallelism / max_calls_per_sec` (parallel) or `1 / max_calls_per_sec` (serial);
//! a call that returns sooner sleeps for the remainder. The aggregate call rate therefore stays
//! at or below the ceiling.

use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::thread;
use std::time::{Duration, Instant};

use crate::utils::config::FanOutConsts;

#[derive(Clone, Debug)]
pub struct FanOutOpts {
    pub chunk_size: usize,
    /// Ceiling on `process_one` calls per second; `0.0` disables throttling.
    pub max_calls_per_sec: f64,
    pub degree_of_parallelism: usize,
    pub execute_serial: bool,
}

impl Default for FanOutOpts {
    fn default() -> Self {
        Self {
            chunk_size: FanOutConsts::CHUNK_SIZE,
            max_calls_per_sec: 0.0,
            degree_of_parallelism: FanOutConsts::PARALLELISM,
            execute_serial: false,
        }
    }
}

impl FanOutOpts {
    fn workers(&self) -> usize {
        if self.execute_serial {
            1
        } else {
            self.degree_of_parallelism.max(1)
        }
    }

    /// Minimum wall time per call, None when unthrottled.
    pub fn call_budget(&self) -> Option<Duration> {
        if self.max_calls_per_sec <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.workers() as f64 / self.max_calls_per_sec,
        ))
    }
}

/// The three functions an executor is built from.
pub struct FanOutFns<IN, OUT, R> {
    /// Currently outstanding items; must reflect everything committed so far.
    pub get_entries: Box<dyn FnMut() -> Result<Vec<IN>>>,
    /// Work on one item. May encode failure in `OUT`; an `Err` aborts the run.
    pub process_one: Box<dyn Fn(IN) -> Result<OUT> + Send + Sync>,
    /// Persist a chunk of outputs so `get_entries` no longer returns their items.
    pub commit_chunk: Box<dyn FnMut(Vec<OUT>) -> Result<Vec<R>>>,
}

/// Everything committed, plus the items still outstanding when progress stopped.
#[derive(Debug)]
pub struct FanOutOutcome<IN, R> {
    pub results: Vec<R>,
    pub missing: Vec<IN>,
    /// Passes over a non-empty outstanding list.
    pub passes: usize,
}

pub struct RateLimitedFanOutExecutor<IN, OUT, R> {
    opts: FanOutOpts,
    fns: FanOutFns<IN, OUT, R>,
}

fn throttled<IN, OUT>(
    process_one: &(dyn Fn(IN) -> Result<OUT> + Send + Sync),
    item: IN,
    budget: Option<Duration>,
) -> Result<OUT> {
    let start = Instant::now();
    let out = process_one(item);
    if let Some(budget) = budget {
        let elapsed = start.elapsed();
        if elapsed < budget {
            thread::sleep(budget - elapsed);
        }
    }
    out
}

impl<IN, OUT, R> RateLimitedFanOutExecutor<IN, OUT, R>
where
    IN: Send,
    OUT: Send,
{
    pub fn new(opts: FanOutOpts, fns: FanOutFns<IN, OUT, R>) -> Self {
        Self { opts, fns }
    }

    fn process_chunk(
        &self,
        chunk: Vec<IN>,
        pool: Option<&rayon::ThreadPool>,
        budget: Option<Duration>,
    ) -> Result<Vec<OUT>> {
        let process_one = self.fns.process_one.as_ref();
        match pool {
            None => chunk
                .into_iter()
                .map(|item| throttled(process_one, item, budget))
                .collect(),
            Some(pool) => pool.install(|| {
                chunk
                    .into_par_iter()
                    .map(|item| throttled(process_one, item, budget))
                    .collect()
            }),
        }
    }

    /// Run passes until one makes no net progress. Returns committed results and leftovers.
    pub fn execute(&mut self) -> Result<FanOutOutcome<IN, R>> {
        let chunk_size = self.opts.chunk_size.max(1);
        let budget = self.opts.call_budget();
        let pool = if self.opts.execute_serial {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.opts.workers())
                    .build()
                    .context("build fan-out pool")?,
            )
        };

        let mut results = Vec::new();
        let mut passes = 0_usize;
        let mut missing = (self.fns.get_entries)()?;
        while !missing.is_empty() {
            let before = missing.len();
            passes += 1;
            debug!("fan-out pass {}: {} outstanding", passes, before);

            let mut pending = missing.into_iter();
            loop {
                let chunk: Vec<IN> = pending.by_ref().take(chunk_size).collect();
                if chunk.is_empty() {
                    break;
                }
                let processed = self.process_chunk(chunk, pool.as_ref(), budget)?;
                results.extend((self.fns.commit_chunk)(processed)?);
            }

            missing = (self.fns.get_entries)()?;
            if missing.len() >= before {
                break;
            }
        }
        if !missing.is_empty() {
            info!(
                "fan-out stopped after {} passes with {} items unresolved",
                passes,
                missing.len()
            );
        }
        Ok(FanOutOutcome {
            results,
            missing,
            passes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_scales_with_workers() {
        let parallel = FanOutOpts {
            max_calls_per_sec: 10.0,
            degree_of_parallelism: 4,
            ..FanOutOpts::default()
        };
        assert_eq!(parallel.call_budget(), Some(Duration::from_millis(400)));

        let serial = FanOutOpts {
            execute_serial: true,
            ..parallel
        };
        assert_eq!(serial.call_budget(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn zero_rate_means_unthrottled() {
        assert_eq!(FanOutOpts::default().call_budget(), None);
    }
}
