use anyhow::Result;
use fsdflow::{FanOutFns, FanOutOpts, RateLimitedFanOutExecutor};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Outstanding items live in a shared set; committing removes the successes.
type Store = Arc<Mutex<BTreeSet<u32>>>;

fn store(n: u32) -> Store {
    Arc::new(Mutex::new((0..n).collect()))
}

/// Outputs are `Ok(item)` or `Err(message)`, mirroring call sites that report failure in-band.
fn executor(
    store: &Store,
    opts: FanOutOpts,
    process_one: impl Fn(u32) -> Result<Result<u32, String>> + Send + Sync + 'static,
) -> RateLimitedFanOutExecutor<u32, Result<u32, String>, u32> {
    let get_store = Arc::clone(store);
    let commit_store = Arc::clone(store);
    RateLimitedFanOutExecutor::new(
        opts,
        FanOutFns {
            get_entries: Box::new(move || Ok(get_store.lock().unwrap().iter().copied().collect())),
            process_one: Box::new(process_one),
            commit_chunk: Box::new(move |outs: Vec<Result<u32, String>>| {
                let done: Vec<u32> = outs.into_iter().filter_map(|o| o.ok()).collect();
                let mut s = commit_store.lock().unwrap();
                for d in &done {
                    s.remove(d);
                }
                Ok(done)
            }),
        },
    )
}

fn serial() -> FanOutOpts {
    FanOutOpts {
        execute_serial: true,
        chunk_size: 3,
        ..FanOutOpts::default()
    }
}

// --- convergence ---

#[test]
fn test_everything_succeeds_in_one_pass() {
    let s = store(10);
    let outcome = executor(&s, FanOutOpts::default(), |i| Ok(Ok(i)))
        .execute()
        .unwrap();
    assert_eq!(outcome.passes, 1);
    assert!(outcome.missing.is_empty());
    let mut results = outcome.results;
    results.sort();
    assert_eq!(results, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_identical_failures_stop_after_one_pass() {
    let s = store(5);
    let outcome = executor(&s, serial(), |_| Ok(Err("server says no".into())))
        .execute()
        .unwrap();
    assert_eq!(outcome.passes, 1);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.missing, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_one_item_per_pass_takes_n_passes() {
    let s = store(4);
    // Every get_entries call grants exactly one success for the following pass.
    let allowance = Arc::new(AtomicUsize::new(0));
    let get_store = Arc::clone(&s);
    let commit_store = Arc::clone(&s);
    let grant = Arc::clone(&allowance);
    let spend = Arc::clone(&allowance);
    let mut exec = RateLimitedFanOutExecutor::new(
        serial(),
        FanOutFns {
            get_entries: Box::new(move || {
                grant.store(1, Ordering::SeqCst);
                Ok(get_store.lock().unwrap().iter().copied().collect())
            }),
            process_one: Box::new(move |i: u32| {
                let granted = spend
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |a| a.checked_sub(1))
                    .is_ok();
                Ok(if granted { Ok(i) } else { Err("throttled".to_string()) })
            }),
            commit_chunk: Box::new(move |outs: Vec<Result<u32, String>>| {
                let done: Vec<u32> = outs.into_iter().filter_map(|o| o.ok()).collect();
                let mut s = commit_store.lock().unwrap();
                for d in &done {
                    s.remove(d);
                }
                Ok(done)
            }),
        },
    );

    let outcome = exec.execute().unwrap();
    assert_eq!(outcome.passes, 4);
    assert!(outcome.missing.is_empty());
    assert_eq!(outcome.results, vec![0, 1, 2, 3]);
}

#[test]
fn test_partial_progress_keeps_looping() {
    let s = store(6);
    // Odd items fail on first sight, succeed the second time.
    let seen = Arc::new(Mutex::new(BTreeSet::new()));
    let seen_w = Arc::clone(&seen);
    let outcome = executor(&s, serial(), move |i| {
        let first_time = seen_w.lock().unwrap().insert(i);
        if i % 2 == 1 && first_time {
            Ok(Err("flaky".into()))
        } else {
            Ok(Ok(i))
        }
    })
    .execute()
    .unwrap();
    assert_eq!(outcome.passes, 2);
    assert!(outcome.missing.is_empty());
    assert_eq!(outcome.results.len(), 6);
}

#[test]
fn test_nothing_outstanding_means_no_pass() {
    let s = store(0);
    let outcome = executor(&s, FanOutOpts::default(), |i| Ok(Ok(i)))
        .execute()
        .unwrap();
    assert_eq!(outcome.passes, 0);
    assert!(outcome.results.is_empty());
}

// --- failure semantics ---

#[test]
fn test_process_error_propagates_and_keeps_earlier_chunks() {
    let s = store(6);
    let err = executor(&s, serial(), |i| {
        if i == 4 {
            anyhow::bail!("connection reset");
        }
        Ok(Ok(i))
    })
    .execute()
    .unwrap_err();
    assert!(err.to_string().contains("connection reset"));
    // First chunk (0,1,2) was committed, the failing chunk (3,4,5) was not.
    assert_eq!(
        s.lock().unwrap().iter().copied().collect::<Vec<_>>(),
        vec![3, 4, 5]
    );
}

// --- rate limiting ---

#[test]
fn test_serial_rate_limit_spaces_calls() {
    let s = store(5);
    let opts = FanOutOpts {
        max_calls_per_sec: 20.0,
        ..serial()
    };
    let start = Instant::now();
    let outcome = executor(&s, opts, |i| Ok(Ok(i))).execute().unwrap();
    assert!(outcome.missing.is_empty());
    // 5 calls at >= 50 ms each.
    assert!(start.elapsed() >= Duration::from_millis(240));
}

#[test]
fn test_parallel_rate_limit_bounds_aggregate_rate() {
    let s = store(8);
    let opts = FanOutOpts {
        max_calls_per_sec: 40.0,
        degree_of_parallelism: 4,
        chunk_size: 8,
        execute_serial: false,
    };
    let start = Instant::now();
    executor(&s, opts, |i| Ok(Ok(i))).execute().unwrap();
    // Each call holds its slot for 4/40 s = 100 ms; 8 calls over at most 4 slots.
    assert!(start.elapsed() >= Duration::from_millis(190));
}
