//! Bounded worker pool with order-preserving output
//!
//! [`parallel_map`] applies a function to every element of a slice on a fixed
//! set of worker threads and returns the results in input order:
//! `output[i] == op(&input[i])` no matter which worker finished first.
//!
//! # Execution model
//!
//! ```text
//!                 ┌──────────┐
//!   0..N ───────▶ │ index    │ ──▶ worker 0 ──┐
//!                 │ channel  │ ──▶ worker 1 ──┼──▶ output[index]
//!                 └──────────┘ ──▶ worker k ──┘
//! ```
//!
//! - Worker count is `min(available parallelism, N)`, or the cap set in
//!   [`ParallelConfig`]. An empty input returns immediately without spawning.
//! - Every index `0..N` is queued up front; each worker claims the next
//!   unclaimed index, so `op` runs at most once per element.
//! - Each result goes straight into a pre-sized slot owned by its index. Slots
//!   are disjoint, so there is no merge step.
//! - The call blocks until every worker has drained the queue. There is no
//!   cancellation; claimed work always runs to completion.
//!
//! Workers are scoped threads, so `input` and `op` are borrowed rather than
//! required to be `'static`. `op` runs concurrently with itself on disjoint
//! elements and must be [`Sync`].
//!
//! A panic in `op` is not caught by [`parallel_map`] or [`parallel_for_each`].
//! Once all workers have stopped, the original panic payload is re-raised on
//! the calling thread. Use [`safe_parallel_map`] to get an error instead.

use std::num::NonZeroUsize;
use std::panic::resume_unwind;
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, trace};

use crate::safe::{safe_execute, SafeError};

/// Configuration for the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParallelConfig {
    /// Upper bound on worker threads
    /// Default: None (use available parallelism)
    pub max_workers: Option<usize>,
}

impl ParallelConfig {
    /// Create a configuration capped at `max_workers` threads
    pub fn with_workers(max_workers: usize) -> Self {
        Self {
            max_workers: Some(max_workers),
        }
    }

    /// Number of workers to spawn for `n` items
    ///
    /// Zero only when `n` is zero. A cap of zero is treated as one.
    pub fn worker_count(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let limit = self
            .max_workers
            .unwrap_or_else(available_parallelism)
            .max(1);
        limit.min(n)
    }
}

fn available_parallelism() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Output position written by the one worker that claimed its index
struct Slot<O>(Mutex<Option<O>>);

impl<O> Slot<O> {
    fn empty() -> Self {
        Self(Mutex::new(None))
    }

    fn fill(&self, value: O) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    fn into_inner(self) -> Option<O> {
        self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unwrap filled slots in index order
///
/// Every index is claimed by exactly one worker, so once the pool has joined
/// without a failure no slot is empty.
fn drain_slots<O>(slots: Vec<Slot<O>>) -> Vec<O> {
    let expected = slots.len();
    let values: Vec<O> = slots.into_iter().filter_map(Slot::into_inner).collect();
    debug_assert_eq!(values.len(), expected, "a result slot was never filled");
    values
}

/// Run `work(index, &input[index])` for every index on the worker pool
fn run_pool<I, W>(input: &[I], config: &ParallelConfig, work: W)
where
    I: Sync,
    W: Fn(usize, &I) + Sync,
{
    let n = input.len();
    let workers = config.worker_count(n);
    if workers == 0 {
        return;
    }

    let (sender, indices) = crossbeam_channel::bounded(n);
    for index in 0..n {
        // Capacity is n and the receiver is alive, so this never blocks or fails
        if sender.send(index).is_err() {
            break;
        }
    }
    drop(sender);

    debug!(items = n, workers, "starting worker pool");

    let panicked = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let indices = indices.clone();
                let work = &work;
                scope.spawn(move || {
                    trace!(worker, "worker starting");
                    for index in indices {
                        work(index, &input[index]);
                    }
                    trace!(worker, "worker exiting");
                })
            })
            .collect();

        // Join everyone before re-raising so no worker outlives the call
        let mut first_panic = None;
        for handle in handles {
            if let Err(payload) = handle.join() {
                first_panic.get_or_insert(payload);
            }
        }
        first_panic
    });

    if let Some(payload) = panicked {
        resume_unwind(payload);
    }
}

/// [`parallel_map`] with an explicit pool configuration
pub fn parallel_map_with<I, O, F>(input: &[I], config: &ParallelConfig, op: F) -> Vec<O>
where
    I: Sync,
    O: Send,
    F: Fn(&I) -> O + Sync,
{
    let slots: Vec<Slot<O>> = input.iter().map(|_| Slot::empty()).collect();
    run_pool(input, config, |index, item| slots[index].fill(op(item)));

    drain_slots(slots)
}

/// Apply `op` to every element concurrently, preserving input order
///
/// ```
/// use slicekit::parallel::parallel_map;
///
/// let doubled = parallel_map(&[1, 2, 3, 4], |x| x * 2);
/// assert_eq!(doubled, vec![2, 4, 6, 8]);
/// ```
pub fn parallel_map<I, O, F>(input: &[I], op: F) -> Vec<O>
where
    I: Sync,
    O: Send,
    F: Fn(&I) -> O + Sync,
{
    parallel_map_with(input, &ParallelConfig::default(), op)
}

/// [`parallel_for_each`] with an explicit pool configuration
pub fn parallel_for_each_with<I, F>(input: &[I], config: &ParallelConfig, op: F)
where
    I: Sync,
    F: Fn(&I) + Sync,
{
    run_pool(input, config, |_, item| op(item));
}

/// Run `op` once per element concurrently, for its side effects only
pub fn parallel_for_each<I, F>(input: &[I], op: F)
where
    I: Sync,
    F: Fn(&I) + Sync,
{
    parallel_for_each_with(input, &ParallelConfig::default(), op);
}

/// [`safe_parallel_map`] with an explicit pool configuration
pub fn safe_parallel_map_with<I, O, E, F>(
    input: &[I],
    config: &ParallelConfig,
    op: F,
) -> Result<Vec<O>, SafeError<E>>
where
    I: Sync,
    O: Send,
    E: Send,
    F: Fn(&I) -> Result<O, E> + Sync,
{
    let slots: Vec<Slot<O>> = input.iter().map(|_| Slot::empty()).collect();
    let failure: Mutex<Option<SafeError<E>>> = Mutex::new(None);

    run_pool(input, config, |index, item| match safe_execute(|| op(item)) {
        Ok(value) => slots[index].fill(value),
        Err(err) => {
            let mut first = failure.lock().unwrap_or_else(PoisonError::into_inner);
            if first.is_none() {
                *first = Some(err);
            }
        }
    });

    if let Some(err) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(err);
    }

    Ok(drain_slots(slots))
}

/// Parallel map where each call runs under its own recovery boundary
///
/// If any element errors or panics, the first failure to complete is
/// returned and no results are. Elements already queued still run; their
/// results are dropped.
pub fn safe_parallel_map<I, O, E, F>(input: &[I], op: F) -> Result<Vec<O>, SafeError<E>>
where
    I: Sync,
    O: Send,
    E: Send,
    F: Fn(&I) -> Result<O, E> + Sync,
{
    safe_parallel_map_with(input, &ParallelConfig::default(), op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::recover;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_parallel_map_simple() {
        let items = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let result = parallel_map(&items, |x| x * 2);
        assert_eq!(result, vec![2, 4, 6, 8, 10, 12, 14, 16, 18, 20]);
    }

    #[test]
    fn test_drain_slots_keeps_index_order() {
        let slots: Vec<Slot<&str>> = (0..3).map(|_| Slot::empty()).collect();
        slots[2].fill("c");
        slots[0].fill("a");
        slots[1].fill("b");
        assert_eq!(drain_slots(slots), vec!["a", "b", "c"]);
        assert_eq!(drain_slots(Vec::<Slot<u8>>::new()), Vec::<u8>::new());
    }

    #[test]
    fn test_parallel_map_preserves_positions() {
        for n in (0..200).chain([1_000, 10_000]) {
            let input: Vec<u64> = (0..n).collect();
            let expected: Vec<u64> = input.iter().map(|x| x * x + 1).collect();

            assert_eq!(parallel_map(&input, |x| x * x + 1), expected, "n={}", n);
            assert_eq!(
                parallel_map_with(&input, &ParallelConfig::with_workers(3), |x| x * x + 1),
                expected,
                "n={} with 3 workers",
                n
            );
        }
    }

    #[test]
    fn test_out_of_order_completion() {
        // Early indices sleep longest, so they finish last
        let input: Vec<u64> = (0..16).collect();
        let config = ParallelConfig::with_workers(4);
        let result = parallel_map_with(&input, &config, |x| {
            thread::sleep(Duration::from_millis(16 - x));
            x * 10
        });
        assert_eq!(result, (0..16).map(|x| x * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_input_never_calls() {
        let result: Vec<i32> = parallel_map(&[] as &[i32], |_| panic!("must not run"));
        assert!(result.is_empty());
        parallel_for_each(&[] as &[i32], |_| panic!("must not run"));
    }

    #[test]
    fn test_worker_count() {
        let config = ParallelConfig::with_workers(4);
        assert_eq!(config.worker_count(0), 0);
        assert_eq!(config.worker_count(2), 2);
        assert_eq!(config.worker_count(100), 4);
        assert_eq!(ParallelConfig::with_workers(0).worker_count(5), 1);

        let auto = ParallelConfig::default();
        assert_eq!(auto.worker_count(1), 1);
        assert!(auto.worker_count(10_000) >= 1);
    }

    #[test]
    fn test_worker_cap_respected() {
        let threads = Mutex::new(HashSet::new());
        let input: Vec<u32> = (0..200).collect();
        parallel_for_each_with(&input, &ParallelConfig::with_workers(2), |_| {
            threads.lock().unwrap().insert(thread::current().id());
        });
        let used = threads.into_inner().unwrap().len();
        assert!((1..=2).contains(&used), "used {} threads", used);
    }

    #[test]
    fn test_for_each_exactly_once() {
        let n = 5_000;
        let input: Vec<usize> = (0..n).collect();
        let hits: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();

        parallel_for_each(&input, |i| {
            hits[*i].fetch_add(1, Ordering::Relaxed);
        });

        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_for_each_sum() {
        let total = AtomicU64::new(0);
        parallel_for_each(&[1_u64, 2, 3, 4, 5, 6, 7, 8, 9, 10], |x| {
            total.fetch_add(*x, Ordering::Relaxed);
        });
        assert_eq!(total.into_inner(), 55);
    }

    #[test]
    fn test_output_only_needs_send() {
        // Cell is Send but not Sync
        let cells = parallel_map(&[1, 2, 3], |x| Cell::new(*x));
        let values: Vec<i32> = cells.iter().map(Cell::get).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_panic_payload_reaches_caller() {
        let err = recover(|| {
            parallel_map(&[1, 2, 3, 4], |x| {
                if *x == 3 {
                    panic!("element 3 failed");
                }
                *x
            })
        })
        .unwrap_err();
        assert_eq!(err.message(), "element 3 failed");
    }

    #[test]
    fn test_safe_parallel_map_ok() {
        let input: Vec<i32> = (0..500).collect();
        let result: Result<Vec<i32>, SafeError<String>> =
            safe_parallel_map(&input, |x| Ok(x - 1));
        assert_eq!(result.unwrap(), (-1..499).collect::<Vec<_>>());
    }

    #[test]
    fn test_safe_parallel_map_returned_error() {
        let calls = AtomicUsize::new(0);
        let input: Vec<i32> = (0..100).collect();
        let result = safe_parallel_map_with(&input, &ParallelConfig::with_workers(4), |x| {
            calls.fetch_add(1, Ordering::Relaxed);
            if *x == 42 {
                Err(format!("bad {}", x))
            } else {
                Ok(*x)
            }
        });

        assert_eq!(result, Err(SafeError::Failed("bad 42".to_string())));
        // No cancellation: every queued element still ran
        assert_eq!(calls.into_inner(), 100);
    }

    #[test]
    fn test_safe_parallel_map_panic() {
        let input = [1, 0, 2];
        let result: Result<Vec<i32>, SafeError<()>> = safe_parallel_map(&input, |x| Ok(10 / x));
        let err = result.unwrap_err();
        assert!(err.is_panic());
    }
}
