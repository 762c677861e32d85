//! Parallel runner on a bounded rayon thread pool.
//!
//! Every input gets exactly one slot in the output, in input order, whatever
//! order the tasks finish in. Failed, timed-out and panicked tasks keep their
//! slot as a [`TaskError`].

use crate::error::{TaskError, TaskResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound on the default worker count.
pub const MAX_DEFAULT_WORKERS: usize = 32;

/// Options for parallel runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParallelOptions {
    /// Maximum worker threads. `None` uses [`default_worker_count`].
    pub max_workers: Option<usize>,
    /// Per-task timeout, measured from when a worker starts the task.
    pub timeout: Option<Duration>,
    /// Return the first error instead of collecting it.
    pub raise_on_error: bool,
}

impl ParallelOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max workers (at least 1).
    #[must_use]
    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n.max(1));
        self
    }

    /// Set the per-task timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set raise-on-error.
    #[must_use]
    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    /// Workers to use for `tasks` tasks.
    pub fn worker_count(&self, tasks: usize) -> usize {
        self.max_workers
            .unwrap_or_else(default_worker_count)
            .min(tasks)
            .max(1)
    }
}

/// `min(32, cores + 4)`.
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    (cores + 4).min(MAX_DEFAULT_WORKERS)
}

enum Event<T, E> {
    Started { index: usize, at: Instant },
    Finished { index: usize, result: TaskResult<T, E> },
}

/// Run `function` once per parameter set on a pool of worker threads.
///
/// Parameters are collected before anything is dispatched; an empty input
/// returns an empty vector without starting a pool. The returned vector has
/// one slot per input in input order.
///
/// With `raise_on_error` set, the first error to arrive (in completion
/// order) is returned as `Err`. Queued tasks are then dropped and running
/// ones are left to finish in the background; their results are discarded.
/// A timed-out task is likewise left running.
///
/// # Example
///
/// ```rust
/// use ham_runtime::{run_parallel, ParallelOptions};
///
/// let results = run_parallel(
///     |n: u64| if n == 0 { Err("zero") } else { Ok(100 / n) },
///     [1u64, 0, 4],
///     &ParallelOptions::new().max_workers(2),
/// )
/// .unwrap();
///
/// assert_eq!(results.len(), 3);
/// assert_eq!(*results[0].as_ref().unwrap(), 100);
/// assert!(results[1].is_err());
/// assert_eq!(*results[2].as_ref().unwrap(), 25);
/// ```
pub fn run_parallel<I, A, T, E, F>(
    function: F,
    parameters: I,
    options: &ParallelOptions,
) -> Result<Vec<TaskResult<T, E>>, TaskError<E>>
where
    I: IntoIterator,
    I::Item: Into<A>,
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
{
    run_parallel_shared(Arc::new(function), parameters, options)
}

/// [`run_parallel`] with a function that is already shared.
pub fn run_parallel_shared<I, A, T, E, F>(
    function: Arc<F>,
    parameters: I,
    options: &ParallelOptions,
) -> Result<Vec<TaskResult<T, E>>, TaskError<E>>
where
    I: IntoIterator,
    I::Item: Into<A>,
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
{
    let jobs: Vec<A> = parameters.into_iter().map(Into::into).collect();
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let total = jobs.len();
    let workers = options.worker_count(total);
    debug!(tasks = total, workers, timeout = ?options.timeout, "Dispatching parallel run");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("ham-worker-{}", i))
        .build()
        .map_err(|e| {
            warn!(workers, error = %e, "Failed to build worker pool");
            TaskError::Pool(e.to_string())
        })?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<Event<T, E>>();
    let track_start = options.timeout.is_some();

    for (index, args) in jobs.into_iter().enumerate() {
        let cancelled = Arc::clone(&cancelled);
        let function = Arc::clone(&function);
        let tx = tx.clone();
        pool.spawn(move || {
            if cancelled.load(Ordering::Acquire) {
                return;
            }
            if track_start && tx.send(Event::Started { index, at: Instant::now() }).is_err() {
                return;
            }
            let result = execute(index, &*function, args);
            let _ = tx.send(Event::Finished { index, result });
        });
    }
    drop(tx);

    let collected = collect(rx, total, options);
    if collected.is_err() {
        cancelled.store(true, Ordering::Release);
    }
    collected
}

fn execute<A, T, E, F>(index: usize, function: &F, args: A) -> TaskResult<T, E>
where
    F: Fn(A) -> Result<T, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| function(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(TaskError::Failed(error)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(index, message = %message, "Parallel task panicked");
            Err(TaskError::Panicked { index, message })
        }
    }
}

/// Fill result slots from worker events until every slot is decided.
fn collect<T, E>(
    rx: mpsc::Receiver<Event<T, E>>,
    total: usize,
    options: &ParallelOptions,
) -> Result<Vec<TaskResult<T, E>>, TaskError<E>> {
    let mut slots: Vec<Option<TaskResult<T, E>>> = (0..total).map(|_| None).collect();
    let mut deadlines: Vec<Option<Instant>> = vec![None; total];
    let mut remaining = total;

    while remaining > 0 {
        let next_deadline = deadlines.iter().flatten().min().copied();
        let event = match next_deadline {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(event) => Some(event),
                Err(_) => break,
            },
        };

        match event {
            Some(Event::Started { index, at }) => {
                if slots[index].is_none() {
                    // An unrepresentable deadline never fires.
                    deadlines[index] = options.timeout.and_then(|t| at.checked_add(t));
                }
            }
            Some(Event::Finished { index, result }) => {
                deadlines[index] = None;
                if slots[index].is_some() {
                    debug!(index, "Discarding result of timed-out task");
                    continue;
                }
                match result {
                    Err(error) if options.raise_on_error => return Err(error),
                    result => slots[index] = Some(result),
                }
                remaining -= 1;
            }
            None => {}
        }

        if let Some(timeout) = options.timeout {
            let now = Instant::now();
            for index in 0..total {
                if deadlines[index].is_some_and(|d| d <= now) {
                    deadlines[index] = None;
                    warn!(
                        index,
                        timeout_ms = timeout.as_millis() as u64,
                        "Parallel task timed out"
                    );
                    let error = TaskError::Timeout { index, timeout };
                    if options.raise_on_error {
                        return Err(error);
                    }
                    slots[index] = Some(Err(error));
                    remaining -= 1;
                }
            }
        }
    }

    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(TaskError::Panicked {
                    index,
                    message: "worker exited without reporting a result".to_string(),
                })
            })
        })
        .collect())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ham_core::{Arguments, HamError, ParameterSet};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_empty_input() {
        let results = run_parallel(
            |n: u32| Ok::<_, String>(n),
            Vec::<u32>::new(),
            &ParallelOptions::new(),
        )
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_order_matches_input_regardless_of_completion() {
        // Later inputs finish first.
        let inputs: Vec<u64> = (0..8).collect();
        let results = run_parallel(
            |n: u64| {
                thread::sleep(Duration::from_millis((8 - n) * 5));
                Ok::<_, String>(n * 10)
            },
            inputs.clone(),
            &ParallelOptions::new().max_workers(8),
        )
        .unwrap();

        assert_eq!(results.len(), inputs.len());
        for (i, slot) in results.iter().enumerate() {
            assert_eq!(*slot.as_ref().unwrap(), inputs[i] * 10);
        }
    }

    #[test]
    fn test_failures_keep_their_slot() {
        let results = run_parallel(
            |n: i32| if n % 2 == 0 { Ok(n) } else { Err(format!("odd {}", n)) },
            [0i32, 1, 2, 3],
            &ParallelOptions::new().max_workers(2),
        )
        .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(*results[0].as_ref().unwrap(), 0);
        assert_eq!(results[1].as_ref().unwrap_err().task_error().unwrap(), "odd 1");
        assert_eq!(*results[2].as_ref().unwrap(), 2);
        assert!(results[3].is_err());
    }

    #[test]
    fn test_dispatch_rule() {
        fn describe(args: Arguments) -> Result<String, HamError> {
            Ok(serde_json::to_string(&args)?)
        }

        let results = run_parallel(
            describe,
            vec![
                ParameterSet::from(json!({"a": 1, "b": 2})),
                ParameterSet::positional([json!(1), json!(2)]),
                ParameterSet::from(json!(5)),
            ],
            &ParallelOptions::new(),
        )
        .unwrap();

        let rendered: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            rendered,
            vec![
                r#"{"keyword":{"a":1,"b":2}}"#,
                r#"{"positional":[1,2]}"#,
                r#"{"positional":[5]}"#,
            ]
        );
    }

    #[test]
    fn test_worker_pool_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

        let results = run_parallel(
            move |_: u8| {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                r.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(())
            },
            vec![0u8; 12],
            &ParallelOptions::new().max_workers(3),
        )
        .unwrap();

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_timeout_fills_slot() {
        let results = run_parallel(
            |ms: u64| {
                thread::sleep(Duration::from_millis(ms));
                Ok::<_, String>(ms)
            },
            [1u64, 500, 1],
            &ParallelOptions::new()
                .max_workers(3)
                .timeout(Duration::from_millis(50)),
        )
        .unwrap();

        assert_eq!(*results[0].as_ref().unwrap(), 1);
        let err = results[1].as_ref().unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, TaskError::Timeout { index: 1, .. }));
        assert_eq!(*results[2].as_ref().unwrap(), 1);
    }

    #[test]
    fn test_panic_is_recorded() {
        let results = run_parallel(
            |n: u32| {
                if n == 1 {
                    panic!("bad task {}", n);
                }
                Ok::<_, String>(n)
            },
            [0u32, 1, 2],
            &ParallelOptions::new().max_workers(1),
        )
        .unwrap();

        match &results[1] {
            Err(TaskError::Panicked { index, message }) => {
                assert_eq!(*index, 1);
                assert_eq!(message, "bad task 1");
            }
            other => panic!("expected panic slot, got {:?}", other),
        }
        // The single worker survived the panic.
        assert_eq!(*results[2].as_ref().unwrap(), 2);
    }

    #[test]
    fn test_raise_on_error_returns_without_waiting() {
        let started = Instant::now();
        let result = run_parallel(
            |n: u64| {
                if n == 0 {
                    Err("fast failure".to_string())
                } else {
                    thread::sleep(Duration::from_millis(n));
                    Ok(n)
                }
            },
            [2_000u64, 0],
            &ParallelOptions::new().max_workers(2).raise_on_error(true),
        );

        let err = result.unwrap_err();
        assert_eq!(err.task_error().map(String::as_str), Some("fast failure"));
        assert!(started.elapsed() < Duration::from_millis(1_000));
    }

    #[test]
    fn test_raise_on_error_skips_queued_tasks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = run_parallel(
            move |n: u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err("first fails".to_string())
                } else {
                    thread::sleep(Duration::from_millis(5));
                    Ok(n)
                }
            },
            0u32..50,
            &ParallelOptions::new().max_workers(1).raise_on_error(true),
        );

        assert!(result.is_err());
        thread::sleep(Duration::from_millis(50));
        assert!(calls.load(Ordering::SeqCst) < 50);
    }

    #[test]
    fn test_raise_on_timeout() {
        let result = run_parallel(
            |ms: u64| {
                thread::sleep(Duration::from_millis(ms));
                Ok::<_, String>(ms)
            },
            [300u64],
            &ParallelOptions::new()
                .timeout(Duration::from_millis(20))
                .raise_on_error(true),
        );
        assert!(result.unwrap_err().is_timeout());
    }

    #[test]
    fn test_worker_count() {
        let options = ParallelOptions::new().max_workers(16);
        assert_eq!(options.worker_count(4), 4);
        assert_eq!(options.worker_count(100), 16);
        assert_eq!(ParallelOptions::new().max_workers(0).worker_count(5), 1);
        assert!(ParallelOptions::new().worker_count(1_000) <= MAX_DEFAULT_WORKERS);
    }

    #[test]
    fn test_unbounded_timeout_never_fires() {
        let results = run_parallel(
            |n: u32| Ok::<_, String>(n),
            [1u32, 2],
            &ParallelOptions::new().timeout(Duration::MAX),
        )
        .unwrap();

        let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_queued_tasks_do_not_spend_their_timeout() {
        // The second task waits ~30ms for the only worker; with a 50ms budget
        // counted from dispatch it would time out.
        let results = run_parallel(
            |ms: u64| {
                thread::sleep(Duration::from_millis(ms));
                Ok::<_, String>(ms)
            },
            [30u64, 30],
            &ParallelOptions::new()
                .max_workers(1)
                .timeout(Duration::from_millis(50)),
        )
        .unwrap();

        assert_eq!(*results[0].as_ref().unwrap(), 30);
        assert_eq!(*results[1].as_ref().unwrap(), 30);
    }

    #[test]
    fn test_workers_are_named() {
        let results = run_parallel(
            |_: u8| Ok::<_, String>(thread::current().name().map(str::to_string)),
            [0u8, 1],
            &ParallelOptions::new().max_workers(2),
        )
        .unwrap();

        for slot in results {
            let name = slot.unwrap().unwrap_or_default();
            assert!(name.starts_with("ham-worker-"), "unexpected thread name {:?}", name);
        }
    }
}
