//! Parallel runner on the tokio runtime.

use crate::error::{TaskError, TaskResult};
use crate::parallel::ParallelOptions;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Run an async `function` once per parameter set, at most
/// `max_workers` at a time.
///
/// Same slot and ordering rules as [`run_parallel`](crate::run_parallel).
/// The per-task timeout starts once the task holds a permit; a timed-out
/// future is dropped. With `raise_on_error` set, the first error to arrive
/// is returned and every other task is aborted.
pub async fn run_parallel_async<I, A, T, E, F, Fut>(
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
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    run_parallel_async_shared(Arc::new(function), parameters, options).await
}

/// [`run_parallel_async`] with a function that is already shared.
pub async fn run_parallel_async_shared<I, A, T, E, F, Fut>(
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
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let jobs: Vec<A> = parameters.into_iter().map(Into::into).collect();
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let total = jobs.len();
    let workers = options.worker_count(total);
    let task_timeout = options.timeout;
    debug!(tasks = total, workers, timeout = ?task_timeout, "Dispatching async parallel run");

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();
    let mut indices = HashMap::with_capacity(total);

    for (index, args) in jobs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let function = Arc::clone(&function);
        let handle = set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let fut = function(args);
            let result = match task_timeout {
                Some(limit) => match timeout(limit, fut).await {
                    Ok(result) => result.map_err(TaskError::Failed),
                    Err(_) => Err(TaskError::Timeout {
                        index,
                        timeout: limit,
                    }),
                },
                None => fut.await.map_err(TaskError::Failed),
            };
            (index, result)
        });
        indices.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<TaskResult<T, E>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next_with_id().await {
        let (index, result) = match joined {
            Ok((_, (index, result))) => (index, result),
            Err(join_error) => {
                let Some(&index) = indices.get(&join_error.id()) else {
                    continue;
                };
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "task was cancelled".to_string()
                };
                warn!(index, message = %message, "Async parallel task panicked");
                (index, Err(TaskError::Panicked { index, message }))
            }
        };

        if let Err(TaskError::Timeout { .. }) = &result {
            warn!(index, "Async parallel task timed out");
        }
        match result {
            Err(error) if options.raise_on_error => {
                set.abort_all();
                return Err(error);
            }
            result => slots[index] = Some(result),
        }
    }

    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(TaskError::Panicked {
                    index,
                    message: "task finished without reporting a result".to_string(),
                })
            })
        })
        .collect())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&str>() {
            Ok(s) => (*s).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}
