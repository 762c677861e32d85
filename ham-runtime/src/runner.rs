//! Task runner bound to a [`RuntimeSettings`] context.

use crate::error::{TaskError, TaskResult};
use crate::parallel::{run_parallel_shared, ParallelOptions};
use crate::parallel_async::run_parallel_async_shared;
use crate::policy::RetryPolicy;
use crate::sequential::run_sequentially;
use ham_core::{LoggingConfig, RuntimeSettings};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Runs tasks with defaults taken from a [`RuntimeSettings`].
///
/// # Example
///
/// ```rust
/// use ham_core::RuntimeSettings;
/// use ham_runtime::TaskRunner;
///
/// let runner = TaskRunner::new(RuntimeSettings::new().max_workers(2)).unwrap();
/// let squares = runner.parallelize(|n: u32| Ok::<_, String>(n * n));
///
/// let results = squares(vec![1u32, 2, 3]).unwrap();
/// let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
/// assert_eq!(values, vec![1, 4, 9]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    settings: RuntimeSettings,
}

impl TaskRunner {
    /// Create a runner, validating the settings first.
    pub fn new(settings: RuntimeSettings) -> ham_core::Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Create a runner from `HAM_*` environment variables.
    pub fn from_env() -> ham_core::Result<Self> {
        Self::new(RuntimeSettings::from_env()?)
    }

    /// The settings in use.
    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Parallel options derived from the settings.
    pub fn parallel_options(&self) -> ParallelOptions {
        ParallelOptions {
            max_workers: self.settings.max_workers,
            timeout: self.settings.task_timeout,
            raise_on_error: self.settings.raise_on_error,
        }
    }

    /// A retry policy seeded from the retry settings.
    pub fn retry_policy<E, A>(&self) -> RetryPolicy<E, A> {
        RetryPolicy::from_settings(&self.settings.retry)
    }

    /// Logging configuration matching the debug and verbose flags.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_settings(&self.settings)
    }

    /// [`run_sequentially`](crate::run_sequentially) with the configured `raise_on_error`.
    pub fn run_sequentially<I, A, T, E, F>(&self, function: F, parameters: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Into<A>,
        F: FnMut(A) -> Result<T, E>,
        E: Display,
    {
        run_sequentially(function, parameters, self.settings.raise_on_error)
    }

    /// [`run_parallel`](crate::run_parallel) with the configured options.
    pub fn run_parallel<I, A, T, E, F>(
        &self,
        function: F,
        parameters: I,
    ) -> Result<Vec<TaskResult<T, E>>, TaskError<E>>
    where
        I: IntoIterator,
        I::Item: Into<A>,
        A: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        run_parallel_shared(Arc::new(function), parameters, &self.parallel_options())
    }

    /// [`run_parallel_async`](crate::run_parallel_async) with the configured options.
    pub async fn run_parallel_async<I, A, T, E, F, Fut>(
        &self,
        function: F,
        parameters: I,
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
        run_parallel_async_shared(Arc::new(function), parameters, &self.parallel_options()).await
    }

    /// Turn a per-item function into one over a batch, run sequentially.
    pub fn sequentialize<P, A, T, E, F>(
        &self,
        mut function: F,
    ) -> impl FnMut(Vec<P>) -> Result<Vec<T>, E>
    where
        P: Into<A>,
        F: FnMut(A) -> Result<T, E>,
        E: Display,
    {
        let raise_on_error = self.settings.raise_on_error;
        move |batch| run_sequentially(&mut function, batch, raise_on_error)
    }

    /// Turn a per-item function into one over a batch, run in parallel.
    pub fn parallelize<P, A, T, E, F>(
        &self,
        function: F,
    ) -> impl Fn(Vec<P>) -> Result<Vec<TaskResult<T, E>>, TaskError<E>>
    where
        P: Into<A>,
        A: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        let options = self.parallel_options();
        move |batch| run_parallel_shared(Arc::clone(&function), batch, &options)
    }
}
