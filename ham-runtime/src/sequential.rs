//! Sequential runner.
//!
//! Unlike the parallel runner, failed calls are dropped from the output
//! rather than kept in their slot, so the result can be shorter than the
//! input.

use std::fmt::Display;
use std::future::Future;
use tracing::debug;

/// Call `function` once per parameter set, in order, on the calling thread.
///
/// With `raise_on_error` unset, failing calls are skipped and the run
/// continues; with it set, the first error is returned and the remaining
/// parameter sets are not called.
///
/// # Example
///
/// ```rust
/// use ham_runtime::run_sequentially;
///
/// let halves = run_sequentially(
///     |n: i32| if n % 2 == 0 { Ok(n / 2) } else { Err(format!("{} is odd", n)) },
///     [2, 3, 8],
///     false,
/// );
/// assert_eq!(halves.unwrap(), vec![1, 4]);
/// ```
pub fn run_sequentially<I, A, T, E, F>(
    mut function: F,
    parameters: I,
    raise_on_error: bool,
) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Into<A>,
    F: FnMut(A) -> Result<T, E>,
    E: Display,
{
    let mut results = Vec::new();
    for (index, params) in parameters.into_iter().enumerate() {
        match function(params.into()) {
            Ok(value) => results.push(value),
            Err(error) if raise_on_error => {
                debug!(index, error = %error, "Sequential task failed, aborting run");
                return Err(error);
            }
            Err(error) => {
                debug!(index, error = %error, "Sequential task failed, skipping");
            }
        }
    }
    Ok(results)
}

/// Async counterpart of [`run_sequentially`]: each task is awaited before
/// the next one starts.
pub async fn run_sequentially_async<I, A, T, E, F, Fut>(
    mut function: F,
    parameters: I,
    raise_on_error: bool,
) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Into<A>,
    F: FnMut(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut results = Vec::new();
    for (index, params) in parameters.into_iter().enumerate() {
        match function(params.into()).await {
            Ok(value) => results.push(value),
            Err(error) if raise_on_error => {
                debug!(index, error = %error, "Sequential task failed, aborting run");
                return Err(error);
            }
            Err(error) => {
                debug!(index, error = %error, "Sequential task failed, skipping");
            }
        }
    }
    Ok(results)
}
