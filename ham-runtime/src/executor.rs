//! Retry executor for running operations with retries.

use crate::error::RetryError;
use crate::policy::RetryPolicy;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// State of a retried call.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: u32,
    /// Last error message.
    pub last_error: Option<String>,
    /// Total time spent waiting.
    pub total_wait_time: Duration,
    /// History of attempts.
    pub history: Vec<AttemptInfo>,
}

/// Information about a single attempt.
#[derive(Debug, Clone)]
pub struct AttemptInfo {
    /// Attempt number (1-indexed).
    pub attempt: u32,
    /// Whether it succeeded.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Time waited after this attempt.
    pub wait_time: Duration,
}

/// Outcome of a failed attempt.
enum Next<E> {
    /// Retry after waiting; the error is handed back for the callbacks.
    Wait(Duration, E),
    Stop(RetryError<E>),
}

impl RetryState {
    fn record_success(&mut self) {
        self.history.push(AttemptInfo {
            attempt: self.attempt,
            success: true,
            error: None,
            wait_time: Duration::ZERO,
        });
    }

    fn record_failure<E: Display, A>(&mut self, policy: &RetryPolicy<E, A>, error: E) -> Next<E> {
        let message = error.to_string();
        self.last_error = Some(message.clone());

        if !policy.is_retryable(&error) {
            self.push_failure(message, Duration::ZERO);
            debug!(attempt = self.attempt, error = %error, "Error not retryable");
            return Next::Stop(RetryError::Failed {
                attempts: self.attempt,
                error,
            });
        }

        if self.attempt >= policy.max_attempts {
            self.push_failure(message, Duration::ZERO);
            warn!(
                attempts = self.attempt,
                error = %error,
                reraise = policy.reraise,
                "Retry attempts exhausted"
            );
            let attempts = self.attempt;
            return Next::Stop(if policy.reraise {
                RetryError::Failed { attempts, error }
            } else {
                RetryError::Exhausted {
                    attempts,
                    last_error: error,
                }
            });
        }

        let wait = policy.wait.calculate(self.attempt);
        self.total_wait_time += wait;
        self.push_failure(message, wait);
        debug!(
            attempt = self.attempt,
            wait_ms = wait.as_millis() as u64,
            error = %error,
            "Waiting before retry"
        );
        Next::Wait(wait, error)
    }

    fn push_failure(&mut self, message: String, wait_time: Duration) {
        self.history.push(AttemptInfo {
            attempt: self.attempt,
            success: false,
            error: Some(message),
            wait_time,
        });
    }
}

/// Run `operation` with retries, blocking the calling thread between attempts.
///
/// The operation borrows the current arguments. Before each wait the
/// policy's `before_retry` observer sees the error and its hook may replace
/// the arguments for the next attempt. Neither callback is retried.
///
/// # Example
///
/// ```rust
/// use ham_runtime::{retry, RetryPolicy};
/// use std::cell::Cell;
/// use std::time::Duration;
///
/// let calls = Cell::new(0);
/// let policy = RetryPolicy::new().initial_delay(Duration::from_millis(1));
/// let result = retry(&policy, 2, |n: &u32| {
///     calls.set(calls.get() + 1);
///     if calls.get() < 3 { Err("flaky") } else { Ok(n * 10) }
/// });
/// assert_eq!(result.unwrap(), 20);
/// ```
pub fn retry<A, T, E, F>(
    policy: &RetryPolicy<E, A>,
    args: A,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(&A) -> Result<T, E>,
    E: Display,
{
    retry_with_state(policy, args, operation).0
}

/// Like [`retry`], also returning the attempt history.
pub fn retry_with_state<A, T, E, F>(
    policy: &RetryPolicy<E, A>,
    mut args: A,
    mut operation: F,
) -> (Result<T, RetryError<E>>, RetryState)
where
    F: FnMut(&A) -> Result<T, E>,
    E: Display,
{
    let mut state = RetryState::default();

    loop {
        state.attempt += 1;
        debug!(
            attempt = state.attempt,
            max_attempts = policy.max_attempts,
            "Executing retry attempt"
        );

        match operation(&args) {
            Ok(value) => {
                state.record_success();
                return (Ok(value), state);
            }
            Err(error) => match state.record_failure(policy, error) {
                Next::Stop(err) => return (Err(err), state),
                Next::Wait(wait, error) => {
                    args = policy.prepare_retry(&error, args);
                    std::thread::sleep(wait);
                }
            },
        }
    }
}

/// Async counterpart of [`retry`]; waits with `tokio::time::sleep`.
///
/// Each attempt receives its own clone of the current arguments.
pub async fn retry_async<A, T, E, F, Fut>(
    policy: &RetryPolicy<E, A>,
    args: A,
    operation: F,
) -> Result<T, RetryError<E>>
where
    A: Clone,
    F: FnMut(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_async_with_state(policy, args, operation).await.0
}

/// Like [`retry_async`], also returning the attempt history.
pub async fn retry_async_with_state<A, T, E, F, Fut>(
    policy: &RetryPolicy<E, A>,
    mut args: A,
    mut operation: F,
) -> (Result<T, RetryError<E>>, RetryState)
where
    A: Clone,
    F: FnMut(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut state = RetryState::default();

    loop {
        state.attempt += 1;
        debug!(
            attempt = state.attempt,
            max_attempts = policy.max_attempts,
            "Executing retry attempt"
        );

        match operation(args.clone()).await {
            Ok(value) => {
                state.record_success();
                return (Ok(value), state);
            }
            Err(error) => match state.record_failure(policy, error) {
                Next::Stop(err) => return (Err(err), state),
                Next::Wait(wait, error) => {
                    args = policy.prepare_retry(&error, args);
                    tokio::time::sleep(wait).await;
                }
            },
        }
    }
}

/// A function bundled with the policy used to retry it.
///
/// Built by [`run_with_retry`] or [`RetryPolicy::wrap`].
pub struct Retrying<F, E, A = ham_core::Arguments> {
    policy: RetryPolicy<E, A>,
    function: F,
}

impl<F: Clone, E, A> Clone for Retrying<F, E, A> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            function: self.function.clone(),
        }
    }
}

impl<F, E, A> std::fmt::Debug for Retrying<F, E, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrying")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<F, E, A> Retrying<F, E, A> {
    /// The policy used for each call.
    pub fn policy(&self) -> &RetryPolicy<E, A> {
        &self.policy
    }

    /// Call the function with retries.
    pub fn call<T>(&self, args: A) -> Result<T, RetryError<E>>
    where
        F: Fn(&A) -> Result<T, E>,
        E: Display,
    {
        retry(&self.policy, args, &self.function)
    }

    /// Call the function with retries, also returning the attempt history.
    pub fn call_with_state<T>(&self, args: A) -> (Result<T, RetryError<E>>, RetryState)
    where
        F: Fn(&A) -> Result<T, E>,
        E: Display,
    {
        retry_with_state(&self.policy, args, &self.function)
    }

    /// Call an async function with retries.
    pub async fn call_async<T, Fut>(&self, args: A) -> Result<T, RetryError<E>>
    where
        A: Clone,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        retry_async(&self.policy, args, &self.function).await
    }
}

impl<E, A> RetryPolicy<E, A> {
    /// Bundle `function` with this policy.
    pub fn wrap<F>(self, function: F) -> Retrying<F, E, A> {
        Retrying {
            policy: self,
            function,
        }
    }
}

/// Wrap `function` so every call goes through `policy`.
///
/// # Example
///
/// ```rust
/// use ham_runtime::{run_with_retry, RetryPolicy};
/// use std::time::Duration;
///
/// let parse = run_with_retry(
///     RetryPolicy::new().max_attempts(2).initial_delay(Duration::from_millis(1)),
///     |raw: &String| raw.parse::<i32>(),
/// );
/// assert_eq!(parse.call("42".to_string()).unwrap(), 42);
/// assert_eq!(parse.call("x".to_string()).unwrap_err().attempts(), 2);
/// ```
pub fn run_with_retry<F, E, A>(policy: RetryPolicy<E, A>, function: F) -> Retrying<F, E, A> {
    policy.wrap(function)
}
