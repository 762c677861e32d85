//! Task and retry error types.

use std::time::Duration;
use thiserror::Error;

/// Why a task slot holds no value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// The task returned an error.
    #[error("{0}")]
    Failed(E),

    /// The task did not finish within the per-task timeout.
    #[error("task {index} timed out after {timeout:?}")]
    Timeout {
        /// Position of the task in the input.
        index: usize,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The task panicked.
    #[error("task {index} panicked: {message}")]
    Panicked {
        /// Position of the task in the input.
        index: usize,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// No worker could be started.
    #[error("worker pool error: {0}")]
    Pool(String),
}

impl<E> TaskError<E> {
    /// Check if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the task panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }

    /// Borrow the task's own error, if that is what this is.
    pub fn task_error(&self) -> Option<&E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Take the task's own error, if that is what this is.
    pub fn into_task_error(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// One slot of a parallel run.
pub type TaskResult<T, E> = Result<T, TaskError<E>>;

/// Terminal failure of a retried call.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The last error, surfaced as itself.
    ///
    /// Returned for errors the policy does not retry, and for the final
    /// error when attempts run out and `reraise` is set.
    #[error("{error}")]
    Failed {
        /// Attempts made.
        attempts: u32,
        /// The error.
        error: E,
    },

    /// Attempts ran out and `reraise` is not set.
    #[error("retry attempts exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Failed { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Check if attempts ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Borrow the underlying error.
    pub fn error(&self) -> &E {
        match self {
            Self::Failed { error, .. } => error,
            Self::Exhausted { last_error, .. } => last_error,
        }
    }

    /// Take the underlying error.
    pub fn into_inner(self) -> E {
        match self {
            Self::Failed { error, .. } => error,
            Self::Exhausted { last_error, .. } => last_error,
        }
    }
}
