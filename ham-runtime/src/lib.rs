//! # ham-runtime
//!
//! Sequential, parallel and retrying task execution.
//!
//! ## Core Concepts
//!
//! - **[`run_sequentially`]**: call a function once per parameter set, in order
//! - **[`run_parallel`]**: fan calls out onto a bounded pool of worker threads
//! - **[`run_parallel_async`]**: the same on the tokio runtime
//! - **[`RetryPolicy`]** and **[`run_with_retry`]**: retry a function with
//!   backoff, filtering and argument rewriting between attempts
//! - **[`TaskRunner`]**: all of the above with defaults from a
//!   [`RuntimeSettings`](ham_core::RuntimeSettings)
//!
//! ## Dispatch
//!
//! Runners are generic over the argument type. With
//! [`Arguments`](ham_core::Arguments), a parameter set that is a keyword map
//! is passed as keyword arguments, a positional list as positional
//! arguments, and anything else as the single positional argument.
//!
//! ## Wait Strategies
//!
//! - [`WaitStrategy::None`]: retry immediately
//! - [`WaitStrategy::Fixed`]: constant delay between attempts
//! - [`WaitStrategy::Exponential`]: exponential delay with optional jitter and a cap
//!
//! ## Example
//!
//! ```rust
//! use ham_runtime::{run_parallel, run_with_retry, ParallelOptions, RetryPolicy};
//! use std::time::Duration;
//!
//! let results = run_parallel(
//!     |n: u32| Ok::<_, String>(n * 2),
//!     [1u32, 2, 3],
//!     &ParallelOptions::new().max_workers(2),
//! )
//! .unwrap();
//! assert_eq!(results.len(), 3);
//!
//! let checked = run_with_retry(
//!     RetryPolicy::new().max_attempts(2).initial_delay(Duration::from_millis(1)),
//!     |n: &u32| if *n > 0 { Ok(*n) } else { Err("zero") },
//! );
//! assert_eq!(checked.call(5).unwrap(), 5);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod executor;
pub mod parallel;
pub mod parallel_async;
pub mod policy;
pub mod runner;
pub mod sequential;

// Re-exports
pub use config::WaitStrategy;
pub use error::{RetryError, TaskError, TaskResult};
pub use executor::{
    retry, retry_async, retry_async_with_state, retry_with_state, run_with_retry, AttemptInfo,
    RetryState, Retrying,
};
pub use parallel::{default_worker_count, run_parallel, run_parallel_shared, ParallelOptions};
pub use parallel_async::{run_parallel_async, run_parallel_async_shared};
pub use policy::RetryPolicy;
pub use runner::TaskRunner;
pub use sequential::{run_sequentially, run_sequentially_async};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        retry, run_parallel, run_parallel_async, run_sequentially, run_with_retry, ParallelOptions,
        RetryError, RetryPolicy, TaskError, TaskResult, TaskRunner, WaitStrategy,
    };
}
