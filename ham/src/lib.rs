//! # ham - Task Execution Helpers for Rust
//!
//! Run a function over many parameter sets sequentially or on a bounded
//! worker pool, and retry flaky calls with backoff.
//!
//! ## Quick Start
//!
//! ```rust
//! use ham::prelude::*;
//! use serde_json::json;
//!
//! fn area(args: Arguments) -> ham::core::Result<f64> {
//!     let w: f64 = args.kwarg("w")?;
//!     let h: f64 = args.kwarg_or("h", w)?;
//!     Ok(w * h)
//! }
//!
//! let results = run_parallel(
//!     area,
//!     vec![json!({"w": 2.0, "h": 3.0}), json!({"w": 4.0}), json!("oops")],
//!     &ParallelOptions::new().max_workers(2),
//! )
//! .unwrap();
//!
//! assert_eq!(*results[0].as_ref().unwrap(), 6.0);
//! assert_eq!(*results[1].as_ref().unwrap(), 16.0);
//! assert!(results[2].is_err());
//! ```
//!
//! ## Architecture
//!
//! - [`ham_core`] - Argument model, settings, logging and errors
//! - [`ham_runtime`] - Sequential, parallel and retrying runners

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Argument model, settings, logging and errors.
pub use ham_core as core;

/// Task runners and retry policies.
pub use ham_runtime as runtime;

// ============================================================================
// Convenience Re-exports
// ============================================================================

pub use ham_core::{
    init_logging, Arguments, HamError, LogFormat, LoggingConfig, ParameterSet, RetrySettings,
    RuntimeSettings,
};

pub use ham_runtime::{
    retry, retry_async, run_parallel, run_parallel_async, run_sequentially,
    run_sequentially_async, run_with_retry, ParallelOptions, RetryError, RetryPolicy, Retrying,
    TaskError, TaskResult, TaskRunner, WaitStrategy,
};

// ============================================================================
// Prelude
// ============================================================================

/// Prelude for common imports.
pub mod prelude {
    // Core
    pub use crate::core::{Arguments, HamError, ParameterSet, RuntimeSettings};

    // Runners
    pub use crate::runtime::{
        run_parallel, run_parallel_async, run_sequentially, run_sequentially_async,
        ParallelOptions, TaskError, TaskResult, TaskRunner,
    };

    // Retries
    pub use crate::runtime::{retry, run_with_retry, RetryError, RetryPolicy, WaitStrategy};
}

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of ham.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns version information as a tuple (major, minor, patch).
pub fn version_tuple() -> (u32, u32, u32) {
    let version = version();
    let parts: Vec<&str> = version.split('.').collect();
    (
        parts.first().and_then(|s| s.parse().ok()).unwrap_or(0),
        parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0),
        parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_version_tuple() {
        assert_eq!(crate::version(), "0.2.6");
        assert_eq!(crate::version_tuple(), (0, 2, 6));
    }

    #[test]
    fn test_runner_from_settings() {
        let settings = RuntimeSettings::new().max_workers(2).raise_on_error(false);
        let runner = TaskRunner::new(settings).unwrap();

        let doubled = runner
            .run_sequentially(
                |args: Arguments| args.arg::<i64>(0).map(|n| n * 2),
                vec![
                    ParameterSet::from(json!(1)),
                    ParameterSet::positional([json!(2)]),
                    ParameterSet::from(json!({"n": 3})),
                ],
            )
            .unwrap();
        assert_eq!(doubled, vec![2, 4]);
    }

    #[test]
    fn test_retry_with_hook() {
        let fetch = run_with_retry(
            RetryPolicy::new()
                .max_attempts(3)
                .wait(WaitStrategy::None)
                .hook(|_: &HamError, args: Arguments| {
                    let timeout: u64 = args.kwarg_or("timeout", 1).unwrap_or(1);
                    args.with_kwarg("timeout", timeout * 4)
                }),
            |args: &Arguments| -> Result<u64, HamError> {
                let timeout: u64 = args.kwarg("timeout")?;
                if timeout >= 16 {
                    Ok(timeout)
                } else {
                    Err(HamError::invalid_argument(format!("timeout {}s is too short", timeout)))
                }
            },
        );

        let timeout = fetch.call(Arguments::new().with_kwarg("timeout", 1)).unwrap();
        assert_eq!(timeout, 16);
    }

    #[tokio::test]
    async fn test_parallel_async_timeout() {
        let results = run_parallel_async(
            |ms: u64| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, HamError>(ms)
            },
            [1u64, 500],
            &ParallelOptions::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(results[1].as_ref().unwrap_err().is_timeout());
    }
}
