//! Retry policy: how many attempts, how long to wait, what to retry, and
//! what to do between attempts.

use crate::config::WaitStrategy;
use ham_core::{Arguments, IndexedArgs, KeywordArgs, RetrySettings};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Hook<E, A> = Arc<dyn Fn(&E, A) -> A + Send + Sync>;

/// Policy for retrying an operation that takes arguments `A` and fails with `E`.
///
/// # Example
///
/// ```rust
/// use ham_runtime::RetryPolicy;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// enum FetchError {
///     Timeout,
///     NotFound,
/// }
///
/// let policy: RetryPolicy<FetchError, u64> = RetryPolicy::new()
///     .max_attempts(4)
///     .initial_delay(Duration::from_millis(10))
///     .retry_if(|e| matches!(e, FetchError::Timeout))
///     .hook(|_, timeout| timeout * 2);
/// assert_eq!(policy.max_attempts, 4);
/// ```
pub struct RetryPolicy<E, A = Arguments> {
    /// Maximum attempts, including the first try. Never below 1.
    pub max_attempts: u32,
    /// Wait strategy.
    pub wait: WaitStrategy,
    /// Whether the last error surfaces as itself once attempts run out.
    pub reraise: bool,
    retry_if: Option<Predicate<E>>,
    before_retry: Option<Observer<E>>,
    hook: Option<Hook<E, A>>,
}

impl<E, A> Default for RetryPolicy<E, A> {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: WaitStrategy::default(),
            reraise: true,
            retry_if: None,
            before_retry: None,
            hook: None,
        }
    }
}

impl<E, A> Clone for RetryPolicy<E, A> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            wait: self.wait.clone(),
            reraise: self.reraise,
            retry_if: self.retry_if.clone(),
            before_retry: self.before_retry.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<E, A> fmt::Debug for RetryPolicy<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("wait", &self.wait)
            .field("reraise", &self.reraise)
            .field("retry_if", &self.retry_if.is_some())
            .field("before_retry", &self.before_retry.is_some())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl<E, A> RetryPolicy<E, A> {
    /// Create a new default policy: 3 attempts, exponential backoff from 1s
    /// doubling up to 60s, every error retryable, last error reraised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy from settings.
    #[must_use]
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            wait: WaitStrategy::Exponential {
                initial: settings.initial_delay,
                max: settings.max_delay,
                multiplier: settings.backoff,
                jitter: settings.jitter,
            },
            reraise: settings.reraise,
            ..Self::default()
        }
    }

    /// Policy that makes a single attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new().max_attempts(1).wait(WaitStrategy::None)
    }

    /// Set max attempts (values below 1 are raised to 1).
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the wait strategy.
    #[must_use]
    pub fn wait(mut self, strategy: WaitStrategy) -> Self {
        self.wait = strategy;
        self
    }

    /// Set the initial delay, switching to exponential backoff if needed.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.exponential_parts(|initial, _, _, _| *initial = delay);
        self
    }

    /// Set the max delay, switching to exponential backoff if needed.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.exponential_parts(|_, max, _, _| *max = delay);
        self
    }

    /// Set the backoff multiplier, switching to exponential backoff if needed.
    #[must_use]
    pub fn backoff(mut self, multiplier: f64) -> Self {
        self.exponential_parts(|_, _, m, _| *m = multiplier);
        self
    }

    /// Add random jitter up to `jitter`, switching to exponential backoff if needed.
    #[must_use]
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.exponential_parts(|_, _, _, j| *j = Some(jitter));
        self
    }

    /// Only retry errors matching `predicate`. Without one, every error is retried.
    #[must_use]
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    /// Set whether to reraise the last error.
    #[must_use]
    pub fn reraise(mut self, reraise: bool) -> Self {
        self.reraise = reraise;
        self
    }

    /// Observe each retryable error before the wait that follows it.
    #[must_use]
    pub fn before_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.before_retry = Some(Arc::new(observer));
        self
    }

    /// Rewrite the arguments before the next attempt.
    #[must_use]
    pub fn hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E, A) -> A + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Check if `error` should be retried (ignoring the attempt budget).
    pub fn is_retryable(&self, error: &E) -> bool {
        self.retry_if.as_ref().map_or(true, |p| p(error))
    }

    /// Run the pre-retry callbacks and produce the arguments for the next attempt.
    pub(crate) fn prepare_retry(&self, error: &E, args: A) -> A {
        if let Some(observer) = &self.before_retry {
            observer(error);
        }
        match &self.hook {
            Some(hook) => hook(error, args),
            None => args,
        }
    }

    fn exponential_parts<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut Duration, &mut Duration, &mut f64, &mut Option<Duration>),
    {
        if !matches!(self.wait, WaitStrategy::Exponential { .. }) {
            self.wait = WaitStrategy::default();
        }
        if let WaitStrategy::Exponential {
            initial,
            max,
            multiplier,
            jitter,
        } = &mut self.wait
        {
            edit(initial, max, multiplier, jitter);
        }
    }
}

impl<E> RetryPolicy<E, Arguments> {
    /// Rewrite arguments with positional values keyed by position.
    ///
    /// The hook receives the error, the positional arguments as an
    /// index-keyed map and the keyword arguments, and returns replacements
    /// for both.
    #[must_use]
    pub fn indexed_hook<F>(self, hook: F) -> Self
    where
        F: Fn(&E, IndexedArgs, KeywordArgs) -> (IndexedArgs, KeywordArgs) + Send + Sync + 'static,
    {
        self.hook(move |error, args: Arguments| {
            let (positional, keyword) = args.into_indexed();
            let (positional, keyword) = hook(error, positional, keyword);
            Arguments::from_indexed(positional, keyword)
        })
    }
}
