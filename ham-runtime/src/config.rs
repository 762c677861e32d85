//! Wait strategies between retry attempts.

use std::time::Duration;

/// Strategy for waiting between retries.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitStrategy {
    /// No waiting.
    None,
    /// Fixed delay.
    Fixed(Duration),
    /// Exponential backoff with optional jitter.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier for each attempt.
        multiplier: f64,
        /// Upper bound of the uniform random delay added to each wait.
        jitter: Option<Duration>,
    },
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: None,
        }
    }
}

impl WaitStrategy {
    /// Exponential backoff without jitter.
    pub fn exponential(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self::Exponential {
            initial,
            max,
            multiplier,
            jitter: None,
        }
    }

    /// Calculate the wait before retry number `attempt` (1 for the first retry).
    ///
    /// Exponential waits are `initial * multiplier^(attempt - 1)` plus a
    /// random amount in `[0, jitter)`, capped at `max`.
    pub fn calculate(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            WaitStrategy::None => Duration::ZERO,
            WaitStrategy::Fixed(d) => *d,
            WaitStrategy::Exponential {
                initial,
                max,
                multiplier,
                jitter,
            } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let base = initial.as_secs_f64() * multiplier.powi(exponent);
                let extra = jitter.map(random_jitter).unwrap_or(0.0);
                cap_secs(base + extra, *max)
            }
        }
    }
}

fn cap_secs(secs: f64, max: Duration) -> Duration {
    if !secs.is_finite() || secs >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(secs.max(0.0))
}

/// Uniform random seconds in `[0, bound)`.
fn random_jitter(bound: Duration) -> f64 {
    use rand::Rng;
    let bound = bound.as_secs_f64();
    if bound <= 0.0 {
        return 0.0;
    }
    rand::thread_rng().gen_range(0.0..bound)
}
