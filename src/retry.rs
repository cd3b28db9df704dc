//! Retry/Backoff Controller
//!
//! Bounded exponential backoff around a single adapter call. Attempts run
//! `0..=max_retries`; after failed attempt `a` (when another is allowed) the
//! controller sleeps `base_delay * 2^a`, plus uniform jitter for transport
//! failures.

use crate::error::{FailureKind, ProviderError, TerminalFailure};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Exponent cap so the shift can never overflow.
const MAX_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound of the random extra delay added after transport failures
    pub jitter: Duration,
}

/// Value produced by a successful call and the attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter,
        }
    }

    /// Maximum number of invocations of the wrapped call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Deterministic part of the delay after failed attempt `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_EXPONENT);
        self.base_delay.saturating_mul(factor)
    }

    fn jitter_for(&self, kind: FailureKind) -> Duration {
        if kind != FailureKind::Transport || self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `call` until it succeeds or the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, key: &str, mut call: F) -> Result<Attempted<T>, TerminalFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => {
                    debug!(key, attempts = attempt + 1, "Call succeeded");
                    return Ok(Attempted {
                        value,
                        attempts: attempt + 1,
                    });
                }
                Err(err) if attempt < self.max_retries => {
                    let kind = err.kind();
                    let delay = self.delay_for_attempt(attempt) + self.jitter_for(kind);
                    warn!(
                        key,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts(),
                        kind = %kind,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(TerminalFailure {
                        key: key.to_string(),
                        kind: err.kind(),
                        attempts: attempt + 1,
                        last_error: err,
                    });
                }
            }
        }
    }
}
