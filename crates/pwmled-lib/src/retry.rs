//! Activation retry with exponential backoff.
//!
//! A PWM controller that has not appeared yet makes activation fail with a
//! deferred error. The caller re-runs activation from scratch on a backoff
//! schedule until it either succeeds or fails permanently.

use std::time::{Duration, Instant};

use crate::error::{PwmLedError, Result};

/// Backoff schedule for re-running a deferred activation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay after the first deferred attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Applied to the delay after each deferred attempt (2.0 by default).
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Backoff state for repeated activation attempts.
///
/// Only deferred failures are recorded here. A permanent failure ends the
/// retry loop instead.
#[derive(Debug)]
pub struct ProbeRetry {
    config: RetryConfig,
    current_delay: Duration,
    last_attempt: Option<Instant>,
    consecutive_failures: u32,
}

impl ProbeRetry {
    /// Start a schedule from `config`. The first attempt is immediate.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current_delay: config.initial_delay,
            config,
            last_attempt: None,
            consecutive_failures: 0,
        }
    }

    /// Start the default 1 s → 30 s doubling schedule.
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// `true` before the first attempt and once the current delay has
    /// elapsed since the last one.
    pub fn should_attempt(&self) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => last.elapsed() >= self.current_delay,
        }
    }

    /// Record a deferred attempt and lengthen the delay.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.last_attempt = Some(Instant::now());

        // delay *= multiplier, capped at max_delay
        let next = self.current_delay.as_secs_f64() * self.config.multiplier;
        self.current_delay = Duration::from_secs_f64(next).min(self.config.max_delay);
    }

    /// Record a completed activation and return to the initial delay.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay = self.config.initial_delay;
        self.last_attempt = None;
    }

    /// Deferred attempts since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Delay the next attempt waits for, measured from the last one.
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }
}

/// Outcome of one call to [`attempt`].
#[derive(Debug)]
pub enum Attempt<T> {
    /// Backoff has not elapsed; nothing was tried.
    Waiting,
    /// Tried and deferred; try again later.
    Deferred(PwmLedError),
    /// Succeeded, or failed for good.
    Done(Result<T>),
}

/// Run `probe` if the backoff allows it. Only deferred errors advance the
/// backoff; any other error is final.
pub fn attempt<T>(state: &mut ProbeRetry, probe: impl FnOnce() -> Result<T>) -> Attempt<T> {
    if !state.should_attempt() {
        return Attempt::Waiting;
    }
    match probe() {
        Ok(value) => {
            state.record_success();
            Attempt::Done(Ok(value))
        }
        Err(e) if e.is_deferred() => {
            state.record_failure();
            log::info!(
                "activation deferred: {e} (attempt {}, retry in {:.1}s)",
                state.consecutive_failures(),
                state.current_delay().as_secs_f64()
            );
            Attempt::Deferred(e)
        }
        Err(e) => Attempt::Done(Err(e)),
    }
}
