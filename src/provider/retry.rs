// src/provider/retry.rs — Retry with exponential backoff for text generators
//
// Wraps any TextGenerator with automatic retry on transient failures.
// Retries: rate limits (429), server errors (5xx), timeouts, connection resets.
// Does NOT retry: bad request (400), auth errors (401, 403).
//
// Generation sits on the session stop path, so the defaults are short: a
// stop should fall back to the templated narrative within a few seconds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::TextGenerator;
use crate::infra::errors::TimeslipError;

const MAX_RETRIES: u32 = 2;
const INITIAL_DELAY_MS: u64 = 500;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 4_000;
const JITTER_FRACTION: f64 = 0.2;
const MIN_DELAY_MS: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

/// A generator wrapper that adds retry with exponential backoff.
pub struct RetryGenerator {
    inner: Arc<dyn TextGenerator>,
    config: RetryConfig,
}

impl RetryGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn TextGenerator>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay for a given retry attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay.min(self.config.max_delay);
        }

        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);
        let final_ms = (capped_ms * jitter).max(MIN_DELAY_MS);

        Duration::from_millis(final_ms as u64)
    }
}

fn should_retry(error: &TimeslipError) -> bool {
    match error {
        TimeslipError::RateLimited { .. } => true,
        TimeslipError::Provider { retriable, .. } => *retriable,
        _ => false,
    }
}

fn rate_limit_delay(error: &TimeslipError) -> Option<Duration> {
    match error {
        TimeslipError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Multiplier in [1 - fraction, 1 + fraction], reproducible per attempt.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl TextGenerator for RetryGenerator {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn generate(&self, prompt: &str) -> Result<String, TimeslipError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if !should_retry(&e) || attempt >= self.config.max_retries {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt, rate_limit_delay(&e));
                    tracing::warn!(
                        provider = self.inner.id(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying generation after error: {}",
                        e
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
