use std::{future::Future, time::Duration};

use log::*;

use crate::ProcessorError;

/// Retry schedule for processor lookups: `attempts` tries in total, sleeping `initial_backoff` after the first failure
/// and doubling the sleep after each subsequent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, initial_backoff: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn once() -> Self {
        Self { attempts: 1, initial_backoff: Duration::ZERO }
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the attempts are used up. The last error is
    /// returned as-is.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProcessorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProcessorError>>,
    {
        let attempts = self.attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!("💳️ {label} failed (attempt {attempt}/{attempts}). Retrying in {backoff:?}. {e}");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                },
                Err(e) => {
                    warn!("💳️ {label} failed after {attempt} attempt(s). {e}");
                    return Err(e);
                },
            }
        }
    }
}
