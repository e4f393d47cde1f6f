// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry with exponential backoff, applied around an [`Answerer`].
//!
//! The client itself never retries; wrap it in [`Retrying`] to opt in.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::CatalystError;
use crate::rag::{AnswerFuture, Answerer};

/// Exponential backoff schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self { max_retries, initial_backoff, max_backoff }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `op`, retrying while it fails with a transient error.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, CatalystError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalystError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        kind = e.kind(),
                        error = %e,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    if attempt > 0 {
                        debug!(attempt, kind = e.kind(), "giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Decorator that retries the inner answerer's transient failures.
pub struct Retrying<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: Answerer> Retrying<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl<A: Answerer> Answerer for Retrying<A> {
    fn answer<'a>(&'a self, ctx: &'a RequestContext) -> AnswerFuture<'a> {
        Box::pin(self.policy.execute(move || self.inner.answer(ctx)))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
