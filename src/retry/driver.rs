//! Sequential retry driver
//!
//! Runs an async operation until it succeeds or the attempt budget of its
//! [`BackoffMethod`] is spent, sleeping between attempts. Attempts never
//! overlap: the outcome of one decides whether the next runs at all.

use crate::retry::backoff::BackoffMethod;
use crate::retry::error::RetryError;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Retries `operation` according to `method`.
///
/// Sleeps `initial_delay` first when it is non-zero. After a failed attempt
/// `n` the driver sleeps `calculate_backoff(n + 1)` unless `n` was the last
/// allowed attempt. Every failure is kept and returned in
/// [`RetryError::Exhausted`] once the attempts run out.
pub async fn attempt_with_backoff<M, F, Fut, T, E>(
    method: &M,
    operation: F,
) -> Result<T, RetryError<E>>
where
    M: BackoffMethod + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + fmt::Debug,
{
    drive(method, None, operation).await
}

/// Like [`attempt_with_backoff`], but gives up as soon as `cancel` fires.
///
/// Sleeps are interrupted by cancellation and no new attempt starts once the
/// token is cancelled. An attempt already running is allowed to finish.
/// Cancellation yields [`RetryError::Cancelled`] with the failures so far.
pub async fn attempt_with_backoff_cancellable<M, F, Fut, T, E>(
    method: &M,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, RetryError<E>>
where
    M: BackoffMethod + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + fmt::Debug,
{
    drive(method, Some(cancel), operation).await
}

async fn drive<M, F, Fut, T, E>(
    method: &M,
    cancel: Option<&CancellationToken>,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    M: BackoffMethod + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + fmt::Debug,
{
    let options = *method.options();
    let max_attempts = options.max_attempts();
    let mut failures = Vec::new();

    if !options.initial_delay().is_zero() {
        debug!(delay = ?options.initial_delay(), "Waiting before first attempt");
        if !pause(options.initial_delay(), cancel).await {
            return Err(cancelled(failures));
        }
    }

    for attempt in 1..=max_attempts {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(cancelled(failures));
        }

        debug!(attempt, max_attempts, "Starting attempt");
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, max_attempts, "Operation succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Attempt failed");
                failures.push(e);
            }
        }

        if attempt < max_attempts {
            let delay = method.calculate_backoff(attempt + 1);
            debug!(attempt, delay = ?delay, "Backing off");
            if !pause(delay, cancel).await {
                return Err(cancelled(failures));
            }
        }
    }

    error!(attempts = failures.len(), "All retry attempts failed");
    Err(RetryError::Exhausted { failures })
}

/// Sleeps for `delay`; returns false if `cancel` fired first
async fn pause(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        None => {
            tokio::time::sleep(delay).await;
            true
        }
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => false,
                () = tokio::time::sleep(delay) => true,
            }
        }
    }
}

fn cancelled<E>(failures: Vec<E>) -> RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    warn!(attempts = failures.len(), "Retry cancelled");
    RetryError::Cancelled { failures }
}
