//! Retry with backoff
//!
//! - [`backoff`]: delay policies ([`FixedBackoff`], [`FibonacciBackoff`])
//! - [`driver`]: sequential retry loop with optional cancellation
//! - [`error`]: aggregated failure reporting
//!
//! # Example
//!
//! ```
//! use fwedit::retry::{attempt_with_backoff, BackoffOptions, FixedBackoff};
//! use std::time::Duration;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let backoff = FixedBackoff::new(
//!     BackoffOptions::new(Duration::ZERO, 3),
//!     Duration::from_millis(1),
//! );
//! let mut polls = 0;
//! let status = attempt_with_backoff(&backoff, || {
//!     polls += 1;
//!     let ready = polls == 2;
//!     async move { if ready { Ok("running") } else { Err("provisioning") } }
//! })
//! .await
//! .unwrap();
//!
//! assert_eq!(status, "running");
//! # });
//! ```

pub mod backoff;
pub mod driver;
pub mod error;

pub use backoff::{
    BackoffConfig, BackoffMethod, BackoffOptions, BackoffOverrides, FibonacciBackoff,
    FixedBackoff, fibonacci,
};
pub use driver::{attempt_with_backoff, attempt_with_backoff_cancellable};
pub use error::RetryError;
