// Error types for the retry driver
use std::fmt;
use thiserror::Error;

/// Failure of a retried operation
///
/// Both variants carry every attempt's error, oldest first.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    /// Every allowed attempt failed
    #[error("{}", describe("Failed to resolve promise", .failures))]
    Exhausted { failures: Vec<E> },

    /// The cancellation token fired before an attempt succeeded
    #[error("{}", describe("Retry cancelled", .failures))]
    Cancelled { failures: Vec<E> },
}

impl<E> RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    pub fn failures(&self) -> &[E] {
        match self {
            Self::Exhausted { failures } | Self::Cancelled { failures } => failures,
        }
    }

    pub fn into_failures(self) -> Vec<E> {
        match self {
            Self::Exhausted { failures } | Self::Cancelled { failures } => failures,
        }
    }

    /// Number of attempts that ran
    pub fn attempts(&self) -> usize {
        self.failures().len()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

fn describe<E: fmt::Display>(prefix: &str, failures: &[E]) -> String {
    let details = failures
        .iter()
        .enumerate()
        .map(|(idx, failure)| format!("attempt {}: {failure}", idx + 1))
        .collect::<Vec<_>>()
        .join("; ");

    if details.is_empty() {
        format!("{prefix} after {} attempt(s)", failures.len())
    } else {
        format!("{prefix} after {} attempt(s): {details}", failures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_lists_attempts_in_order() {
        let err = RetryError::Exhausted {
            failures: vec!["timeout", "502 Bad Gateway"],
        };
        assert_eq!(
            err.to_string(),
            "Failed to resolve promise after 2 attempt(s): attempt 1: timeout; attempt 2: 502 Bad Gateway"
        );
        assert_eq!(err.attempts(), 2);
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_without_attempts() {
        let err: RetryError<String> = RetryError::Cancelled { failures: vec![] };
        assert_eq!(err.to_string(), "Retry cancelled after 0 attempt(s)");
        assert!(err.is_cancelled());
        assert!(err.into_failures().is_empty());
    }
}
