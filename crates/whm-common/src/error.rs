//! Error types shared across the importer crates

use thiserror::Error;

/// Outcome of a retried operation that did not succeed
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The cancellation token fired before or between attempts
    #[error("operation cancelled")]
    Cancelled,

    /// The last error seen, either non-retryable or after the final attempt
    #[error(transparent)]
    Failed(E),
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }

    /// Maps the inner error, keeping cancellation as is
    pub fn map_err<F, O>(self, f: F) -> RetryError<O>
    where
        F: FnOnce(E) -> O,
    {
        match self {
            RetryError::Cancelled => RetryError::Cancelled,
            RetryError::Failed(e) => RetryError::Failed(f(e)),
        }
    }
}
