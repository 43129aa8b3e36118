//! WHM Common Library
//!
//! Shared infrastructure for the warehouse-movement importer.
//!
//! # Overview
//!
//! - **Logging**: structured `tracing` setup driven by `LOG_*` variables
//! - **Retry**: bounded exponential retry with jitter and cancellation
//! - **Backoff**: the scheduler's between-sweep backoff state
//! - **Ids**: time-ordered, strictly increasing block identifiers
//!
//! # Example
//!
//! ```no_run
//! use whm_common::retry::{retry, RetryPolicy, Retryable};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("flaky")]
//! struct Flaky;
//!
//! impl Retryable for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn run() {
//! let cancel = CancellationToken::new();
//! let out = retry(&RetryPolicy::default(), &cancel, "ping", || async { Ok::<_, Flaky>(1) }).await;
//! assert_eq!(out.ok(), Some(1));
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod backoff;
pub mod error;
pub mod ids;
pub mod logging;
pub mod retry;

pub use backoff::SweepBackoff;
pub use error::RetryError;
pub use ids::BlockIdGenerator;
pub use retry::{retry, RetryPolicy, Retryable};
