//! Downstream notification of committed blocks

pub mod message;
pub mod sqs;

pub use message::PackageMessage;
pub use sqs::SqsPublisher;
