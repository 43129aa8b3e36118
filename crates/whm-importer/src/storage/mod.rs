//! Object storage
//!
//! [`ObjectStore`] is the seam between the pipeline and the bucket. The S3
//! backend talks to AWS (or any S3-compatible endpoint); the in-memory
//! backend serves tests and local dry runs.

use async_trait::async_trait;
use thiserror::Error;

pub mod config;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use memory::MemoryObjectStore;
pub use s3::S3Storage;

use crate::pipeline::SourceHandle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage request failed for {key}: {message}")]
    Request { key: String, message: String },
}

impl StorageError {
    pub fn request(key: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Request {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// A listed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

impl SourceHandle for ObjectInfo {
    fn key(&self) -> &str {
        &self.key
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All objects under `prefix`, in key order
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Server-side copy; `NotFound` if the source is missing
    async fn copy(&self, source: &str, dest: &str) -> Result<(), StorageError>;

    /// Deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}
