//! Capability traits plugged into the importer

use async_trait::async_trait;

use super::types::{Block, BlockMeta};
use crate::catalog::CommitOutcome;
use crate::error::Result;

/// Handle to one listed source object
pub trait SourceHandle: Clone + Send + Sync + 'static {
    fn key(&self) -> &str;
    fn size(&self) -> u64;
}

/// Enumerates source objects under a prefix
#[async_trait]
pub trait Lister<C>: Send + Sync {
    async fn list(&self, prefix: &str) -> Result<Vec<C>>;
}

/// Fetches one object's body fully into memory, without retrying
#[async_trait]
pub trait Loader<C>: Send + Sync {
    async fn load(&self, source: &C) -> Result<Vec<u8>>;
}

/// Turns raw bytes into a typed business object
pub trait Decoder<D>: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<D>;
}

/// Applies blocks to the table catalog
///
/// `commit` must be atomic per block and idempotent per block uuid.
#[async_trait]
pub trait BlockStore<D, C>: Send + Sync {
    /// Bootstraps tables; `reset` drops them first
    async fn setup(&self, reset: bool) -> Result<()>;

    async fn commit(&self, block: &Block<D, C>) -> Result<CommitOutcome>;
}

/// Announces a committed block downstream
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, block: &BlockMeta) -> Result<()>;
}

/// Moves a block's sources to the valid or invalid archive
#[async_trait]
pub trait Archiver<D, C>: Send + Sync {
    async fn archive(&self, block: &Block<D, C>) -> Result<()>;
}
