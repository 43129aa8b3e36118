//! Iceberg table catalog
//!
//! The [`Catalog`] trait is what the block store needs from a table format:
//! namespace and table bootstrap, an idempotent append of one block's rows
//! to one table, and scans of the current snapshot. [`WarehouseCatalog`]
//! implements it on top of an Iceberg catalog (REST in production, the
//! in-memory catalog in tests) with Parquet data files.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

mod batch;
pub mod schema;
pub mod warehouse;

pub use schema::{Column, ColumnType, Record, TableSchema, Value};
pub use warehouse::WarehouseCatalog;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// Lost an optimistic-concurrency race; retrying reloads the table
    #[error("commit rejected: {0}")]
    CommitRejected(String),

    #[error("table not found: {0}")]
    TableNotFound(String),
}

impl From<iceberg::Error> for CatalogError {
    fn from(err: iceberg::Error) -> Self {
        match err.kind() {
            iceberg::ErrorKind::CatalogCommitConflicts => {
                CatalogError::CommitRejected(err.to_string())
            },
            iceberg::ErrorKind::TableNotFound | iceberg::ErrorKind::NamespaceNotFound => {
                CatalogError::TableNotFound(err.to_string())
            },
            iceberg::ErrorKind::DataInvalid => CatalogError::SchemaConflict(err.to_string()),
            _ => CatalogError::Unavailable(err.to_string()),
        }
    }
}

impl From<arrow::error::ArrowError> for CatalogError {
    fn from(err: arrow::error::ArrowError) -> Self {
        CatalogError::SchemaConflict(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// A snapshot already carries the commit id; nothing was written
    AlreadyApplied,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), CatalogError>;

    async fn load_table(
        &self,
        namespace: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, CatalogError>;

    async fn create_table(&self, namespace: &str, schema: &TableSchema) -> Result<(), CatalogError>;

    /// Drops a table with its data; a missing table is not an error
    async fn drop_table(&self, namespace: &str, table: &str) -> Result<(), CatalogError>;

    /// Whether a snapshot of the table was written by `commit_id`
    async fn is_applied(
        &self,
        namespace: &str,
        table: &str,
        commit_id: Uuid,
    ) -> Result<bool, CatalogError>;

    /// Appends rows as one snapshot tagged with `commit_id`; idempotent per
    /// commit id
    async fn append(
        &self,
        namespace: &str,
        schema: &TableSchema,
        commit_id: Uuid,
        rows: &[Record],
    ) -> Result<CommitOutcome, CatalogError>;

    /// Every row of the table's current snapshot
    async fn scan(&self, namespace: &str, schema: &TableSchema) -> Result<Vec<Record>, CatalogError>;
}
