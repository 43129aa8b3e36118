//! Block store backed by a [`Catalog`]
//!
//! A [`BoMapping`] describes how one business-object type becomes table
//! rows. [`CatalogStore`] uses it to bootstrap the tables and to append each
//! block to them, tagged with the block uuid.
//!
//! The first table of a mapping is its header: one row per object version.
//! A block appends its child tables first and the header last, and scans
//! only return rows whose block owns the winning header row, so a block
//! becomes visible all at once when its header append commits.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::catalog::schema::{COL_BO_ID, COL_BO_ORDERING, COL_DELETED, COL_ROW_ID, COL_SANDBOX_PACKAGE_GUID};
use crate::catalog::{Catalog, CommitOutcome, Record, TableSchema, Value};
use crate::error::{ImportError, Result};
use crate::pipeline::{Block, BlockMeta, BlockStore, Operation};

/// Row mapping of one business-object type
pub trait BoMapping<D>: Send + Sync {
    fn bo_type(&self) -> &str;

    /// Every table a commit of this type may write, header first
    fn tables(&self) -> Vec<TableSchema>;

    fn bo_id(&self, data: &D) -> String;

    fn bo_partition(&self, data: &D) -> String;

    /// Orders versions of the same object; greater wins
    fn bo_ordering(&self, data: &D) -> String;

    fn to_records(&self, data: &D, block: &BlockMeta, deleted: bool) -> BTreeMap<String, Vec<Record>>;
}

/// Header row that decides which block's rows an object shows
#[derive(Debug)]
struct Winner {
    ordering: Option<String>,
    block: String,
    deleted: bool,
}

pub struct CatalogStore<D> {
    catalog: Arc<dyn Catalog>,
    namespace: String,
    mapping: Arc<dyn BoMapping<D>>,
    ready: OnceCell<()>,
}

impl<D> CatalogStore<D> {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        namespace: impl Into<String>,
        mapping: Arc<dyn BoMapping<D>>,
    ) -> Self {
        Self {
            catalog,
            namespace: namespace.into(),
            mapping,
            ready: OnceCell::new(),
        }
    }

    /// Current rows of one table: for every object, the rows written by the
    /// block holding its greatest `(ordering, block uuid)` header, unless
    /// that version is a delete. Sorted by object and row id.
    pub async fn scan(&self, table: &str) -> Result<Vec<Record>> {
        self.ensure_ready().await?;

        let tables = self.mapping.tables();
        let header = self.header(&tables)?;
        let target = tables
            .iter()
            .find(|t| t.name == table)
            .ok_or_else(|| ImportError::TableNotFound(format!("{}.{}", self.namespace, table)))?;

        let mut winners: HashMap<String, Winner> = HashMap::new();
        for row in self.catalog.scan(&self.namespace, header).await? {
            let (Some(bo_id), Some(block)) = (text(&row, COL_BO_ID), text(&row, COL_SANDBOX_PACKAGE_GUID)) else {
                continue;
            };
            let candidate = Winner {
                ordering: text(&row, COL_BO_ORDERING).map(str::to_string),
                block: block.to_string(),
                deleted: matches!(row.get(COL_DELETED), Some(Value::Bool(true))),
            };
            match winners.get(bo_id) {
                Some(current) if (&current.ordering, &current.block) >= (&candidate.ordering, &candidate.block) => {},
                _ => {
                    winners.insert(bo_id.to_string(), candidate);
                },
            }
        }

        let mut rows: Vec<Record> = self
            .catalog
            .scan(&self.namespace, target)
            .await?
            .into_iter()
            .filter(|row| {
                let (Some(bo_id), Some(block)) = (text(row, COL_BO_ID), text(row, COL_SANDBOX_PACKAGE_GUID)) else {
                    return false;
                };
                winners
                    .get(bo_id)
                    .is_some_and(|winner| !winner.deleted && winner.block == block)
            })
            .collect();
        rows.sort_by(|a, b| {
            (text(a, COL_BO_ID), text(a, COL_ROW_ID)).cmp(&(text(b, COL_BO_ID), text(b, COL_ROW_ID)))
        });
        Ok(rows)
    }

    fn header<'a>(&self, tables: &'a [TableSchema]) -> Result<&'a TableSchema> {
        tables.first().ok_or_else(|| {
            ImportError::Config(format!("business object {} maps to no tables", self.mapping.bo_type()))
        })
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.ready.get_or_try_init(|| self.bootstrap(false)).await?;
        Ok(())
    }

    async fn bootstrap(&self, reset: bool) -> Result<()> {
        self.catalog.ensure_namespace(&self.namespace).await?;
        let tables = self.mapping.tables();

        if reset {
            for table in &tables {
                self.catalog.drop_table(&self.namespace, &table.name).await?;
            }
            warn!(namespace = %self.namespace, bo_type = self.mapping.bo_type(), "Tables reset");
        }

        for table in &tables {
            match self.catalog.load_table(&self.namespace, &table.name).await? {
                None => self.catalog.create_table(&self.namespace, table).await?,
                Some(existing) if existing == *table => {},
                Some(_) => {
                    return Err(ImportError::SchemaConflict(format!(
                        "table {}.{} does not match the expected schema",
                        self.namespace, table.name
                    )))
                },
            }
        }

        info!(namespace = %self.namespace, tables = tables.len(), "Tables ready");
        Ok(())
    }

    /// Rows of one version per business object: the greatest ordering,
    /// later elements winning ties
    fn rows<C>(&self, block: &Block<D, C>) -> BTreeMap<String, Vec<Record>> {
        let mapping = &self.mapping;
        let mut latest: BTreeMap<String, (String, usize)> = BTreeMap::new();
        for (index, element) in block.elements.iter().enumerate() {
            let bo_id = mapping.bo_id(&element.data);
            let ordering = mapping.bo_ordering(&element.data);
            match latest.get(&bo_id) {
                Some((current, _)) if *current > ordering => {},
                _ => {
                    latest.insert(bo_id, (ordering, index));
                },
            }
        }

        let meta = block.meta();
        let mut rows: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for (_, index) in latest.into_values() {
            let element = &block.elements[index];
            let deleted = element.operation == Operation::Delete;
            for (table, mut table_rows) in mapping.to_records(&element.data, &meta, deleted) {
                rows.entry(table).or_default().append(&mut table_rows);
            }
        }
        rows
    }
}

fn text<'a>(row: &'a Record, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

#[async_trait]
impl<D, C> BlockStore<D, C> for CatalogStore<D>
where
    D: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    async fn setup(&self, reset: bool) -> Result<()> {
        if reset {
            self.bootstrap(true).await?;
            let _ = self.ready.set(());
            return Ok(());
        }
        self.ensure_ready().await
    }

    #[instrument(skip(self, block), fields(block_id = %block.uuid, elements = block.elements.len()))]
    async fn commit(&self, block: &Block<D, C>) -> Result<CommitOutcome> {
        self.ensure_ready().await?;

        let tables = self.mapping.tables();
        let header = self.header(&tables)?;
        if self.catalog.is_applied(&self.namespace, &header.name, block.uuid).await? {
            debug!("Block already committed");
            return Ok(CommitOutcome::AlreadyApplied);
        }

        let mut rows = self.rows(block);
        if let Some(unknown) = rows.keys().find(|name| tables.iter().all(|t| &t.name != *name)) {
            return Err(ImportError::SchemaConflict(format!(
                "rows for unknown table {}.{}",
                self.namespace, unknown
            )));
        }

        let Some(header_rows) = rows.remove(&header.name).filter(|r| !r.is_empty()) else {
            debug!("Block has no rows");
            return Ok(CommitOutcome::Applied);
        };
        for table in &tables[1..] {
            let Some(table_rows) = rows.get(&table.name).filter(|r| !r.is_empty()) else {
                continue;
            };
            self.catalog
                .append(&self.namespace, table, block.uuid, table_rows)
                .await?;
        }
        debug!(objects = header_rows.len(), "Committing header");
        Ok(self
            .catalog
            .append(&self.namespace, header, block.uuid, &header_rows)
            .await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::schema::{COL_BO_PARTITION_KEY, COL_LAST_UPDATE};
    use crate::catalog::warehouse::tests::memory_catalog;
    use crate::catalog::{CatalogError, Column, ColumnType};
    use crate::pipeline::Element;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    struct Doc {
        id: &'static str,
        at: &'static str,
        note: &'static str,
    }

    struct DocMapping;

    impl BoMapping<Doc> for DocMapping {
        fn bo_type(&self) -> &str {
            "DOC"
        }

        fn tables(&self) -> Vec<TableSchema> {
            vec![
                TableSchema::with_base_columns("doc", vec![Column::optional("note", ColumnType::String)]),
                TableSchema::with_base_columns("doc_line", vec![Column::optional("line", ColumnType::Long)]),
            ]
        }

        fn bo_id(&self, data: &Doc) -> String {
            data.id.to_string()
        }

        fn bo_partition(&self, _data: &Doc) -> String {
            "p".to_string()
        }

        fn bo_ordering(&self, data: &Doc) -> String {
            data.at.to_string()
        }

        fn to_records(&self, data: &Doc, block: &BlockMeta, deleted: bool) -> BTreeMap<String, Vec<Record>> {
            let base = |row_id: String| {
                Record::from([
                    (COL_SANDBOX_PACKAGE_GUID.to_string(), Value::from(block.uuid.to_string())),
                    (COL_LAST_UPDATE.to_string(), Value::from(block.created_at)),
                    (COL_BO_ID.to_string(), Value::from(self.bo_id(data))),
                    (COL_BO_PARTITION_KEY.to_string(), Value::from(self.bo_partition(data))),
                    (COL_BO_ORDERING.to_string(), Value::from(data.at)),
                    (COL_ROW_ID.to_string(), Value::from(row_id)),
                    (COL_DELETED.to_string(), Value::from(deleted)),
                ])
            };
            let mut header = base(data.id.to_string());
            header.insert("note".into(), Value::from(data.note));
            let mut line = base(format!("{}-1", data.id));
            line.insert("line".into(), Value::Long(1));
            BTreeMap::from([
                ("doc".to_string(), vec![header]),
                ("doc_line".to_string(), vec![line]),
            ])
        }
    }

    /// Fails the first header append after its child tables were written
    struct HeaderFailsOnce {
        inner: Arc<dyn Catalog>,
        failed: AtomicBool,
    }

    #[async_trait]
    impl Catalog for HeaderFailsOnce {
        async fn ensure_namespace(&self, namespace: &str) -> std::result::Result<(), CatalogError> {
            self.inner.ensure_namespace(namespace).await
        }

        async fn load_table(
            &self,
            namespace: &str,
            table: &str,
        ) -> std::result::Result<Option<TableSchema>, CatalogError> {
            self.inner.load_table(namespace, table).await
        }

        async fn create_table(&self, namespace: &str, schema: &TableSchema) -> std::result::Result<(), CatalogError> {
            self.inner.create_table(namespace, schema).await
        }

        async fn drop_table(&self, namespace: &str, table: &str) -> std::result::Result<(), CatalogError> {
            self.inner.drop_table(namespace, table).await
        }

        async fn is_applied(
            &self,
            namespace: &str,
            table: &str,
            commit_id: Uuid,
        ) -> std::result::Result<bool, CatalogError> {
            self.inner.is_applied(namespace, table, commit_id).await
        }

        async fn append(
            &self,
            namespace: &str,
            schema: &TableSchema,
            commit_id: Uuid,
            rows: &[Record],
        ) -> std::result::Result<CommitOutcome, CatalogError> {
            if schema.name == "doc" && !self.failed.swap(true, Ordering::SeqCst) {
                return Err(CatalogError::Unavailable("connection reset".into()));
            }
            self.inner.append(namespace, schema, commit_id, rows).await
        }

        async fn scan(&self, namespace: &str, schema: &TableSchema) -> std::result::Result<Vec<Record>, CatalogError> {
            self.inner.scan(namespace, schema).await
        }
    }

    fn block(docs: &[(Doc, Operation)]) -> Block<Doc, ()> {
        Block {
            uuid: Uuid::now_v7(),
            created_at: Utc::now(),
            elements: docs
                .iter()
                .map(|(doc, operation)| Element {
                    data: doc.clone(),
                    soc_cod: "045".into(),
                    bo_type: "DOC".into(),
                    bo_cod: doc.id.into(),
                    operation: *operation,
                    size: 1,
                    ctx: (),
                })
                .collect(),
            errors: Vec::new(),
        }
    }

    fn doc(id: &'static str, at: &'static str, note: &'static str) -> Doc {
        Doc { id, at, note }
    }

    async fn store() -> CatalogStore<Doc> {
        let catalog = Arc::new(memory_catalog().await);
        CatalogStore::new(catalog, "whm", Arc::new(DocMapping))
    }

    fn notes(rows: &[Record]) -> Vec<&str> {
        rows.iter().map(|r| r["note"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_commit_bootstraps_tables() {
        let catalog = Arc::new(memory_catalog().await);
        let store: CatalogStore<Doc> = CatalogStore::new(catalog.clone(), "whm", Arc::new(DocMapping));
        let block = block(&[(doc("A", "1", "first"), Operation::Sync)]);

        let outcome = store.commit(&block).await.unwrap();

        assert_eq!(outcome, CommitOutcome::Applied);
        assert!(catalog.load_table("whm", "doc_line").await.unwrap().is_some());
        assert_eq!(notes(&store.scan("doc").await.unwrap()), vec!["first"]);
        assert_eq!(store.scan("doc_line").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_before_any_commit_is_empty() {
        let store = store().await;

        assert!(store.scan("doc").await.unwrap().is_empty());
        assert!(store.scan("doc_line").await.unwrap().is_empty());
        let err = store.scan("doc_note").await.unwrap_err();
        assert!(matches!(err, ImportError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_block_keeps_latest_version_per_object() {
        let store = store().await;
        let block = block(&[
            (doc("A", "2", "newest"), Operation::Sync),
            (doc("A", "1", "older"), Operation::Sync),
            (doc("B", "5", "tie-first"), Operation::Sync),
            (doc("B", "5", "tie-second"), Operation::Sync),
        ]);

        let rows = store.rows(&block);
        assert_eq!(notes(&rows["doc"]), vec!["newest", "tie-second"]);
        assert_eq!(rows["doc_line"].len(), 2);
    }

    #[tokio::test]
    async fn test_replayed_block_is_noop() {
        let catalog = Arc::new(memory_catalog().await);
        let store: CatalogStore<Doc> = CatalogStore::new(catalog.clone(), "whm", Arc::new(DocMapping));
        let block = block(&[(doc("A", "1", "x"), Operation::Sync)]);

        store.commit(&block).await.unwrap();
        assert_eq!(store.commit(&block).await.unwrap(), CommitOutcome::AlreadyApplied);

        assert_eq!(store.scan("doc").await.unwrap().len(), 1);
        assert_eq!(store.scan("doc_line").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_later_block_with_older_ordering_loses() {
        let store = store().await;
        store
            .commit(&block(&[(doc("A", "2", "new"), Operation::Sync)]))
            .await
            .unwrap();
        store
            .commit(&block(&[(doc("A", "1", "stale"), Operation::Sync)]))
            .await
            .unwrap();

        assert_eq!(notes(&store.scan("doc").await.unwrap()), vec!["new"]);
        assert_eq!(store.scan("doc_line").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_hides_object() {
        let store = store().await;
        store
            .commit(&block(&[(doc("A", "1", "a"), Operation::Sync), (doc("B", "1", "b"), Operation::Sync)]))
            .await
            .unwrap();
        store
            .commit(&block(&[(doc("A", "2", "a"), Operation::Delete)]))
            .await
            .unwrap();

        assert_eq!(notes(&store.scan("doc").await.unwrap()), vec!["b"]);
        assert_eq!(store.scan("doc_line").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_block_is_invisible_until_header_commits() {
        let catalog = Arc::new(HeaderFailsOnce {
            inner: Arc::new(memory_catalog().await),
            failed: AtomicBool::new(false),
        });
        let store: CatalogStore<Doc> = CatalogStore::new(catalog, "whm", Arc::new(DocMapping));
        let block = block(&[(doc("A", "1", "a"), Operation::Sync)]);

        let err = store.commit(&block).await.unwrap_err();
        assert!(matches!(err, ImportError::CatalogUnavailable(_)));
        assert!(store.scan("doc_line").await.unwrap().is_empty());

        assert_eq!(store.commit(&block).await.unwrap(), CommitOutcome::Applied);
        assert_eq!(store.scan("doc_line").await.unwrap().len(), 1);
        assert_eq!(notes(&store.scan("doc").await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_reset_drops_rows() {
        let store = store().await;
        store
            .commit(&block(&[(doc("A", "1", "a"), Operation::Sync)]))
            .await
            .unwrap();

        BlockStore::<Doc, ()>::setup(&store, true).await.unwrap();

        assert!(store.scan("doc").await.unwrap().is_empty());
        assert!(store.scan("doc_line").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_setup_rejects_foreign_schema() {
        let catalog = Arc::new(memory_catalog().await);
        catalog.ensure_namespace("whm").await.unwrap();
        catalog
            .create_table("whm", &TableSchema::with_base_columns("doc", Vec::new()))
            .await
            .unwrap();
        let store: CatalogStore<Doc> = CatalogStore::new(catalog, "whm", Arc::new(DocMapping));

        let err = BlockStore::<Doc, ()>::setup(&store, false).await.unwrap_err();
        assert!(matches!(err, ImportError::SchemaConflict(_)));
    }
}
