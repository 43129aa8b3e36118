//! [`Catalog`] over an Iceberg catalog
//!
//! Each append writes one Parquet data file and commits it with a single
//! fast-append transaction. The block uuid is stored in the snapshot
//! summary under [`COMMIT_ID_PROPERTY`], which is how a replayed append is
//! recognised and skipped.

use async_trait::async_trait;
use futures::TryStreamExt;
use iceberg::arrow::schema_to_arrow_schema;
use iceberg::io::{S3_ENDPOINT, S3_REGION};
use iceberg::spec::DataFileFormat;
use iceberg::table::Table;
use iceberg::transaction::{ApplyTransactionAction, Transaction};
use iceberg::writer::base_writer::data_file_writer::DataFileWriterBuilder;
use iceberg::writer::file_writer::location_generator::{
    DefaultFileNameGenerator, DefaultLocationGenerator,
};
use iceberg::writer::file_writer::ParquetWriterBuilder;
use iceberg::writer::{IcebergWriter, IcebergWriterBuilder};
use iceberg::{CatalogBuilder, NamespaceIdent, TableCreation, TableIdent};
use iceberg_catalog_rest::{RestCatalogBuilder, REST_CATALOG_PROP_URI, REST_CATALOG_PROP_WAREHOUSE};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::batch::{from_batch, to_batch};
use super::{Catalog, CatalogError, CommitOutcome, Record, TableSchema};

/// Snapshot summary property holding the block uuid that wrote it
pub const COMMIT_ID_PROPERTY: &str = "whm.commit-id";

/// Connection settings of an Iceberg REST catalog with S3 storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestCatalogSettings {
    pub uri: String,
    /// Warehouse location, e.g. `s3://bucket/data/database`
    pub warehouse: String,
    pub region: String,
    pub endpoint: Option<String>,
}

pub struct WarehouseCatalog {
    inner: Arc<dyn iceberg::Catalog>,
}

impl WarehouseCatalog {
    pub fn new(inner: Arc<dyn iceberg::Catalog>) -> Self {
        Self { inner }
    }

    pub async fn connect(settings: &RestCatalogSettings) -> Result<Self, CatalogError> {
        let mut props = HashMap::from([
            (REST_CATALOG_PROP_URI.to_string(), settings.uri.clone()),
            (REST_CATALOG_PROP_WAREHOUSE.to_string(), settings.warehouse.clone()),
            (S3_REGION.to_string(), settings.region.clone()),
        ]);
        if let Some(endpoint) = &settings.endpoint {
            props.insert(S3_ENDPOINT.to_string(), endpoint.clone());
        }

        let catalog = RestCatalogBuilder::default().load("whm", props).await?;
        info!(uri = %settings.uri, warehouse = %settings.warehouse, "Connected to Iceberg catalog");
        Ok(Self::new(Arc::new(catalog)))
    }

    async fn table(&self, namespace: &str, table: &str) -> Result<Table, CatalogError> {
        Ok(self.inner.load_table(&table_ident(namespace, table)).await?)
    }
}

fn table_ident(namespace: &str, table: &str) -> TableIdent {
    TableIdent::new(NamespaceIdent::new(namespace.to_string()), table.to_string())
}

fn written_by(table: &Table, commit_id: Uuid) -> bool {
    let commit_id = commit_id.to_string();
    table.metadata().snapshots().any(|snapshot| {
        snapshot
            .summary()
            .additional_properties
            .get(COMMIT_ID_PROPERTY)
            .is_some_and(|id| *id == commit_id)
    })
}

#[async_trait]
impl Catalog for WarehouseCatalog {
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), CatalogError> {
        let ident = NamespaceIdent::new(namespace.to_string());
        if self.inner.namespace_exists(&ident).await? {
            return Ok(());
        }
        match self.inner.create_namespace(&ident, HashMap::new()).await {
            Ok(_) => {
                info!(namespace, "Namespace created");
                Ok(())
            },
            Err(e) if e.kind() == iceberg::ErrorKind::NamespaceAlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_table(
        &self,
        namespace: &str,
        table: &str,
    ) -> Result<Option<TableSchema>, CatalogError> {
        if !self.inner.table_exists(&table_ident(namespace, table)).await? {
            return Ok(None);
        }
        let loaded = self.table(namespace, table).await?;
        Ok(Some(TableSchema::from_iceberg(
            table,
            loaded.metadata().current_schema(),
        )?))
    }

    #[instrument(skip(self, schema), fields(table = %schema.name))]
    async fn create_table(&self, namespace: &str, schema: &TableSchema) -> Result<(), CatalogError> {
        let creation = TableCreation::builder()
            .name(schema.name.clone())
            .schema(schema.to_iceberg()?)
            .build();
        let ident = NamespaceIdent::new(namespace.to_string());
        match self.inner.create_table(&ident, creation).await {
            Ok(_) => {
                info!("Table created");
                Ok(())
            },
            Err(e) if e.kind() == iceberg::ErrorKind::TableAlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_table(&self, namespace: &str, table: &str) -> Result<(), CatalogError> {
        match self.inner.drop_table(&table_ident(namespace, table)).await {
            Ok(()) => {
                info!(namespace, table, "Table dropped");
                Ok(())
            },
            Err(e) if e.kind() == iceberg::ErrorKind::TableNotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_applied(
        &self,
        namespace: &str,
        table: &str,
        commit_id: Uuid,
    ) -> Result<bool, CatalogError> {
        Ok(written_by(&self.table(namespace, table).await?, commit_id))
    }

    #[instrument(skip(self, schema, rows), fields(table = %schema.name, rows = rows.len()))]
    async fn append(
        &self,
        namespace: &str,
        schema: &TableSchema,
        commit_id: Uuid,
        rows: &[Record],
    ) -> Result<CommitOutcome, CatalogError> {
        let table = self.table(namespace, &schema.name).await?;
        if written_by(&table, commit_id) {
            debug!("Commit already in table history");
            return Ok(CommitOutcome::AlreadyApplied);
        }
        for row in rows {
            schema.validate(row)?;
        }

        let metadata = table.metadata();
        let arrow_schema = Arc::new(schema_to_arrow_schema(metadata.current_schema())?);
        let batch = to_batch(schema, arrow_schema, rows)?;

        let writer_props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let location_gen = DefaultLocationGenerator::new(metadata.clone())?;
        let file_name_gen = DefaultFileNameGenerator::new(
            "data".to_string(),
            Some(commit_id.to_string()),
            DataFileFormat::Parquet,
        );
        let parquet_writer_builder = ParquetWriterBuilder::new(
            writer_props,
            metadata.current_schema().clone(),
            None,
            table.file_io().clone(),
            location_gen,
            file_name_gen,
        );
        let mut writer = DataFileWriterBuilder::new(
            parquet_writer_builder,
            None,
            metadata.default_partition_spec_id(),
        )
        .build()
        .await?;
        writer.write(batch).await?;
        let data_files = writer.close().await?;

        let transaction = Transaction::new(&table);
        let append = transaction
            .fast_append()
            .with_check_duplicate(false)
            .set_snapshot_properties(HashMap::from([(
                COMMIT_ID_PROPERTY.to_string(),
                commit_id.to_string(),
            )]))
            .add_data_files(data_files);
        let transaction = ApplyTransactionAction::apply(append, transaction)?;
        transaction.commit(self.inner.as_ref()).await?;

        info!(%commit_id, "Rows appended");
        Ok(CommitOutcome::Applied)
    }

    async fn scan(&self, namespace: &str, schema: &TableSchema) -> Result<Vec<Record>, CatalogError> {
        let table = self.table(namespace, &schema.name).await?;
        let Some(snapshot_id) = table.metadata().current_snapshot_id() else {
            return Ok(Vec::new());
        };

        let mut stream = table
            .scan()
            .snapshot_id(snapshot_id)
            .select_all()
            .build()?
            .to_arrow()
            .await?;

        let mut rows = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            rows.extend(from_batch(schema, &batch)?);
        }
        Ok(rows)
    }
}
