//! Shared fixtures for the importer integration tests
//!
//! Sources and archives live in a [`MemoryObjectStore`]; the tables live in
//! an in-memory Iceberg catalog.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use iceberg::memory::{MemoryCatalogBuilder, MEMORY_CATALOG_WAREHOUSE};
use iceberg::{CatalogBuilder, NamespaceIdent, TableIdent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use whm_common::RetryPolicy;

use whm_importer::catalog::{Record, Value, WarehouseCatalog};
use whm_importer::error::{ImportError, Result};
use whm_importer::keys::join_prefix;
use whm_importer::pipeline::{
    BlockMeta, GroupConfig, Importer, ImporterParts, ImporterSettings, Lister, Loader, Publisher,
};
use whm_importer::source::{ObjectArchiver, ObjectLoader, XmlLister};
use whm_importer::storage::{MemoryObjectStore, ObjectInfo, ObjectStore};
use whm_importer::store::CatalogStore;
use whm_importer::whmovement::{
    tables, WhMovementDecoder, WhMovementMapping, WhMovementSyncDel, BO_TYPE,
};
use whm_importer::KeyGrammar;

pub const SOURCE: &str = "data/landing_zone";
pub const ARCHIVE: &str = "data/archive";
pub const INVALID: &str = "data/invalid";
pub const NAMESPACE: &str = "whm";
pub const SOC: &str = "045";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,whm_importer=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Empty Iceberg catalog over an in-memory file system
pub async fn memory_catalog() -> Arc<dyn iceberg::Catalog> {
    let catalog = MemoryCatalogBuilder::default()
        .load(
            "memory",
            HashMap::from([(
                MEMORY_CATALOG_WAREHOUSE.to_string(),
                "memory://warehouse".to_string(),
            )]),
        )
        .await
        .unwrap();
    Arc::new(catalog)
}

/// A WHMOVEMENT document with one row
pub fn movement_xml(num: i64, created: &str, qta: f64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<WHMovementSyncDel>
  <APPLICATIONAREA>
    <DATACREAZIONE>{created}</DATACREAZIONE>
  </APPLICATIONAREA>
  <DATAAREA>
    <WHMOVEMENT>
      <MGT_SOC_COD>045</MGT_SOC_COD>
      <MGT_MGA_COD>M01</MGT_MGA_COD>
      <MGT_ANNO>2025</MGT_ANNO>
      <MGT_INM_COD>C</MGT_INM_COD>
      <MGT_NUM>{num}</MGT_NUM>
      <MGT_DATA_INS>2025-05-06</MGT_DATA_INS>
      <MGT_QTA_TOT>{qta}</MGT_QTA_TOT>
      <DETTBMGR>
        <BMGR>
          <MGR_RIGA>1</MGR_RIGA>
          <MGR_ART_COD>ART-{num}</MGR_ART_COD>
          <MGR_QTA>{qta}</MGR_QTA>
        </BMGR>
      </DETTBMGR>
    </WHMOVEMENT>
  </DATAAREA>
</WHMovementSyncDel>"#
    )
}

pub fn live_key(timestamp: &str, bo_cod: &str, op: &str) -> String {
    format!("{SOURCE}/{SOC}/{BO_TYPE}/{timestamp}_{bo_cod}_{op}.xml")
}

pub fn archive_key(name: &str) -> String {
    format!("{ARCHIVE}/{SOC}/{BO_TYPE}/{name}")
}

pub fn invalid_key(name: &str) -> String {
    format!("{INVALID}/{SOC}/{BO_TYPE}/{name}")
}

/// `mgt_qta_tot` of every visible movement, keyed by `bo_id`
pub fn quantities(rows: &[Record]) -> Vec<(String, f64)> {
    rows.iter()
        .map(|row| {
            let bo_id = row["bo_id"].as_str().unwrap().to_string();
            let qta = match row["mgt_qta_tot"] {
                Value::Double(q) => q,
                Value::Long(q) => q as f64,
                ref other => panic!("unexpected quantity {other:?}"),
            };
            (bo_id, qta)
        })
        .collect()
}

/// Publisher that records every announcement and can fail the first calls
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<BlockMeta>>,
    failures: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn sent(&self) -> Vec<BlockMeta> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, block: &BlockMeta) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ImportError::Publish("throttled".into()));
        }
        self.sent.lock().unwrap().push(*block);
        Ok(())
    }
}

/// Loader whose every call fails with a transient error
pub struct BrokenLoader;

#[async_trait]
impl Loader<ObjectInfo> for BrokenLoader {
    async fn load(&self, source: &ObjectInfo) -> Result<Vec<u8>> {
        Err(ImportError::Io(format!("connection reset reading {}", source.key)))
    }
}

/// Loader that stalls on keys containing `marker` before reading them
pub struct SlowLoader {
    inner: ObjectLoader,
    marker: String,
    delay: Duration,
}

impl SlowLoader {
    pub fn new(store: Arc<dyn ObjectStore>, marker: &str, delay: Duration) -> Self {
        Self {
            inner: ObjectLoader::new(store),
            marker: marker.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl Loader<ObjectInfo> for SlowLoader {
    async fn load(&self, source: &ObjectInfo) -> Result<Vec<u8>> {
        if source.key.contains(&self.marker) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.load(source).await
    }
}

/// Lister that fails its first `failures` calls
pub struct FlakyLister {
    inner: XmlLister,
    failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FlakyLister {
    pub fn new(store: Arc<dyn ObjectStore>, failures: usize) -> Self {
        Self {
            inner: XmlLister::new(store),
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Lister<ObjectInfo> for FlakyLister {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ImportError::Io("list timed out".into()));
        }
        self.inner.list(prefix).await
    }
}

/// Importer wired to an in-memory bucket
pub struct Harness {
    pub objects: Arc<MemoryObjectStore>,
    pub iceberg: Arc<dyn iceberg::Catalog>,
    pub store: Arc<CatalogStore<WhMovementSyncDel>>,
    pub publisher: Arc<RecordingPublisher>,
    pub reinit: bool,
    pub group: GroupConfig,
    pub retry: RetryPolicy,
    pub lister: Option<Arc<dyn Lister<ObjectInfo>>>,
    pub loader: Option<Arc<dyn Loader<ObjectInfo>>>,
}

impl Harness {
    pub async fn new(objects: Arc<MemoryObjectStore>) -> Self {
        Self::with_catalog(objects, memory_catalog().await)
    }

    /// Harness writing to an existing catalog
    pub fn with_catalog(objects: Arc<MemoryObjectStore>, iceberg: Arc<dyn iceberg::Catalog>) -> Self {
        let store = Arc::new(CatalogStore::<WhMovementSyncDel>::new(
            Arc::new(WarehouseCatalog::new(iceberg.clone())),
            NAMESPACE,
            Arc::new(WhMovementMapping),
        ));
        Self {
            objects,
            iceberg,
            store,
            publisher: Arc::new(RecordingPublisher::new()),
            reinit: false,
            group: GroupConfig::default(),
            retry: RetryPolicy::immediate(3),
            lister: None,
            loader: None,
        }
    }

    pub fn reinit(mut self) -> Self {
        self.reinit = true;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.group.batch_size = batch_size;
        self
    }

    pub fn publisher(mut self, publisher: RecordingPublisher) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    pub fn lister(mut self, lister: Arc<dyn Lister<ObjectInfo>>) -> Self {
        self.lister = Some(lister);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn Loader<ObjectInfo>>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn importer(&self) -> Importer<WhMovementSyncDel, ObjectInfo> {
        let objects: Arc<dyn ObjectStore> = self.objects.clone();
        let root = if self.reinit { ARCHIVE } else { SOURCE };

        let lister: Arc<dyn Lister<ObjectInfo>> = match &self.lister {
            Some(lister) => lister.clone(),
            None => Arc::new(XmlLister::new(objects.clone())),
        };
        let loader: Arc<dyn Loader<ObjectInfo>> = match &self.loader {
            Some(loader) => loader.clone(),
            None => Arc::new(ObjectLoader::new(objects.clone())),
        };

        let parts = ImporterParts {
            lister,
            loader,
            decoder: Arc::new(WhMovementDecoder::new()),
            store: self.store.clone(),
            publisher: self.publisher.clone(),
            archiver: Arc::new(ObjectArchiver::new(
                objects.clone(),
                join_prefix(ARCHIVE, SOC, BO_TYPE),
                join_prefix(INVALID, SOC, BO_TYPE),
            )),
        };
        let settings = ImporterSettings {
            prefix: join_prefix(root, SOC, BO_TYPE),
            grammar: KeyGrammar::for_reinit(self.reinit),
            group: self.group,
            retry: self.retry,
            load_concurrency: 4,
        };
        Importer::new(parts, settings)
    }

    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.store.scan(table).await.unwrap()
    }

    /// Current metadata file of every WHMOVEMENT table
    pub async fn metadata_locations(&self) -> Vec<Option<String>> {
        let namespace = NamespaceIdent::new(NAMESPACE.to_string());
        let mut locations = Vec::new();
        for table in tables::all() {
            let ident = TableIdent::new(namespace.clone(), table.name);
            let loaded = self.iceberg.load_table(&ident).await.unwrap();
            locations.push(loaded.metadata_location().map(str::to_string));
        }
        locations
    }
}
