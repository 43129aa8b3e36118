use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::Lister;
use crate::storage::{ObjectInfo, ObjectStore};

/// Lists `.xml` objects under a prefix
pub struct XmlLister {
    store: Arc<dyn ObjectStore>,
}

impl XmlLister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Lister<ObjectInfo> for XmlLister {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let objects: Vec<ObjectInfo> = self
            .store
            .list(prefix)
            .await?
            .into_iter()
            .filter(|o| o.key.ends_with(".xml"))
            .collect();
        debug!(prefix, count = objects.len(), "Listed xml objects");
        Ok(objects)
    }
}
