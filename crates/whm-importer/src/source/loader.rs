use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::Loader;
use crate::storage::{ObjectInfo, ObjectStore};

/// Fetches an object's body in one request
pub struct ObjectLoader {
    store: Arc<dyn ObjectStore>,
}

impl ObjectLoader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Loader<ObjectInfo> for ObjectLoader {
    async fn load(&self, source: &ObjectInfo) -> Result<Vec<u8>> {
        Ok(self.store.get(&source.key).await?)
    }
}
