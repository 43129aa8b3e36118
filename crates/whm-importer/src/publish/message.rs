use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// FIFO message body announcing one committed block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMessage {
    pub asset_id: String,
    pub sbx_package_guid: String,
}

impl PackageMessage {
    pub fn new(asset_id: impl Into<String>, block_id: Uuid) -> Self {
        Self {
            asset_id: asset_id.into(),
            sbx_package_guid: block_id.to_string(),
        }
    }

    /// Message group preserving per-asset order
    pub fn group_id(&self) -> String {
        format!("{}-IO", self.asset_id)
    }

    /// Deduplication token, the block uuid itself
    pub fn deduplication_id(&self) -> &str {
        &self.sbx_package_guid
    }
}
