//! WHMOVEMENT business object
//!
//! Document model, decoder and the row mapping used by
//! [`CatalogStore`](crate::store::CatalogStore).

use std::collections::BTreeMap;

pub mod decoder;
pub mod model;
pub mod records;
pub mod tables;

pub use decoder::WhMovementDecoder;
pub use model::WhMovementSyncDel;

use crate::catalog::{Record, TableSchema};
use crate::pipeline::BlockMeta;
use crate::store::BoMapping;

pub const BO_TYPE: &str = "WHMOVEMENT";

/// Asset announced downstream for committed blocks
pub const ASSET_ID: &str = "warehouse-movement";

pub const APP_NAME: &str = "whmovement-importer";

#[derive(Debug, Clone, Copy, Default)]
pub struct WhMovementMapping;

impl BoMapping<WhMovementSyncDel> for WhMovementMapping {
    fn bo_type(&self) -> &str {
        BO_TYPE
    }

    fn tables(&self) -> Vec<TableSchema> {
        tables::all()
    }

    fn bo_id(&self, data: &WhMovementSyncDel) -> String {
        records::key_mgt(&data.data_area.movement)
    }

    fn bo_partition(&self, data: &WhMovementSyncDel) -> String {
        records::partition_key(&data.data_area.movement)
    }

    fn bo_ordering(&self, data: &WhMovementSyncDel) -> String {
        data.application_area.data_creazione.clone()
    }

    fn to_records(
        &self,
        data: &WhMovementSyncDel,
        block: &BlockMeta,
        deleted: bool,
    ) -> BTreeMap<String, Vec<Record>> {
        records::to_records(data, block, deleted)
    }
}
