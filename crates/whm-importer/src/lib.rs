//! Warehouse-movement importer
//!
//! Discovers XML business-object documents in object storage, decodes them,
//! commits their rows to a partitioned table catalog, announces each
//! committed block on a FIFO queue and archives the sources.
//!
//! A sweep runs `list -> parse key -> load -> decode -> group -> commit ->
//! publish -> archive`. The pipeline in [`pipeline`] is generic over the
//! decoded business object `D` and the source handle `C`; [`whmovement`]
//! supplies the concrete WHMOVEMENT document model and table mapping.

pub mod catalog;
pub mod config;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod storage;
pub mod store;
pub mod whmovement;

pub use config::ImporterConfig;
pub use error::{ErrorKind, ImportError};
pub use keys::{KeyGrammar, ParsedKey, PartialKey};
