//! Object-store adapters for the pipeline: listing, loading and archival

pub mod archiver;
pub mod lister;
pub mod loader;

pub use archiver::{ArchiveTask, ObjectArchiver, DEFAULT_ARCHIVE_CONCURRENCY};
pub use lister::XmlLister;
pub use loader::ObjectLoader;
