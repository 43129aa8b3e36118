//! Generic import pipeline
//!
//! The pipeline is parameterised over the decoded business object `D` and
//! the source handle `C`. Capabilities are plugged in through the traits in
//! [`traits`]; [`Importer`] drives one sweep and [`Scheduler`] repeats them.

pub mod grouper;
pub mod importer;
pub mod scheduler;
pub mod traits;
pub mod types;

pub use grouper::{GroupConfig, Grouper};
pub use importer::{Importer, ImporterParts, ImporterSettings, SweepReport};
pub use scheduler::{ScheduleMode, Scheduler, SchedulerSettings};
pub use traits::{Archiver, BlockStore, Decoder, Lister, Loader, Publisher, SourceHandle};
pub use types::{Block, BlockMeta, Element, ElementError, Operation, Prepared};
