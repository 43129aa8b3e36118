//! Moves a processed block's sources out of the landing zone
//!
//! Every element and error becomes one [`ArchiveTask`]. Tasks that write or
//! delete the same archive key run one after another in block order, so a
//! sync followed by a delete of the same object ends with no canonical copy.
//! Chains for different keys run on a bounded pool, and every task runs to
//! completion even when some fail, so a partially failed block still makes
//! progress. The error of the earliest failing task in block order is
//! returned; the others are logged.
//!
//! A source that is already gone when its copy starts counts as archived.
//! That makes a retry after partial progress converge instead of failing on
//! the objects the previous attempt already moved.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{ImportError, Result};
use crate::keys::base_name;
use crate::pipeline::{Archiver, Block, Operation, SourceHandle};
use crate::storage::{ObjectStore, StorageError};

pub const DEFAULT_ARCHIVE_CONCURRENCY: usize = 10;

/// One archival move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveTask {
    /// Copy the source to its canonical valid name, then delete the source
    Keep { source: String, dest: String },
    /// Delete the canonical valid copy, then delete the source
    Remove { source: String, canonical: String },
    /// Copy the source to the invalid folder, then delete the source
    Reject { source: String, dest: String },
    /// The element carries no source key
    MissingKey,
}

impl ArchiveTask {
    /// Archive key the task writes or deletes
    fn archive_key(&self) -> Option<&str> {
        match self {
            ArchiveTask::Keep { dest, .. } | ArchiveTask::Reject { dest, .. } => Some(dest),
            ArchiveTask::Remove { canonical, .. } => Some(canonical),
            ArchiveTask::MissingKey => None,
        }
    }

    async fn run(self, store: &dyn ObjectStore) -> Result<()> {
        match self {
            ArchiveTask::Keep { source, dest } | ArchiveTask::Reject { source, dest } => {
                match store.copy(&source, &dest).await {
                    Ok(()) => {},
                    Err(StorageError::NotFound(_)) => {
                        debug!(source = %source, "Source already moved");
                        return Ok(());
                    },
                    Err(e) => return Err(ImportError::Io(e.to_string())),
                }
                delete(store, &source).await
            },
            ArchiveTask::Remove { source, canonical } => {
                delete(store, &canonical).await?;
                delete(store, &source).await
            },
            ArchiveTask::MissingKey => Err(ImportError::Io("missing source key".to_string())),
        }
    }
}

async fn delete(store: &dyn ObjectStore, key: &str) -> Result<()> {
    store
        .delete(key)
        .await
        .map_err(|e| ImportError::Io(e.to_string()))
}

/// Archives blocks inside one bucket
pub struct ObjectArchiver {
    store: Arc<dyn ObjectStore>,
    path_valid: String,
    path_invalid: String,
    concurrency: usize,
}

impl ObjectArchiver {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        path_valid: impl Into<String>,
        path_invalid: impl Into<String>,
    ) -> Self {
        Self {
            store,
            path_valid: path_valid.into(),
            path_invalid: path_invalid.into(),
            concurrency: DEFAULT_ARCHIVE_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Canonical valid-archive key of a business object
    pub fn valid_key(&self, bo_cod: &str) -> String {
        join_key(&self.path_valid, &format!("{bo_cod}.xml"))
    }

    pub fn invalid_key(&self, source: &str) -> String {
        join_key(&self.path_invalid, base_name(source))
    }

    /// Tasks for a block: elements first, then errors, each in block order
    pub fn plan<D, C: SourceHandle>(&self, block: &Block<D, C>) -> Vec<ArchiveTask> {
        let elements = block.elements.iter().map(|element| {
            let source = element.ctx.key();
            if source.is_empty() {
                return ArchiveTask::MissingKey;
            }
            let canonical = self.valid_key(&element.bo_cod);
            match element.operation {
                Operation::Sync => ArchiveTask::Keep {
                    source: source.to_string(),
                    dest: canonical,
                },
                Operation::Delete => ArchiveTask::Remove {
                    source: source.to_string(),
                    canonical,
                },
            }
        });

        let errors = block.errors.iter().map(|err| {
            let source = err.ctx.key();
            if source.is_empty() {
                return ArchiveTask::MissingKey;
            }
            ArchiveTask::Reject {
                source: source.to_string(),
                dest: self.invalid_key(source),
            }
        });

        elements.chain(errors).collect()
    }
}

/// Groups tasks by archive key, keeping block order inside each chain and
/// ordering chains by their first task
fn chains(tasks: Vec<ArchiveTask>) -> Vec<Vec<(usize, ArchiveTask)>> {
    let mut chains: Vec<Vec<(usize, ArchiveTask)>> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for (index, task) in tasks.into_iter().enumerate() {
        let slot = match task.archive_key() {
            Some(key) => *by_key.entry(key.to_string()).or_insert(chains.len()),
            None => chains.len(),
        };
        if slot == chains.len() {
            chains.push(Vec::new());
        }
        chains[slot].push((index, task));
    }
    chains
}

fn join_key(folder: &str, name: &str) -> String {
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

#[async_trait]
impl<D, C> Archiver<D, C> for ObjectArchiver
where
    D: Send + Sync,
    C: SourceHandle,
{
    async fn archive(&self, block: &Block<D, C>) -> Result<()> {
        let tasks = self.plan(block);
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<Vec<(usize, Result<()>)>> = JoinSet::new();

        for chain in chains(tasks) {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ImportError::Io(format!("archive pool closed: {e}")))?;
            let store = self.store.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let mut results = Vec::with_capacity(chain.len());
                for (index, task) in chain {
                    results.push((index, task.run(store.as_ref()).await));
                }
                results
            });
        }

        let mut first_error: Option<(usize, ImportError)> = None;
        let mut failed = 0usize;
        while let Some(joined) = join_set.join_next().await {
            let failures: Vec<(usize, ImportError)> = match joined {
                Ok(results) => results
                    .into_iter()
                    .filter_map(|(index, result)| result.err().map(|err| (index, err)))
                    .collect(),
                Err(join_err) => vec![(
                    usize::MAX,
                    ImportError::Io(format!("archive task panicked: {join_err}")),
                )],
            };
            for (index, err) in failures {
                failed += 1;
                error!(block_id = %block.uuid, task = index, kind = %err.kind(), error = %err, "Archive task failed");
                match &first_error {
                    Some((first, _)) if *first <= index => {},
                    _ => first_error = Some((index, err)),
                }
            }
        }

        match first_error {
            Some((_, err)) => {
                error!(block_id = %block.uuid, failed, total, "Block partially archived");
                Err(err)
            },
            None => {
                debug!(block_id = %block.uuid, total, "Block archived");
                Ok(())
            },
        }
    }
}
