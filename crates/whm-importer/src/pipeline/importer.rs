//! One sweep over the source folder
//!
//! `run_once` lists the sweep root, prepares each object (key parse, load,
//! decode) with bounded fan-out, feeds results to the [`Grouper`] in listing
//! order and processes each emitted block as `commit -> publish -> archive`.
//! The steps are never reordered: a block is published only after the store
//! acknowledged it, and archived only after it was published.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use whm_common::{retry, BlockIdGenerator, RetryError, RetryPolicy};

use super::grouper::{GroupConfig, Grouper};
use super::traits::{Archiver, BlockStore, Decoder, Lister, Loader, Publisher, SourceHandle};
use super::types::{Block, Element, ElementError, Prepared};
use crate::catalog::CommitOutcome;
use crate::error::{ImportError, Result};
use crate::keys::KeyGrammar;

pub const DEFAULT_LOAD_CONCURRENCY: usize = 8;

/// Collaborators of an [`Importer`]
pub struct ImporterParts<D, C> {
    pub lister: Arc<dyn Lister<C>>,
    pub loader: Arc<dyn Loader<C>>,
    pub decoder: Arc<dyn Decoder<D>>,
    pub store: Arc<dyn BlockStore<D, C>>,
    pub publisher: Arc<dyn Publisher>,
    pub archiver: Arc<dyn Archiver<D, C>>,
}

#[derive(Debug, Clone)]
pub struct ImporterSettings {
    /// Listing prefix of the sweep root
    pub prefix: String,
    pub grammar: KeyGrammar,
    pub group: GroupConfig,
    pub retry: RetryPolicy,
    pub load_concurrency: usize,
}

/// Counters of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub listed: usize,
    pub skipped: usize,
    pub blocks: usize,
    pub replayed_blocks: usize,
    pub elements: usize,
    pub errors: usize,
}

pub struct Importer<D, C> {
    parts: ImporterParts<D, C>,
    settings: ImporterSettings,
    ids: Arc<BlockIdGenerator>,
}

impl<D, C> Importer<D, C>
where
    D: Send + Sync + 'static,
    C: SourceHandle,
{
    pub fn new(parts: ImporterParts<D, C>, settings: ImporterSettings) -> Self {
        Self {
            parts,
            settings,
            ids: Arc::new(BlockIdGenerator::new()),
        }
    }

    /// Runs one sweep. Sources are archived only when `live` is set.
    #[instrument(skip(self, cancel), fields(prefix = %self.settings.prefix))]
    pub async fn run_once(&self, live: bool, cancel: &CancellationToken) -> Result<SweepReport> {
        let policy = self.settings.retry;
        let prefix = self.settings.prefix.as_str();

        let objects = retry(&policy, cancel, "list", || self.parts.lister.list(prefix)).await?;
        let mut report = SweepReport {
            listed: objects.len(),
            ..SweepReport::default()
        };
        info!(objects = objects.len(), live, "Sweep started");

        let mut grouper = Grouper::new(self.settings.group, self.ids.clone());
        let prepared = stream::iter(objects)
            .map(|object| self.prepare(object, cancel))
            .buffered(self.settings.load_concurrency.max(1));
        tokio::pin!(prepared);

        loop {
            let deadline = grouper.deadline();
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ImportError::Cancelled),
                _ = sleep_until(deadline) => {
                    if let Some(block) = grouper.flush() {
                        debug!(block_id = %block.uuid, "Flush interval elapsed");
                        self.process_block(block, live, cancel, &mut report).await?;
                    }
                    continue;
                },
                item = prepared.next() => item,
            };

            let Some(item) = next else { break };
            match item? {
                Some(item) => {
                    if let Some(block) = grouper.push(item) {
                        self.process_block(block, live, cancel, &mut report).await?;
                    }
                },
                None => report.skipped += 1,
            }
        }

        if let Some(block) = grouper.flush() {
            self.process_block(block, live, cancel, &mut report).await?;
        }

        info!(
            blocks = report.blocks,
            elements = report.elements,
            errors = report.errors,
            skipped = report.skipped,
            "Sweep finished"
        );
        Ok(report)
    }

    /// Key parse, load and decode one object. `Ok(None)` means the object
    /// disappeared after listing and is skipped.
    async fn prepare(&self, object: C, cancel: &CancellationToken) -> Result<Option<Prepared<D, C>>> {
        let key = match self.settings.grammar.parse(object.key()) {
            Ok(key) => key,
            Err(err) => {
                warn!(key = object.key(), kind = %err.error.kind(), error = %err.error, "Rejected object key");
                return Ok(Some(Prepared::Error(ElementError::unparsed(&err.error, err.partial, object))));
            },
        };

        let loaded = retry(&self.settings.retry, cancel, "load", || {
            self.parts.loader.load(&object)
        })
        .await;
        let raw = match loaded {
            Ok(raw) => raw,
            Err(RetryError::Failed(ImportError::SourceMissing(k))) => {
                warn!(key = %k, "Source vanished before load, skipping");
                return Ok(None);
            },
            Err(err) => return Err(err.into()),
        };

        match self.parts.decoder.decode(&raw) {
            Ok(data) => Ok(Some(Prepared::Element(Element {
                data,
                soc_cod: key.soc_cod,
                bo_type: key.bo_type,
                bo_cod: key.bo_cod,
                operation: key.operation,
                size: object.size().max(raw.len() as u64),
                ctx: object,
            }))),
            Err(err) => {
                warn!(key = object.key(), kind = %err.kind(), error = %err, "Failed to decode object");
                Ok(Some(Prepared::Error(ElementError::new(&err, key, object))))
            },
        }
    }

    #[instrument(
        skip_all,
        fields(block_id = %block.uuid, elements = block.elements.len(), errors = block.errors.len())
    )]
    async fn process_block(
        &self,
        block: Block<D, C>,
        live: bool,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) -> Result<()> {
        let policy = self.settings.retry;

        if !block.elements.is_empty() {
            let outcome = retry(&policy, cancel, "commit", || self.parts.store.commit(&block))
                .await
                .map_err(|e| log_block_failure("commit", e))?;
            if outcome == CommitOutcome::AlreadyApplied {
                report.replayed_blocks += 1;
                info!("Block already committed, skipping to publish");
            }

            let meta = block.meta();
            retry(&policy, cancel, "publish", || self.parts.publisher.publish(&meta))
                .await
                .map_err(|e| log_block_failure("publish", e))?;
        }

        if live {
            retry(&policy, cancel, "archive", || self.parts.archiver.archive(&block))
                .await
                .map_err(|e| log_block_failure("archive", e))?;
        }

        report.blocks += 1;
        report.elements += block.elements.len();
        report.errors += block.errors.len();
        info!(live, "Block processed");
        Ok(())
    }
}

fn log_block_failure(step: &str, err: RetryError<ImportError>) -> ImportError {
    let err = ImportError::from(err);
    if !matches!(err, ImportError::Cancelled) {
        error!(step, kind = %err.kind(), retryable = err.is_retryable(), error = %err, "Block step failed");
    }
    err
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
