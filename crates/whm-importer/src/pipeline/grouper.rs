//! Size, weight and time based batching
//!
//! The grouper buffers prepared items in arrival order and cuts a block when
//! the item count (elements plus errors) reaches `batch_size`, when the
//! element bytes reach `batch_weight_bytes`, when `flush_interval` has passed
//! since the first buffered item, or when the sweep ends.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use whm_common::BlockIdGenerator;

use super::types::{Block, Element, ElementError, Prepared};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_WEIGHT_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupConfig {
    pub batch_size: usize,
    pub batch_weight_bytes: u64,
    pub flush_interval: Duration,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_weight_bytes: DEFAULT_BATCH_WEIGHT_BYTES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

pub struct Grouper<D, C> {
    config: GroupConfig,
    ids: Arc<BlockIdGenerator>,
    elements: Vec<Element<D, C>>,
    errors: Vec<ElementError<C>>,
    weight: u64,
    first_at: Option<Instant>,
}

impl<D, C> Grouper<D, C> {
    pub fn new(config: GroupConfig, ids: Arc<BlockIdGenerator>) -> Self {
        Self {
            config,
            ids,
            elements: Vec::new(),
            errors: Vec::new(),
            weight: 0,
            first_at: None,
        }
    }

    /// Buffers one item, returning a block if a size or weight trigger fired
    pub fn push(&mut self, item: Prepared<D, C>) -> Option<Block<D, C>> {
        if self.first_at.is_none() {
            self.first_at = Some(Instant::now());
        }

        self.weight += item.weight();
        match item {
            Prepared::Element(element) => self.elements.push(element),
            Prepared::Error(error) => self.errors.push(error),
        }

        let count = self.elements.len() + self.errors.len();
        if count >= self.config.batch_size || self.weight >= self.config.batch_weight_bytes {
            return self.flush();
        }
        None
    }

    /// When the time trigger fires for the current buffer
    pub fn deadline(&self) -> Option<Instant> {
        self.first_at.map(|t| t + self.config.flush_interval)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.errors.is_empty()
    }

    /// Emits whatever is buffered as a freshly stamped block
    pub fn flush(&mut self) -> Option<Block<D, C>> {
        self.first_at = None;
        self.weight = 0;
        if self.is_empty() {
            return None;
        }

        Some(Block {
            uuid: self.ids.next_id(),
            created_at: Utc::now(),
            elements: std::mem::take(&mut self.elements),
            errors: std::mem::take(&mut self.errors),
        })
    }
}
