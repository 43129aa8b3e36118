//! Pipeline data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ErrorKind, ImportError};
use crate::keys::{ParsedKey, PartialKey};

/// Intended mutation carried by a source object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Sync,
    Delete,
}

impl Operation {
    /// Parses the one-letter code used in live file names
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(Operation::Sync),
            "D" => Some(Operation::Delete),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Operation::Sync => "S",
            Operation::Delete => "D",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Sync => f.write_str("sync"),
            Operation::Delete => f.write_str("delete"),
        }
    }
}

/// One decoded source object
#[derive(Debug, Clone)]
pub struct Element<D, C> {
    pub data: D,
    pub soc_cod: String,
    pub bo_type: String,
    pub bo_cod: String,
    pub operation: Operation,
    /// Source byte count, drives the weight trigger
    pub size: u64,
    pub ctx: C,
}

/// A source object that could not become an [`Element`]
#[derive(Debug, Clone)]
pub struct ElementError<C> {
    pub kind: ErrorKind,
    pub message: String,
    pub soc_cod: String,
    pub bo_type: String,
    pub bo_cod: String,
    pub operation: Option<Operation>,
    pub ctx: C,
}

impl<C> ElementError<C> {
    /// An object whose key parsed but whose content was rejected
    pub fn new(error: &ImportError, key: ParsedKey, ctx: C) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            soc_cod: key.soc_cod,
            bo_type: key.bo_type,
            bo_cod: key.bo_cod,
            operation: Some(key.operation),
            ctx,
        }
    }

    /// An object rejected by its key
    pub fn unparsed(error: &ImportError, key: PartialKey, ctx: C) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            soc_cod: key.soc_cod,
            bo_type: key.bo_type,
            bo_cod: key.bo_cod,
            operation: None,
            ctx,
        }
    }
}

/// Output of the load and decode stage for one listed object
#[derive(Debug)]
pub enum Prepared<D, C> {
    Element(Element<D, C>),
    Error(ElementError<C>),
}

impl<D, C> Prepared<D, C> {
    /// Bytes counted towards the weight trigger; errors weigh nothing
    pub fn weight(&self) -> u64 {
        match self {
            Prepared::Element(e) => e.size,
            Prepared::Error(_) => 0,
        }
    }
}

/// Identity of a block, shared by everything a commit writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
}

/// The unit of commit, publish and archive
#[derive(Debug, Clone)]
pub struct Block<D, C> {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub elements: Vec<Element<D, C>>,
    pub errors: Vec<ElementError<C>>,
}

impl<D, C> Block<D, C> {
    pub fn meta(&self) -> BlockMeta {
        BlockMeta {
            uuid: self.uuid,
            created_at: self.created_at,
        }
    }

    pub fn weight(&self) -> u64 {
        self.elements.iter().map(|e| e.size).sum()
    }

    pub fn len(&self) -> usize {
        self.elements.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.errors.is_empty()
    }
}
