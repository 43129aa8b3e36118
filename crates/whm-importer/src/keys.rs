//! Object key grammars
//!
//! Live keys look like `<root>/<socCod>/<boType>/<timestamp>_<boCod>_<op>.xml`
//! with `op` either `S` (sync) or `D` (delete). Reinit keys point at the
//! valid archive, `<root>/<socCod>/<boType>/<boCod>.xml`, and always mean
//! sync. The root is two segments deep, e.g. `data/landing_zone`.

use crate::error::ImportError;
use crate::pipeline::Operation;

const SOC_SEGMENT: usize = 2;
const BO_TYPE_SEGMENT: usize = 3;
const FILE_SEGMENT: usize = 4;

/// Classification fields of a key that parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub soc_cod: String,
    pub bo_type: String,
    pub bo_cod: String,
    pub operation: Operation,
}

/// Whatever fields a failed parse recovered before it stopped
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialKey {
    pub soc_cod: String,
    pub bo_type: String,
    pub bo_cod: String,
}

/// A failed parse together with its partial fields
#[derive(Debug)]
pub struct KeyError {
    pub error: ImportError,
    pub partial: PartialKey,
}

/// Which naming convention the listed keys follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGrammar {
    Live,
    Reinit,
}

impl KeyGrammar {
    pub fn for_reinit(reinit: bool) -> Self {
        if reinit {
            KeyGrammar::Reinit
        } else {
            KeyGrammar::Live
        }
    }

    pub fn parse(self, key: &str) -> Result<ParsedKey, KeyError> {
        let parts: Vec<&str> = key.split('/').collect();
        if parts.len() <= FILE_SEGMENT {
            return Err(KeyError {
                error: ImportError::InvalidKey {
                    key: key.to_string(),
                },
                partial: PartialKey::default(),
            });
        }

        let mut partial = PartialKey {
            soc_cod: parts[SOC_SEGMENT].to_string(),
            bo_type: parts[BO_TYPE_SEGMENT].to_string(),
            ..PartialKey::default()
        };
        let file_name = parts[FILE_SEGMENT];
        let stem = file_stem(file_name);

        match self {
            KeyGrammar::Reinit => {
                partial.bo_cod = stem.to_string();
                Ok(partial.with_operation(Operation::Sync))
            },
            KeyGrammar::Live => {
                let fields: Vec<&str> = stem.split('_').collect();
                if fields.len() < 3 {
                    return Err(KeyError {
                        error: ImportError::InvalidFilename {
                            file_name: file_name.to_string(),
                        },
                        partial,
                    });
                }
                partial.bo_cod = fields[1].to_string();

                match Operation::from_code(fields[2]) {
                    Some(op) => Ok(partial.with_operation(op)),
                    None => Err(KeyError {
                        error: ImportError::InvalidOperation {
                            file_name: file_name.to_string(),
                            op: fields[2].to_string(),
                        },
                        partial,
                    }),
                }
            },
        }
    }
}

impl PartialKey {
    fn with_operation(self, operation: Operation) -> ParsedKey {
        ParsedKey {
            soc_cod: self.soc_cod,
            bo_type: self.bo_type,
            bo_cod: self.bo_cod,
            operation,
        }
    }
}

/// File name up to its first dot
fn file_stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Last path segment of a key
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Joins a folder, tenant and business-object type into a listing prefix
/// ending with `/`. An empty root yields `<soc>/<bo>/`.
pub fn join_prefix(root: &str, soc_cod: &str, bo_type: &str) -> String {
    let segments: Vec<&str> = [root, soc_cod, bo_type]
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("{}/", segments.join("/"))
}
