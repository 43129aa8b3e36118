use quick_xml::events::Event;
use quick_xml::Reader;

use super::model::WhMovementSyncDel;
use crate::error::{ImportError, Result};
use crate::pipeline::Decoder;

pub const ROOT_ELEMENT: &str = "WHMovementSyncDel";

/// Decodes `WHMovementSyncDel` documents
#[derive(Debug, Clone, Copy, Default)]
pub struct WhMovementDecoder;

impl WhMovementDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Name of the first element of a document
fn root_element(raw: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(raw);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            },
            Ok(Event::Text(_)) | Ok(Event::CData(_)) => {
                return Err(ImportError::Decode("text outside the root element".to_string()));
            },
            Ok(Event::Eof) => return Err(ImportError::Decode("empty document".to_string())),
            Ok(_) => continue,
            Err(e) => {
                return Err(ImportError::Decode(format!(
                    "malformed xml at byte {}: {e}",
                    reader.buffer_position()
                )))
            },
        }
    }
}

impl Decoder<WhMovementSyncDel> for WhMovementDecoder {
    fn decode(&self, raw: &[u8]) -> Result<WhMovementSyncDel> {
        let root = root_element(raw)?;
        if root != ROOT_ELEMENT {
            return Err(ImportError::Decode(format!(
                "unexpected root element {root}, expected {ROOT_ELEMENT}"
            )));
        }

        quick_xml::de::from_reader(raw).map_err(|e| ImportError::Decode(e.to_string()))
    }
}
