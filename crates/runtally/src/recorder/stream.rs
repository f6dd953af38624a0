//! Append-only record stream.
//!
//! Each record is the record separator character followed by a 4-space
//! indented JSON object. Readers rebuild the list of records by splitting on
//! the separator.

use crate::error::{RecorderError, RecorderResult};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;

/// ASCII record separator (RS).
pub const RECORD_SEPARATOR: char = '\u{1e}';

const INDENT: &[u8] = b"    ";

/// Encode a value as 4-space indented JSON.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

pub struct RecordStream {
    file: fs::File,
    records: u64,
}

impl RecordStream {
    /// Create (or truncate) the stream file.
    pub fn create(path: &Path) -> RecorderResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RecorderError::io(format!("failed to create {}", parent.display()), err)
            })?;
        }
        let file = fs::File::create(path).map_err(|err| {
            RecorderError::io(format!("failed to create {}", path.display()), err)
        })?;
        Ok(Self {
            file,
            records: 0,
        })
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Append one record and flush it to the file.
    ///
    /// The separator and body go out in a single write so a reader never sees
    /// a separator without its record.
    pub fn append<T: Serialize + ?Sized>(&mut self, record: &T) -> RecorderResult<()> {
        let body = to_pretty_json(record)
            .map_err(|err| RecorderError::serialize("failed to serialize record", err))?;
        let mut frame = Vec::with_capacity(body.len() + RECORD_SEPARATOR.len_utf8());
        let mut separator = [0_u8; 4];
        frame.extend_from_slice(RECORD_SEPARATOR.encode_utf8(&mut separator).as_bytes());
        frame.extend_from_slice(&body);
        self.file
            .write_all(&frame)
            .map_err(|err| RecorderError::io("failed to write record stream", err))?;
        self.file
            .flush()
            .map_err(|err| RecorderError::io("failed to flush record stream", err))?;
        self.records += 1;
        Ok(())
    }

    /// Sync and close the stream.
    pub fn close(self) -> RecorderResult<()> {
        self.file
            .sync_all()
            .map_err(|err| RecorderError::io("failed to sync record stream", err))
    }
}

/// Read every record from a stream file.
pub fn read_record_stream(path: &Path) -> RecorderResult<Vec<Value>> {
    let data = fs::read_to_string(path)
        .map_err(|err| RecorderError::io(format!("failed to read {}", path.display()), err))?;
    parse_records(&data)
}

/// Split stream contents on the separator and parse each record.
pub fn parse_records(data: &str) -> RecorderResult<Vec<Value>> {
    data.split(RECORD_SEPARATOR)
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(index, chunk)| {
            serde_json::from_str(chunk).map_err(|err| {
                RecorderError::protocol(format!("record {index} is not valid json: {err}"))
            })
        })
        .collect()
}
