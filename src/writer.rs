//! Writing MARC records in ISO 2709 format.
//!
//! ISO 2709 limits a physical record to 99,999 bytes. [`BinaryMarcWriter`]
//! splits larger logical records into a chain of physical records: every
//! physical record starts with the `001` field, all but the last carry the
//! multi-part flag, and the reader stitches them back together.
//!
//! # Examples
//!
//! ```
//! use marc_engine::formats::MarcWriter;
//! use marc_engine::{BinaryMarcWriter, Leader, MarcRecord};
//!
//! let mut record = MarcRecord::new(Leader::default());
//! record.insert_field("001", b"PPN1")?;
//! record.insert_subfield("245", b'a', "Title", b'1', b'0')?;
//!
//! let mut buffer = Vec::new();
//! let mut writer = BinaryMarcWriter::new(&mut buffer);
//! writer.write(&record)?;
//! writer.finish()?;
//! # Ok::<(), marc_engine::MarcError>(())
//! ```

use crate::directory::{DirectoryEntry, DIRECTORY_ENTRY_LENGTH};
use crate::error::{MarcError, Result};
use crate::formats::MarcWriter;
use crate::leader::LEADER_LENGTH;
use crate::reader::RECORD_TERMINATOR;
use crate::record::{MarcRecord, FIELD_TERMINATOR};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Largest physical record ISO 2709 can describe.
pub const MAX_RECORD_LENGTH: usize = 99_999;

/// Writer for ISO 2709 binary MARC records.
///
/// Each writer owns its scratch buffers, so writers on different threads never
/// share state. All physical records of a logical record are assembled before
/// any byte reaches the sink, so a record that fails to serialize leaves no
/// partial chain behind.
#[derive(Debug)]
pub struct BinaryMarcWriter<W: Write> {
    sink: W,
    path: Option<PathBuf>,
    directory: Vec<u8>,
    data: Vec<u8>,
    output: Vec<u8>,
    records_written: usize,
    finished: bool,
}

impl<W: Write> BinaryMarcWriter<W> {
    /// Create a new writer on `sink`.
    pub fn new(sink: W) -> Self {
        BinaryMarcWriter {
            sink,
            path: None,
            directory: Vec::new(),
            data: Vec::with_capacity(MAX_RECORD_LENGTH),
            output: Vec::with_capacity(MAX_RECORD_LENGTH),
            records_written: 0,
            finished: false,
        }
    }

    /// Remember the file the sink writes to.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Serialize `record` as one or more physical records.
    fn write_record(&mut self, record: &MarcRecord) -> Result<()> {
        let entries = record.directory();
        let control_number = entries
            .iter()
            .find(|entry| entry.tag == "001")
            .ok_or_else(|| {
                MarcError::InvalidRecord("Cannot write a record without a 001 field".to_string())
            })?;
        let others: Vec<&DirectoryEntry> =
            entries.iter().filter(|entry| entry.tag != "001").collect();

        self.output.clear();
        let mut next = 0;
        let mut physical_records = 0;
        loop {
            self.directory.clear();
            self.data.clear();
            self.append_field(record, control_number)?;

            let chunk_start = next;
            while let Some(entry) = others.get(next) {
                let entry_count = self.directory.len() / DIRECTORY_ENTRY_LENGTH + 1;
                let projected = LEADER_LENGTH
                    + DIRECTORY_ENTRY_LENGTH * entry_count
                    + 1
                    + self.data.len()
                    + entry.field_length
                    + 1;
                if projected > MAX_RECORD_LENGTH {
                    break;
                }
                self.append_field(record, entry)?;
                next += 1;
            }
            if next == chunk_start && next < others.len() {
                return Err(MarcError::InvalidField(format!(
                    "Field {} of record {} does not fit into a physical record",
                    others[next].tag,
                    record.get_control_number().unwrap_or_default()
                )));
            }

            let multi_part = next < others.len();
            self.append_physical_record(record, multi_part)?;
            physical_records += 1;
            if !multi_part {
                break;
            }
        }

        if physical_records > 1 {
            tracing::debug!(
                control_number = %record.get_control_number().unwrap_or_default(),
                physical_records,
                "split oversized record"
            );
        }
        self.sink.write_all(&self.output)?;
        Ok(())
    }

    fn append_field(&mut self, record: &MarcRecord, entry: &DirectoryEntry) -> Result<()> {
        let relocated = DirectoryEntry::new(entry.tag, entry.field_length, self.data.len());
        relocated.write_to(&mut self.directory)?;
        self.data.extend_from_slice(record.raw_bytes(entry));
        Ok(())
    }

    fn append_physical_record(&mut self, record: &MarcRecord, multi_part: bool) -> Result<()> {
        let base_address = LEADER_LENGTH + self.directory.len() + 1;
        let record_length = base_address + self.data.len() + 1;

        let mut leader = record.leader().clone();
        leader.set_record_length(record_length)?;
        leader.set_base_address_of_data(base_address)?;
        leader.set_multi_part_record(multi_part);

        self.output.extend_from_slice(leader.as_bytes());
        self.output.extend_from_slice(&self.directory);
        self.output.push(FIELD_TERMINATOR);
        self.output.extend_from_slice(&self.data);
        self.output.push(RECORD_TERMINATOR);
        Ok(())
    }
}

impl<W: Write + std::fmt::Debug> MarcWriter for BinaryMarcWriter<W> {
    fn write(&mut self, record: &MarcRecord) -> Result<()> {
        if self.finished {
            return Err(MarcError::CallerMisuse(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        self.write_record(record)?;
        self.records_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.sink.flush()?;
        self.finished = true;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn records_written(&self) -> usize {
        self.records_written
    }
}
