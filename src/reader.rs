//! Reading MARC records from ISO 2709 streams.
//!
//! [`BinaryMarcReader`] parses one physical record at a time: the 24-byte
//! leader, the directory up to its terminator, then the field data up to the
//! record terminator. Physical records whose leader carries the multi-part
//! flag are followed by continuation records, which are read immediately and
//! combined into one logical record.
//!
//! # Examples
//!
//! ```
//! use marc_engine::formats::MarcReader;
//! use marc_engine::BinaryMarcReader;
//! use std::io::Cursor;
//!
//! let mut reader = BinaryMarcReader::new(Cursor::new(Vec::new()));
//! assert!(reader.read()?.is_none());
//! # Ok::<(), marc_engine::MarcError>(())
//! ```

use crate::directory::{DirectoryEntry, DIRECTORY_ENTRY_LENGTH};
use crate::error::{MarcError, Result};
use crate::formats::MarcReader;
use crate::leader::{Leader, LEADER_LENGTH};
use crate::record::{MarcRecord, FIELD_TERMINATOR};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Terminates every physical ISO 2709 record.
pub const RECORD_TERMINATOR: u8 = 0x1D;

/// Reader for ISO 2709 binary MARC records.
#[derive(Debug)]
pub struct BinaryMarcReader<R: Read + Seek> {
    source: R,
    path: Option<PathBuf>,
    records_read: usize,
}

impl<R: Read + Seek> BinaryMarcReader<R> {
    /// Create a new reader over `source`.
    pub fn new(source: R) -> Self {
        BinaryMarcReader {
            source,
            path: None,
            records_read: 0,
        }
    }

    /// Remember the file the source was opened from.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Read up to `buf.len()` bytes, stopping early only at end of input.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(MarcError::IoError(e)),
            }
        }
        Ok(filled)
    }

    /// Read one physical record, or `None` at a clean end of input.
    fn read_physical_record(&mut self) -> Result<Option<MarcRecord>> {
        let mut leader_bytes = [0u8; LEADER_LENGTH];
        match self.read_fully(&mut leader_bytes)? {
            0 => return Ok(None),
            LEADER_LENGTH => {},
            n => {
                return Err(MarcError::TruncatedRecord(format!(
                    "Expected a {LEADER_LENGTH}-byte leader, found only {n} bytes"
                )))
            },
        }

        let leader = Leader::parse(&leader_bytes)?;
        leader.validate_for_reading()?;
        let record_length = leader.record_length()?;
        let base_address = leader.base_address_of_data()?;

        let mut body = vec![0u8; record_length - LEADER_LENGTH];
        let read = self.read_fully(&mut body)?;
        if read < body.len() {
            return Err(MarcError::TruncatedRecord(format!(
                "Record declares {record_length} bytes but only {} were available",
                read + LEADER_LENGTH
            )));
        }

        let directory_area = &body[..base_address - LEADER_LENGTH];
        let directory = parse_directory(directory_area)?;

        let data_area = &body[base_address - LEADER_LENGTH..];
        let Some((&RECORD_TERMINATOR, field_data)) = data_area.split_last() else {
            return Err(MarcError::InvalidRecord(
                "Record is not terminated by 0x1D".to_string(),
            ));
        };

        let record = MarcRecord::from_parts(leader, directory, field_data.to_vec())?;
        record.check_control_number()?;
        Ok(Some(record))
    }
}

/// Parse directory entries up to the directory terminator.
fn parse_directory(area: &[u8]) -> Result<Vec<DirectoryEntry>> {
    let Some(terminator) = memchr::memchr(FIELD_TERMINATOR, area) else {
        return Err(MarcError::InvalidRecord(
            "Directory is not terminated by 0x1E".to_string(),
        ));
    };
    if terminator % DIRECTORY_ENTRY_LENGTH != 0 {
        return Err(MarcError::InvalidRecord(format!(
            "Directory length {terminator} is not a multiple of {DIRECTORY_ENTRY_LENGTH}"
        )));
    }
    area[..terminator]
        .chunks_exact(DIRECTORY_ENTRY_LENGTH)
        .map(DirectoryEntry::parse)
        .collect()
}

impl<R: Read + Seek + std::fmt::Debug> MarcReader for BinaryMarcReader<R> {
    fn read(&mut self) -> Result<Option<MarcRecord>> {
        let Some(mut record) = self.read_physical_record()? else {
            return Ok(None);
        };

        let mut multi_part = record.leader().is_multi_part();
        while multi_part {
            let continuation = self.read_physical_record()?.ok_or_else(|| {
                MarcError::TruncatedRecord(format!(
                    "Multi-part record {} ends without its continuation",
                    record.get_control_number().unwrap_or_default()
                ))
            })?;
            tracing::debug!(
                control_number = %record.get_control_number().unwrap_or_default(),
                fields = continuation.number_of_fields(),
                "combining continuation record"
            );
            multi_part = continuation.leader().is_multi_part();
            record.combine(&continuation);
        }
        record.leader_mut().set_multi_part_record(false);

        self.records_read += 1;
        Ok(Some(record))
    }

    fn rewind(&mut self) -> Result<()> {
        self.source.rewind()?;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.source.stream_position()?)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.source.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn records_read(&self) -> usize {
        self.records_read
    }
}
