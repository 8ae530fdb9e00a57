//! Reader and writer traits shared by the binary and XML codecs.
//!
//! # Example
//!
//! ```ignore
//! use marc_engine::formats::{MarcReader, MarcWriter};
//!
//! fn copy_records(reader: &mut dyn MarcReader, writer: &mut dyn MarcWriter) -> marc_engine::Result<usize> {
//!     let mut count = 0;
//!     while let Some(record) = reader.read()? {
//!         writer.write(&record)?;
//!         count += 1;
//!     }
//!     writer.finish()?;
//!     Ok(count)
//! }
//! ```

use crate::error::{MarcError, Result};
use crate::record::MarcRecord;
use std::path::Path;

/// Produces logical MARC records from a source.
///
/// Implementations return `Ok(None)` once the source is exhausted. A
/// multi-part record is always returned as one combined record.
pub trait MarcReader: std::fmt::Debug {
    /// Read the next logical record.
    ///
    /// # Errors
    ///
    /// Returns an error if the source contains malformed data or I/O fails.
    fn read(&mut self) -> Result<Option<MarcRecord>>;

    /// Go back to the start of the source and reset all parser state.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be repositioned.
    fn rewind(&mut self) -> Result<()>;

    /// Current byte offset in the source.
    ///
    /// # Errors
    ///
    /// The default implementation reports the operation as unsupported.
    fn tell(&mut self) -> Result<u64> {
        Err(MarcError::Unsupported(
            "tell() is not supported by this reader".to_string(),
        ))
    }

    /// Continue reading at a byte offset previously returned by [`tell`](Self::tell).
    ///
    /// # Errors
    ///
    /// The default implementation reports the operation as unsupported.
    fn seek(&mut self, _offset: u64) -> Result<()> {
        Err(MarcError::Unsupported(
            "seek() is not supported by this reader".to_string(),
        ))
    }

    /// Path of the underlying file, if the reader was opened from one.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Number of logical records returned so far.
    fn records_read(&self) -> usize;

    /// Read all remaining records into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; earlier records are discarded.
    fn read_all(&mut self) -> Result<Vec<MarcRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Serializes MARC records to a destination.
///
/// [`finish`](Self::finish) must be called once all records are written.
pub trait MarcWriter: std::fmt::Debug {
    /// Write one logical record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or the write fails.
    fn write(&mut self, record: &MarcRecord) -> Result<()>;

    /// Write several records.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be written.
    fn write_batch(&mut self, records: &[MarcRecord]) -> Result<()> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    /// Flush and finalize the output. Further writes fail.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or finalizing fails.
    fn finish(&mut self) -> Result<()>;

    /// Path of the underlying file, if the writer was opened on one.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Number of logical records written so far.
    fn records_written(&self) -> usize;
}

/// Extension trait providing iterator-style access for readers.
pub trait MarcReaderExt: MarcReader {
    /// Iterate over the remaining records.
    fn records(&mut self) -> RecordIterator<'_, Self>
    where
        Self: Sized,
    {
        RecordIterator { reader: self }
    }
}

impl<T: MarcReader> MarcReaderExt for T {}

/// Iterator adapter created by [`MarcReaderExt::records`].
#[derive(Debug)]
pub struct RecordIterator<'a, R: MarcReader> {
    reader: &'a mut R,
}

impl<R: MarcReader> Iterator for RecordIterator<'_, R> {
    type Item = Result<MarcRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read().transpose()
    }
}
