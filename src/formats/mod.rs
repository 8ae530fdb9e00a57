//! Reader/writer traits and file-based factories.
//!
//! | Format | Reader | Writer |
//! |--------|--------|--------|
//! | ISO 2709 | [`BinaryMarcReader`] | [`BinaryMarcWriter`] |
//! | MARC-XML | [`XmlMarcReader`] | [`XmlMarcWriter`] |
//!
//! [`open_reader`] and [`open_writer`] pick the codec from a [`FileType`];
//! [`FileType::Auto`] sniffs the file contents or falls back to the extension.
//!
//! ```no_run
//! use marc_engine::formats::{open_reader, open_writer, FileType, WriterMode};
//!
//! let mut reader = open_reader("input.mrc", FileType::Auto)?;
//! let mut writer = open_writer("output.xml", FileType::Xml, WriterMode::Overwrite)?;
//! while let Some(record) = reader.read()? {
//!     writer.write(&record)?;
//! }
//! writer.finish()?;
//! # Ok::<(), marc_engine::MarcError>(())
//! ```

mod traits;

pub use traits::{MarcReader, MarcReaderExt, MarcWriter, RecordIterator};

use crate::error::{MarcError, Result};
use crate::marcxml::{XmlMarcReader, XmlMarcWriter};
use crate::reader::BinaryMarcReader;
use crate::writer::BinaryMarcWriter;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

/// Serialization of a MARC file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    /// ISO 2709
    Binary,
    /// MARC-XML
    Xml,
    /// Decide from the file contents or extension
    #[default]
    Auto,
}

/// How [`open_writer`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterMode {
    /// Truncate the file
    #[default]
    Overwrite,
    /// Add records after the existing ones (binary only)
    Append,
}

/// Work out the format of `path`.
///
/// An existing non-empty file is sniffed: a first non-whitespace byte of `<`
/// means MARC-XML, anything else ISO 2709. Otherwise `.xml` means MARC-XML and
/// `.mrc`, `.marc` or `.raw` mean ISO 2709.
///
/// # Errors
///
/// Returns an error if neither the contents nor the extension decide the type.
pub fn guess_file_type(path: impl AsRef<Path>, read_contents: bool) -> Result<FileType> {
    let path = path.as_ref();
    if read_contents {
        if let Ok(file) = File::open(path) {
            let mut head = Vec::with_capacity(64);
            file.take(64).read_to_end(&mut head)?;
            let first = head
                .iter()
                .copied()
                .find(|b| !b.is_ascii_whitespace() && !matches!(*b, 0xEF | 0xBB | 0xBF));
            match first {
                Some(b'<') => return Ok(FileType::Xml),
                Some(_) => return Ok(FileType::Binary),
                None => {},
            }
        }
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xml") => Ok(FileType::Xml),
        Some("mrc" | "marc" | "raw") => Ok(FileType::Binary),
        _ => Err(MarcError::Unsupported(format!(
            "Cannot determine the MARC file type of {}",
            path.display()
        ))),
    }
}

/// Open a reader on `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its type cannot be determined.
pub fn open_reader(path: impl AsRef<Path>, file_type: FileType) -> Result<Box<dyn MarcReader>> {
    let path = path.as_ref();
    let file_type = match file_type {
        FileType::Auto => guess_file_type(path, true)?,
        other => other,
    };
    let source = BufReader::new(File::open(path)?);
    tracing::debug!(path = %path.display(), ?file_type, "opening MARC reader");
    let reader: Box<dyn MarcReader> = match file_type {
        FileType::Xml => Box::new(XmlMarcReader::new(source).with_path(path)),
        _ => Box::new(BinaryMarcReader::new(source).with_path(path)),
    };
    Ok(reader)
}

/// Open a writer on `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, its type cannot be
/// determined, or MARC-XML output is combined with [`WriterMode::Append`].
pub fn open_writer(
    path: impl AsRef<Path>,
    file_type: FileType,
    mode: WriterMode,
) -> Result<Box<dyn MarcWriter>> {
    let path = path.as_ref();
    let file_type = match file_type {
        FileType::Auto => guess_file_type(path, false)?,
        other => other,
    };
    if file_type == FileType::Xml && mode == WriterMode::Append {
        return Err(MarcError::Unsupported(format!(
            "Cannot append MARC-XML records to {}",
            path.display()
        )));
    }

    let file = match mode {
        WriterMode::Overwrite => File::create(path)?,
        WriterMode::Append => OpenOptions::new().create(true).append(true).open(path)?,
    };
    let sink = BufWriter::new(file);
    tracing::debug!(path = %path.display(), ?file_type, ?mode, "opening MARC writer");
    let writer: Box<dyn MarcWriter> = match file_type {
        FileType::Xml => Box::new(XmlMarcWriter::new(sink).with_path(path)),
        _ => Box::new(BinaryMarcWriter::new(sink).with_path(path)),
    };
    Ok(writer)
}
