#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Modules
//!
//! - [`leader`]: the 24-byte record header
//! - [`directory`]: tags and directory entries
//! - [`subfields`]: indicator and subfield codec for data fields
//! - [`record`]: the arena-backed [`MarcRecord`] with local data block support
//! - [`reader`] / [`writer`]: ISO 2709 codec, including multi-part records
//! - [`marcxml`]: MARC-XML codec
//! - [`formats`]: reader/writer traits and file factories
//! - [`tokenizer`]: lexer for the MARC query mini-language
//! - [`error`]: error type

pub mod directory;
pub mod error;
pub mod formats;
pub mod leader;
pub mod marcxml;
pub mod reader;
pub mod record;
pub mod subfields;
pub mod tokenizer;
pub mod writer;

pub use directory::{DirectoryEntry, Tag};
pub use error::{MarcError, Result};
pub use formats::{
    open_reader, open_writer, FileType, MarcReader, MarcReaderExt, MarcWriter, WriterMode,
};
pub use leader::{Leader, RecordType};
pub use marcxml::{XmlMarcReader, XmlMarcWriter};
pub use reader::BinaryMarcReader;
pub use record::{tag_set, MarcRecord};
pub use subfields::{Subfield, Subfields};
pub use tokenizer::{Token, Tokenizer};
pub use writer::BinaryMarcWriter;
