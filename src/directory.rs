//! Field tags and ISO 2709 directory entries.
//!
//! A directory entry is a `tag(3) + length(4) + offset(5)` triple that locates
//! one field inside a record's field-data area.

use crate::error::{MarcError, Result};
use std::fmt;
use std::str::FromStr;

/// Size of one serialized directory entry.
pub const DIRECTORY_ENTRY_LENGTH: usize = 12;

/// Largest field length expressible in a directory entry.
pub const MAX_FIELD_LENGTH: usize = 9_999;

/// Largest field offset expressible in a directory entry.
pub const MAX_FIELD_OFFSET: usize = 99_999;

/// A three-byte field tag such as `001`, `245` or `LOK`.
///
/// Tags order byte-wise, so alphabetic tags like `LOK` sort after every numeric tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag([u8; 3]);

impl Tag {
    /// Build a tag from exactly three bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not three bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 3] = bytes.try_into().map_err(|_| {
            MarcError::InvalidField(format!(
                "Tag must be 3 bytes, got '{}'",
                String::from_utf8_lossy(bytes)
            ))
        })?;
        Ok(Tag(raw))
    }

    /// The raw tag bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// Control field tags start with `00`.
    #[must_use]
    pub fn is_control_field(&self) -> bool {
        self.0[0] == b'0' && self.0[1] == b'0'
    }
}

impl FromStr for Tag {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        Tag::from_bytes(s.as_bytes())
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Location of one field inside a record's raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Field tag
    pub tag: Tag,
    /// Field length including the trailing field terminator
    pub field_length: usize,
    /// Offset of the field's first byte in the raw buffer
    pub field_offset: usize,
}

impl DirectoryEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(tag: Tag, field_length: usize, field_offset: usize) -> Self {
        DirectoryEntry {
            tag,
            field_length,
            field_offset,
        }
    }

    /// Parse a 12-byte directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is short or its numeric parts are not digits.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != DIRECTORY_ENTRY_LENGTH {
            return Err(MarcError::InvalidRecord(format!(
                "Directory entry must be {DIRECTORY_ENTRY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(DirectoryEntry {
            tag: Tag::from_bytes(&bytes[0..3])?,
            field_length: parse_digits(&bytes[3..7])?,
            field_offset: parse_digits(&bytes[7..12])?,
        })
    }

    /// One past the last byte of the field.
    #[must_use]
    pub fn end(&self) -> usize {
        self.field_offset + self.field_length
    }

    /// Append the 12-byte serialized form to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if length or offset exceed the ISO 2709 limits.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.field_length > MAX_FIELD_LENGTH {
            return Err(MarcError::InvalidField(format!(
                "Field {} is {} bytes long, the limit is {MAX_FIELD_LENGTH}",
                self.tag, self.field_length
            )));
        }
        if self.field_offset > MAX_FIELD_OFFSET {
            return Err(MarcError::InvalidRecord(format!(
                "Field {} starts at offset {}, the limit is {MAX_FIELD_OFFSET}",
                self.tag, self.field_offset
            )));
        }
        out.extend_from_slice(self.tag.as_bytes());
        out.extend_from_slice(format!("{:04}", self.field_length).as_bytes());
        out.extend_from_slice(format!("{:05}", self.field_offset).as_bytes());
        Ok(())
    }
}

/// Parse an ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if byte.is_ascii_digit() {
            result = result * 10 + usize::from(byte - b'0');
        } else {
            return Err(MarcError::InvalidRecord(format!(
                "Invalid numeric field in directory: expected digits, got byte {}",
                char::from(byte)
            )));
        }
    }
    Ok(result)
}
