//! Error types for MARC operations.
//!
//! This module provides the [`MarcError`] type for all engine operations
//! and the [`Result`] convenience type.
//!
//! Reaching the end of an input is not an error: readers return `Ok(None)`.

use thiserror::Error;

/// Error type for all MARC engine operations.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record structure
    /// (bad directory, missing or duplicate `001`, unterminated data).
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field (bad tag, oversized content).
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Structural error in MARC-XML input (unexpected element, missing attribute).
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error reported by the underlying XML parser or writer.
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// Error indicating a truncated or incomplete record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// A programming-contract violation by the caller.
    #[error("Caller misuse: {0}")]
    CallerMisuse(String),

    /// The operation is not supported by this reader, writer or mode.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
