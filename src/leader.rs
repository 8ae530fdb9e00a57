//! MARC record leader parsing and manipulation.
//!
//! The MARC leader is a 24-byte fixed-length field at the start of every MARC record.
//! It contains metadata describing the record's structure, content type, and encoding.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, z = authority, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, a/b = article)
//! - Positions 12-16: Base address of data (5 digits)
//! - Position 23: Multi-part flag (`Y` when more physical records follow)
//!
//! The leader is kept as raw bytes. Numeric positions are only interpreted when
//! asked for, so MARC-XML leaders with blank length fields still parse.

use crate::error::{MarcError, Result};
use std::fmt;

/// Length of a leader in bytes.
pub const LEADER_LENGTH: usize = 24;

const MULTI_PART_POSITION: usize = 23;

/// Broad class of a record, derived from leader position 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Authority record (`z`)
    Authority,
    /// Bibliographic record
    Bibliographic,
    /// Classification record (`w`)
    Classification,
    /// Anything else
    Unknown,
}

/// MARC Leader - 24 bytes at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    raw: [u8; LEADER_LENGTH],
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            raw: *b"00000nam a2200000   4500",
        }
    }
}

impl Leader {
    /// Parse a leader from exactly 24 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not 24 bytes long.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; LEADER_LENGTH] = bytes.try_into().map_err(|_| {
            MarcError::InvalidLeader(format!(
                "Leader must be exactly {LEADER_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Leader { raw })
    }

    /// The raw 24 leader bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Record length from positions 0-4.
    ///
    /// # Errors
    ///
    /// Returns an error if the positions are not all ASCII digits.
    pub fn record_length(&self) -> Result<usize> {
        parse_digits(&self.raw[0..5])
    }

    /// Base address of data from positions 12-16.
    ///
    /// # Errors
    ///
    /// Returns an error if the positions are not all ASCII digits.
    pub fn base_address_of_data(&self) -> Result<usize> {
        parse_digits(&self.raw[12..17])
    }

    /// Record status (position 5).
    #[must_use]
    pub fn record_status(&self) -> char {
        char::from(self.raw[5])
    }

    /// Bibliographic level (position 7).
    #[must_use]
    pub fn bibliographic_level(&self) -> char {
        char::from(self.raw[7])
    }

    /// Classify the record by leader position 6.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self.raw[6] {
            b'z' => RecordType::Authority,
            b'w' => RecordType::Classification,
            b'a' | b'c' | b'd' | b'e' | b'f' | b'g' | b'i' | b'j' | b'k' | b'm' | b'o' | b'p'
            | b'r' | b't' => RecordType::Bibliographic,
            _ => RecordType::Unknown,
        }
    }

    /// Returns true for monographs (`m`).
    #[must_use]
    pub fn is_monograph(&self) -> bool {
        self.raw[7] == b'm'
    }

    /// Returns true for serials (`s`).
    #[must_use]
    pub fn is_serial(&self) -> bool {
        self.raw[7] == b's'
    }

    /// Returns true for component parts (`a` or `b`).
    #[must_use]
    pub fn is_article(&self) -> bool {
        matches!(self.raw[7], b'a' | b'b')
    }

    /// Returns true if further physical records continue this one.
    #[must_use]
    pub fn is_multi_part(&self) -> bool {
        self.raw[MULTI_PART_POSITION] == b'Y'
    }

    /// Set positions 0-4.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` does not fit in five digits.
    pub fn set_record_length(&mut self, length: usize) -> Result<()> {
        write_digits(&mut self.raw[0..5], length)
    }

    /// Set positions 12-16.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` does not fit in five digits.
    pub fn set_base_address_of_data(&mut self, address: usize) -> Result<()> {
        write_digits(&mut self.raw[12..17], address)
    }

    /// Set or clear the multi-part flag.
    pub fn set_multi_part_record(&mut self, multi_part: bool) {
        self.raw[MULTI_PART_POSITION] = if multi_part { b'Y' } else { b'0' };
    }

    /// Check the numeric positions needed to frame a binary record.
    ///
    /// # Errors
    ///
    /// Returns an error if record length or base address is unusable.
    pub fn validate_for_reading(&self) -> Result<()> {
        let record_length = self.record_length()?;
        let base_address = self.base_address_of_data()?;
        if base_address <= LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data must be greater than {LEADER_LENGTH}, got {base_address}"
            )));
        }
        if record_length <= base_address {
            return Err(MarcError::InvalidLeader(format!(
                "Record length {record_length} must exceed base address {base_address}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.raw))
    }
}

/// Parse a 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return Err(MarcError::InvalidLeader(format!(
                "Invalid numeric field: '{}'",
                String::from_utf8_lossy(bytes)
            )));
        }
        result = result * 10 + usize::from(byte - b'0');
    }
    Ok(result)
}

fn write_digits(target: &mut [u8], value: usize) -> Result<()> {
    let digits = format!("{value:0width$}", width = target.len());
    if digits.len() != target.len() {
        return Err(MarcError::InvalidLeader(format!(
            "{value} does not fit in {} digits",
            target.len()
        )));
    }
    target.copy_from_slice(digits.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_parse() {
        let leader = Leader::parse(b"01234nam a2200289 c 4500").unwrap();

        assert_eq!(leader.record_length().unwrap(), 1234);
        assert_eq!(leader.base_address_of_data().unwrap(), 289);
        assert_eq!(leader.record_status(), 'n');
        assert_eq!(leader.bibliographic_level(), 'm');
        assert_eq!(leader.record_type(), RecordType::Bibliographic);
        assert!(leader.is_monograph());
        assert!(!leader.is_multi_part());
    }

    #[test]
    fn test_leader_wrong_length() {
        assert!(Leader::parse(b"0123456789012").is_err());
        assert!(Leader::parse(b"01234nam a2200289 c 45000").is_err());
    }

    #[test]
    fn test_record_types() {
        let mut raw = *b"00000nz  a2200000   4500";
        assert_eq!(Leader::parse(&raw).unwrap().record_type(), RecordType::Authority);
        raw[6] = b'w';
        assert_eq!(
            Leader::parse(&raw).unwrap().record_type(),
            RecordType::Classification
        );
        raw[6] = b'x';
        assert_eq!(Leader::parse(&raw).unwrap().record_type(), RecordType::Unknown);
    }

    #[test]
    fn test_bibliographic_levels() {
        let serial = Leader::parse(b"00000nas a2200000   4500").unwrap();
        assert!(serial.is_serial());
        assert!(!serial.is_article());

        let article = Leader::parse(b"00000nab a2200000   4500").unwrap();
        assert!(article.is_article());
        assert!(!article.is_monograph());
    }

    #[test]
    fn test_setters() {
        let mut leader = Leader::default();
        leader.set_record_length(99_999).unwrap();
        leader.set_base_address_of_data(25).unwrap();
        leader.set_multi_part_record(true);

        assert_eq!(&leader.as_bytes()[0..5], b"99999");
        assert_eq!(leader.base_address_of_data().unwrap(), 25);
        assert!(leader.is_multi_part());

        leader.set_multi_part_record(false);
        assert_eq!(leader.as_bytes()[23], b'0');
        assert!(leader.set_record_length(100_000).is_err());
    }

    #[test]
    fn test_non_numeric_length() {
        // XML leaders often leave the numeric positions blank.
        let blank = Leader::parse(b"     nam a22     c  4500").unwrap();
        assert!(blank.record_length().is_err());
        assert!(blank.base_address_of_data().is_err());
        assert!(blank.validate_for_reading().is_err());
    }

    #[test]
    fn test_validate_for_reading_rejects_small_base_address() {
        let leader = Leader::parse(b"00050nam a2200010 i 4500").unwrap();
        let err = leader.validate_for_reading().unwrap_err().to_string();
        assert!(err.contains("Base address of data"), "got: {err}");
    }

    #[test]
    fn test_validate_for_reading_rejects_short_record() {
        let leader = Leader::parse(b"00030nam a2200037 i 4500").unwrap();
        assert!(leader.validate_for_reading().is_err());
    }
}
