//! The arena-backed MARC record.
//!
//! A [`MarcRecord`] owns a [`Leader`], an ordered list of [`DirectoryEntry`]s
//! and one raw byte buffer. Every directory entry points at a field inside
//! that buffer; the field's bytes end with [`FIELD_TERMINATOR`].
//!
//! Mutations never move existing bytes. Inserted and updated fields are
//! appended at the buffer tail, deleted fields just lose their directory
//! entry. Records live for one pass of a read-process-write loop, so the
//! unreachable bytes are never reclaimed.
//!
//! # Examples
//!
//! ```
//! use marc_engine::{Leader, MarcRecord};
//!
//! let mut record = MarcRecord::new(Leader::default());
//! record.insert_field("001", b"PPN123")?;
//! record.insert_subfield("245", b'a', "A title", b'1', b'0')?;
//!
//! assert_eq!(record.get_control_number(), Some("PPN123".to_string()));
//! assert_eq!(
//!     record.extract_first_subfield("245", b'a'),
//!     Some("A title".to_string())
//! );
//! # Ok::<(), marc_engine::MarcError>(())
//! ```

use crate::directory::{DirectoryEntry, Tag};
use crate::error::{MarcError, Result};
use crate::leader::Leader;
use crate::subfields::Subfields;
use std::collections::HashSet;

/// Terminates every field in the raw buffer.
pub const FIELD_TERMINATOR: u8 = 0x1E;

/// Language returned by [`MarcRecord::get_language`] when `041$a` is missing.
pub const DEFAULT_LANGUAGE: &str = "ger";

/// Tag of the fields that carry local data blocks.
pub const LOCAL_TAG: &str = "LOK";

/// Content prefix of the first field of every local data block.
const LOCAL_BLOCK_START: &[u8] = b"  \x1F0000";

/// Content prefix of a local pseudo field: blank indicators and `$0`.
const LOCAL_PSEUDO_FIELD_PREFIX: &[u8] = b"  \x1F0";

/// A MARC record: leader, directory and raw field buffer.
///
/// The default record has no fields; [`MarcRecord::is_empty`] is true for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarcRecord {
    leader: Leader,
    directory: Vec<DirectoryEntry>,
    raw: Vec<u8>,
}

impl MarcRecord {
    /// Create a record without fields.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        MarcRecord {
            leader,
            directory: Vec::new(),
            raw: Vec::new(),
        }
    }

    /// Assemble a record from parsed parts, checking every entry against `raw`.
    pub(crate) fn from_parts(
        leader: Leader,
        directory: Vec<DirectoryEntry>,
        raw: Vec<u8>,
    ) -> Result<Self> {
        for entry in &directory {
            if entry.field_length == 0 || entry.end() > raw.len() {
                return Err(MarcError::InvalidRecord(format!(
                    "Field {} (offset {}, length {}) exceeds data area of {} bytes",
                    entry.tag,
                    entry.field_offset,
                    entry.field_length,
                    raw.len()
                )));
            }
        }
        Ok(MarcRecord {
            leader,
            directory,
            raw,
        })
    }

    /// The record leader.
    #[must_use]
    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    /// Mutable access to the record leader.
    pub fn leader_mut(&mut self) -> &mut Leader {
        &mut self.leader
    }

    /// The directory, in record order.
    #[must_use]
    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Number of directory entries.
    #[must_use]
    pub fn number_of_fields(&self) -> usize {
        self.directory.len()
    }

    /// Size of the raw buffer, including bytes no longer referenced.
    #[must_use]
    pub fn raw_buffer_len(&self) -> usize {
        self.raw.len()
    }

    /// Tag of the field at `index`.
    #[must_use]
    pub fn tag(&self, index: usize) -> Option<Tag> {
        self.directory.get(index).map(|entry| entry.tag)
    }

    /// Returns true if any field has `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.get_field_index(tag).is_some()
    }

    /// Index of the first field with `tag`.
    #[must_use]
    pub fn get_field_index(&self, tag: &str) -> Option<usize> {
        self.directory.iter().position(|entry| entry.tag == tag)
    }

    /// Indices of the run of fields tagged `tag`.
    ///
    /// Fields with the same tag are contiguous in every record produced by a
    /// reader or by [`MarcRecord::insert_field`], so the scan stops at the
    /// first differently tagged field after the run.
    #[must_use]
    pub fn get_field_indices(&self, tag: &str) -> Vec<usize> {
        let Some(first) = self.get_field_index(tag) else {
            return Vec::new();
        };
        (first..self.directory.len())
            .take_while(|&index| self.directory[index].tag == tag)
            .collect()
    }

    /// Returns true if all fields sharing a tag form one contiguous run.
    #[must_use]
    pub fn tags_are_grouped(&self) -> bool {
        let mut seen = HashSet::new();
        let mut previous: Option<Tag> = None;
        for entry in &self.directory {
            if previous != Some(entry.tag) && !seen.insert(entry.tag) {
                return false;
            }
            previous = Some(entry.tag);
        }
        true
    }

    /// Raw content of the field at `index`, without its terminator.
    ///
    /// Returns an empty slice for an out-of-range index.
    #[must_use]
    pub fn get_field_data(&self, index: usize) -> &[u8] {
        match self.directory.get(index) {
            Some(entry) => &self.raw[entry.field_offset..entry.end() - 1],
            None => &[],
        }
    }

    /// Raw content of the first field with `tag`, or an empty slice.
    #[must_use]
    pub fn get_field_data_by_tag(&self, tag: &str) -> &[u8] {
        match self.get_field_index(tag) {
            Some(index) => self.get_field_data(index),
            None => &[],
        }
    }

    /// Subfields of the field at `index`.
    #[must_use]
    pub fn get_subfields(&self, index: usize) -> Subfields {
        Subfields::parse(self.get_field_data(index))
    }

    /// Subfields of the first field with `tag`.
    #[must_use]
    pub fn get_subfields_by_tag(&self, tag: &str) -> Subfields {
        Subfields::parse(self.get_field_data_by_tag(tag))
    }

    /// Content of the `001` field.
    #[must_use]
    pub fn get_control_number(&self) -> Option<String> {
        self.get_field_index("001")
            .map(|index| String::from_utf8_lossy(self.get_field_data(index)).into_owned())
    }

    /// Iterate over `(tag, content)` pairs in directory order.
    pub fn fields(&self) -> impl Iterator<Item = (Tag, &[u8])> + '_ {
        self.directory
            .iter()
            .map(|entry| (entry.tag, &self.raw[entry.field_offset..entry.end() - 1]))
    }

    /// Check that the record has exactly one `001` and that it comes first.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidRecord`] describing the violation.
    pub fn check_control_number(&self) -> Result<()> {
        match self.directory.first() {
            None => Err(MarcError::InvalidRecord("Record has no fields".to_string())),
            Some(first) if first.tag != "001" => Err(MarcError::InvalidRecord(format!(
                "First field must be 001, found {}",
                first.tag
            ))),
            Some(_) => {
                if self.directory[1..].iter().any(|entry| entry.tag == "001") {
                    Err(MarcError::InvalidRecord(format!(
                        "Duplicate 001 field in record {}",
                        self.get_control_number().unwrap_or_default()
                    )))
                } else {
                    Ok(())
                }
            },
        }
    }

    /// Append a field at the end of the directory, keeping source order.
    pub(crate) fn push_field(&mut self, tag: Tag, content: &[u8]) {
        let entry = self.append_to_buffer(tag, content);
        self.directory.push(entry);
    }

    fn append_to_buffer(&mut self, tag: Tag, content: &[u8]) -> DirectoryEntry {
        let offset = self.raw.len();
        self.raw.extend_from_slice(content);
        self.raw.push(FIELD_TERMINATOR);
        DirectoryEntry::new(tag, content.len() + 1, offset)
    }

    /// Insert a field before the first field whose tag is greater than `tag`.
    ///
    /// Returns the index of the new field.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is not three bytes long.
    pub fn insert_field(&mut self, tag: &str, content: &[u8]) -> Result<usize> {
        let tag: Tag = tag.parse()?;
        let index = self
            .directory
            .iter()
            .position(|entry| entry.tag > tag)
            .unwrap_or(self.directory.len());
        let entry = self.append_to_buffer(tag, content);
        self.directory.insert(index, entry);
        Ok(index)
    }

    /// Insert a data field holding a single subfield.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is not three bytes long.
    pub fn insert_subfield(
        &mut self,
        tag: &str,
        code: u8,
        value: impl AsRef<[u8]>,
        indicator1: u8,
        indicator2: u8,
    ) -> Result<usize> {
        let mut subfields = Subfields::new(indicator1, indicator2);
        subfields.add_subfield(code, value.as_ref());
        self.insert_field(tag, &subfields.serialize())
    }

    /// Replace the content of the field at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn update_field(&mut self, index: usize, new_content: &[u8]) -> Result<()> {
        let tag = self.tag(index).ok_or_else(|| {
            MarcError::InvalidField(format!("Cannot update field {index}: no such field"))
        })?;
        let entry = self.append_to_buffer(tag, new_content);
        self.directory[index] = entry;
        Ok(())
    }

    /// Remove the field at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn delete_field(&mut self, index: usize) -> Result<()> {
        if index >= self.directory.len() {
            return Err(MarcError::InvalidField(format!(
                "Cannot delete field {index}: record has {} fields",
                self.directory.len()
            )));
        }
        self.directory.remove(index);
        Ok(())
    }

    /// Remove several half-open index ranges at once.
    ///
    /// The ranges refer to the directory before any removal and must be sorted
    /// and non-overlapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the ranges are unsorted, overlap or run past the end;
    /// the record is left unchanged in that case.
    pub fn delete_fields(&mut self, ranges: &[(usize, usize)]) -> Result<()> {
        let mut previous_end = 0;
        for &(start, end) in ranges {
            if start < previous_end || start > end || end > self.directory.len() {
                return Err(MarcError::InvalidField(format!(
                    "Invalid deletion range [{start}, {end}) for {} fields",
                    self.directory.len()
                )));
            }
            previous_end = end;
        }
        for &(start, end) in ranges.iter().rev() {
            self.directory.drain(start..end);
        }
        Ok(())
    }

    /// Remove every field whose tag is in `tags`.
    ///
    /// Returns the number of removed fields.
    pub fn filter_tags(&mut self, tags: &HashSet<Tag>) -> usize {
        let before = self.directory.len();
        self.directory.retain(|entry| !tags.contains(&entry.tag));
        before - self.directory.len()
    }

    /// First `code` value in the fields tagged `tag`, decoded lossily.
    #[must_use]
    pub fn extract_first_subfield(&self, tag: &str, code: u8) -> Option<String> {
        self.get_field_indices(tag).into_iter().find_map(|index| {
            self.get_subfields(index)
                .get_first_subfield_value(code)
                .map(|value| String::from_utf8_lossy(value).into_owned())
        })
    }

    /// Every `code` value in the fields tagged `tag`.
    #[must_use]
    pub fn extract_subfield(&self, tag: &str, code: u8) -> Vec<String> {
        self.get_field_indices(tag)
            .into_iter()
            .flat_map(|index| {
                self.get_subfields(index)
                    .subfields_with_code(code)
                    .map(|s| s.value_lossy().into_owned())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Every value of the codes in `codes` in the fields tagged `tag`.
    #[must_use]
    pub fn extract_subfields(&self, tag: &str, codes: impl AsRef<[u8]>) -> Vec<String> {
        let codes = codes.as_ref();
        self.get_field_indices(tag)
            .into_iter()
            .flat_map(|index| self.get_subfields(index).extract_subfields(codes))
            .collect()
    }

    /// Every subfield value in the fields whose tag appears in the colon
    /// separated list `tags`, skipping codes listed in `ignore_codes`.
    #[must_use]
    pub fn extract_all_subfields(
        &self,
        tags: &str,
        ignore_codes: impl AsRef<[u8]>,
    ) -> Vec<String> {
        let ignore_codes = ignore_codes.as_ref();
        let wanted: HashSet<&str> = tags.split(':').filter(|t| !t.is_empty()).collect();
        self.directory
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                std::str::from_utf8(entry.tag.as_bytes()).map_or(false, |t| wanted.contains(t))
            })
            .flat_map(|(index, _)| {
                self.get_subfields(index)
                    .iter()
                    .filter(|s| !ignore_codes.contains(&s.code))
                    .map(|s| s.value_lossy().into_owned())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Boundaries `(start, end)` of every local data block.
    ///
    /// The first block starts at the first `LOK` field; every later field whose
    /// content starts with the block marker opens a new one. The last block
    /// ends at the end of the directory.
    #[must_use]
    pub fn find_all_local_data_blocks(&self) -> Vec<(usize, usize)> {
        let mut blocks = Vec::new();
        let Some(mut block_start) = self.get_field_index(LOCAL_TAG) else {
            return blocks;
        };
        for index in block_start + 1..self.directory.len() {
            if self.get_field_data(index).starts_with(LOCAL_BLOCK_START) {
                blocks.push((block_start, index));
                block_start = index;
            }
        }
        blocks.push((block_start, self.directory.len()));
        blocks
    }

    /// Fields of `block` that replicate a `tag` field whose indicators match
    /// `indicators`; `?` in the pattern matches any indicator.
    #[must_use]
    pub fn find_fields_in_local_block(
        &self,
        tag: &str,
        indicators: &str,
        block: (usize, usize),
    ) -> Vec<usize> {
        let mut prefix = LOCAL_PSEUDO_FIELD_PREFIX.to_vec();
        prefix.extend_from_slice(tag.as_bytes());
        let pattern = indicators.as_bytes();

        let (start, end) = block;
        (start..end.min(self.directory.len()))
            .filter(|&index| {
                let data = self.get_field_data(index);
                if !data.starts_with(&prefix) {
                    return false;
                }
                let actual = &data[prefix.len()..];
                pattern.iter().enumerate().all(|(i, &expected)| {
                    expected == b'?' || actual.get(i) == Some(&expected)
                })
            })
            .collect()
    }

    /// Append the fields of a continuation record, dropping its `001`.
    ///
    /// Copied offsets are re-based by the current buffer length.
    pub fn combine(&mut self, continuation: &MarcRecord) {
        let base = self.raw.len();
        self.directory.extend(
            continuation
                .directory
                .iter()
                .filter(|entry| entry.tag != "001")
                .map(|entry| {
                    DirectoryEntry::new(entry.tag, entry.field_length, entry.field_offset + base)
                }),
        );
        self.raw.extend_from_slice(&continuation.raw);
    }

    /// `041$a`, or `default` if there is none or it is empty.
    #[must_use]
    pub fn get_language(&self, default: &str) -> String {
        self.extract_first_subfield("041", b'a')
            .filter(|language| !language.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// Language code from positions 35-37 of `008`, or an empty string.
    #[must_use]
    pub fn get_language_code(&self) -> String {
        self.get_field_data_by_tag("008")
            .get(35..38)
            .map(|code| String::from_utf8_lossy(code).into_owned())
            .unwrap_or_default()
    }

    pub(crate) fn raw_bytes(&self, entry: &DirectoryEntry) -> &[u8] {
        &self.raw[entry.field_offset..entry.end()]
    }
}

/// Build the tag set for [`MarcRecord::filter_tags`] from strings.
///
/// # Errors
///
/// Returns an error if any tag is not three bytes long.
pub fn tag_set<'a>(tags: impl IntoIterator<Item = &'a str>) -> Result<HashSet<Tag>> {
    tags.into_iter().map(str::parse).collect()
}
