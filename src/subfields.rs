//! Indicators and subfields of a single data field.
//!
//! The wire form of a data field is `IND1 IND2 (0x1F code value)*`; the field
//! terminator is not part of it and is added by the record when the field is
//! stored.
//!
//! Indicators, codes and values are kept as bytes, so fields in any character
//! set survive an edit unchanged. Text is only decoded, lossily, by the
//! helpers that return strings.

use memchr::memchr_iter;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;

/// Separates subfields inside a data field.
pub const SUBFIELD_DELIMITER: u8 = 0x1F;

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    /// Subfield code (single byte)
    pub code: u8,
    /// Subfield value, as stored in the record
    pub value: Vec<u8>,
}

impl Subfield {
    /// Create a subfield.
    pub fn new(code: u8, value: impl Into<Vec<u8>>) -> Self {
        Subfield {
            code,
            value: value.into(),
        }
    }

    /// The value decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn value_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// Two indicators plus an ordered list of subfields.
///
/// [`Subfields::add_subfield`] keeps entries ordered by code. Parsed fields keep
/// their wire order, which is usually but not always code-ordered, so every
/// lookup scans the whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfields {
    indicator1: u8,
    indicator2: u8,
    subfields: SmallVec<[Subfield; 4]>,
}

impl Default for Subfields {
    fn default() -> Self {
        Subfields::new(b' ', b' ')
    }
}

impl Subfields {
    /// Create an empty subfield list with the given indicators.
    #[must_use]
    pub fn new(indicator1: u8, indicator2: u8) -> Self {
        Subfields {
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Parse the raw content of a data field.
    ///
    /// Bytes between the indicators and the first delimiter are ignored. Content
    /// shorter than two bytes yields blank indicators and no subfields.
    #[must_use]
    pub fn parse(field_data: &[u8]) -> Self {
        if field_data.len() < 2 {
            return Subfields::default();
        }

        let mut subfields = Subfields::new(field_data[0], field_data[1]);
        let body = &field_data[2..];
        let mut delimiters = memchr_iter(SUBFIELD_DELIMITER, body).peekable();
        while let Some(start) = delimiters.next() {
            let end = delimiters.peek().copied().unwrap_or(body.len());
            let Some(&code) = body.get(start + 1) else {
                break;
            };
            if start + 1 >= end {
                continue;
            }
            subfields
                .subfields
                .push(Subfield::new(code, &body[start + 2..end]));
        }
        subfields
    }

    /// Serialize to `IND1 IND2 (0x1F code value)*`.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            2 + self
                .subfields
                .iter()
                .map(|s| s.value.len() + 2)
                .sum::<usize>(),
        );
        out.push(self.indicator1);
        out.push(self.indicator2);
        for subfield in &self.subfields {
            out.push(SUBFIELD_DELIMITER);
            out.push(subfield.code);
            out.extend_from_slice(&subfield.value);
        }
        out
    }

    /// First indicator.
    #[must_use]
    pub fn indicator1(&self) -> u8 {
        self.indicator1
    }

    /// Second indicator.
    #[must_use]
    pub fn indicator2(&self) -> u8 {
        self.indicator2
    }

    /// Replace the first indicator.
    pub fn set_indicator1(&mut self, indicator: u8) {
        self.indicator1 = indicator;
    }

    /// Replace the second indicator.
    pub fn set_indicator2(&mut self, indicator: u8) {
        self.indicator2 = indicator;
    }

    /// Number of subfields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subfields.len()
    }

    /// Returns true if there are no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subfields.is_empty()
    }

    /// Iterate over all subfields in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, Subfield> {
        self.subfields.iter()
    }

    /// All subfields carrying `code`, in list order.
    pub fn subfields_with_code(&self, code: u8) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter().filter(move |s| s.code == code)
    }

    /// Insert a subfield after the last entry whose code is not greater than `code`.
    pub fn add_subfield(&mut self, code: u8, value: impl Into<Vec<u8>>) {
        let position = self
            .subfields
            .iter()
            .rposition(|s| s.code <= code)
            .map_or(0, |i| i + 1);
        self.subfields.insert(position, Subfield::new(code, value));
    }

    /// Append a subfield at the end, keeping wire order.
    pub fn append_subfield(&mut self, code: u8, value: impl Into<Vec<u8>>) {
        self.subfields.push(Subfield::new(code, value));
    }

    /// Remove every subfield with `code`.
    pub fn erase(&mut self, code: u8) {
        self.subfields.retain(|s| s.code != code);
    }

    /// Replace the value of the first subfield with `code`.
    ///
    /// Returns false if there is no such subfield.
    pub fn replace(&mut self, code: u8, new_value: impl Into<Vec<u8>>) -> bool {
        match self.subfields.iter_mut().find(|s| s.code == code) {
            Some(subfield) => {
                subfield.value = new_value.into();
                true
            },
            None => false,
        }
    }

    /// Re-file every `from` subfield under `to`, in code order.
    pub fn move_subfield(&mut self, from: u8, to: u8) {
        if from == to {
            return;
        }
        let moved: Vec<Vec<u8>> = self
            .subfields_with_code(from)
            .map(|s| s.value.clone())
            .collect();
        self.erase(from);
        for value in moved {
            self.add_subfield(to, value);
        }
    }

    /// Change the code of every `old` subfield to `new` in place.
    ///
    /// Returns true if at least one subfield was changed.
    pub fn replace_subfield_code(&mut self, old: u8, new: u8) -> bool {
        let mut modified = false;
        for subfield in self.subfields.iter_mut().filter(|s| s.code == old) {
            subfield.code = new;
            modified = true;
        }
        modified
    }

    /// Returns true if a subfield with `code` exists.
    #[must_use]
    pub fn has_subfield(&self, code: u8) -> bool {
        self.subfields.iter().any(|s| s.code == code)
    }

    /// Returns true if a subfield with `code` has exactly `value`.
    #[must_use]
    pub fn has_subfield_with_value(&self, code: u8, value: impl AsRef<[u8]>) -> bool {
        let value = value.as_ref();
        self.subfields
            .iter()
            .any(|s| s.code == code && s.value == value)
    }

    /// Raw value of the first subfield with `code`.
    #[must_use]
    pub fn get_first_subfield_value(&self, code: u8) -> Option<&[u8]> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_slice())
    }

    /// Values of all subfields whose code appears in `codes`, in list order,
    /// decoded lossily.
    #[must_use]
    pub fn extract_subfields(&self, codes: impl AsRef<[u8]>) -> Vec<String> {
        let codes = codes.as_ref();
        self.subfields
            .iter()
            .filter(|s| codes.contains(&s.code))
            .map(|s| s.value_lossy().into_owned())
            .collect()
    }
}

impl<'a> IntoIterator for &'a Subfields {
    type Item = &'a Subfield;
    type IntoIter = std::slice::Iter<'a, Subfield>;

    fn into_iter(self) -> Self::IntoIter {
        self.subfields.iter()
    }
}

impl fmt::Display for Subfields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            char::from(self.indicator1),
            char::from(self.indicator2)
        )?;
        for subfield in &self.subfields {
            write!(f, "${}{}", char::from(subfield.code), subfield.value_lossy())?;
        }
        Ok(())
    }
}
