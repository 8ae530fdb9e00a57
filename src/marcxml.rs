//! MARC-XML reading and writing.
//!
//! Records are read with a pull parser, one `<record>` element per call to
//! [`MarcReader::read`]. Both the prefixed form
//! (`<marc:collection xmlns:marc="...">`) and the default-namespace form
//! (`<collection xmlns="...">`) are accepted; the prefix is detected from the
//! first element and expected on every element after it.
//!
//! The writer emits the prefixed form:
//!
//! ```text
//! <marc:collection xmlns:marc="http://www.loc.gov/MARC21/slim">
//! <marc:record>
//!   <marc:leader>00000nam a2200000   4500</marc:leader>
//!   <marc:controlfield tag="001">PPN1</marc:controlfield>
//!   <marc:datafield tag="245" ind1="1" ind2="0">
//!     <marc:subfield code="a">Title</marc:subfield>
//!   </marc:datafield>
//! </marc:record>
//! </marc:collection>
//! ```
//!
//! Leader length and base address carry no meaning in XML and are written as zeros.

use crate::error::{MarcError, Result};
use crate::formats::{MarcReader, MarcWriter};
use crate::leader::Leader;
use crate::record::MarcRecord;
use crate::subfields::Subfields;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{BufRead, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

/// The MARC-XML namespace URI.
pub const MARCXML_NS: &str = "http://www.loc.gov/MARC21/slim";

const SCHEMA_LOCATION: &str =
    "http://www.loc.gov/MARC21/slim http://www.loc.gov/standards/marcxml/schema/MARC21slim.xsd";

const WRITER_PREFIX: &str = "marc:";

/// Pull-parser events with owned data.
#[derive(Debug)]
enum XmlEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Text(String),
    Eof,
}

impl XmlEvent {
    fn describe(&self) -> String {
        match self {
            XmlEvent::Start { name, .. } => format!("opening tag <{name}>"),
            XmlEvent::End { name } => format!("closing tag </{name}>"),
            XmlEvent::Text(text) => format!("text '{}'", text.trim()),
            XmlEvent::Eof => "end of input".to_string(),
        }
    }
}

/// quick-xml reader plus its event buffer.
struct EventSource<B: BufRead> {
    xml: Reader<B>,
    buf: Vec<u8>,
}

impl<B: BufRead> EventSource<B> {
    fn new(source: B) -> Self {
        let mut xml = Reader::from_reader(source);
        xml.expand_empty_elements(true).check_end_names(false);
        EventSource {
            xml,
            buf: Vec::new(),
        }
    }

    fn next_event(&mut self) -> Result<XmlEvent> {
        loop {
            self.buf.clear();
            let event = match self.xml.read_event_into(&mut self.buf)? {
                Event::Start(start) => XmlEvent::Start {
                    name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                    attributes: collect_attributes(&start)?,
                },
                Event::End(end) => XmlEvent::End {
                    name: String::from_utf8_lossy(end.name().as_ref()).into_owned(),
                },
                Event::Text(text) => XmlEvent::Text(text.unescape()?.into_owned()),
                Event::CData(data) => {
                    XmlEvent::Text(String::from_utf8_lossy(&data.into_inner()).into_owned())
                },
                Event::Eof => XmlEvent::Eof,
                _ => continue,
            };
            return Ok(event);
        }
    }

    /// Next event that is not whitespace between elements.
    fn next_significant(&mut self) -> Result<XmlEvent> {
        loop {
            match self.next_event()? {
                XmlEvent::Text(text) if text.trim().is_empty() => {},
                event => return Ok(event),
            }
        }
    }

    /// Collect character data up to the closing tag `name`.
    fn text_until(&mut self, name: &str) -> Result<String> {
        let mut content = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Text(text) => content.push_str(&text),
                XmlEvent::End { name: closing } if closing == name => return Ok(content),
                other => {
                    return Err(MarcError::ParseError(format!(
                        "Expected text and </{name}>, found {}",
                        other.describe()
                    )))
                },
            }
        }
    }
}

fn collect_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    start
        .attributes()
        .map(|attribute| -> Result<(String, String)> {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            Ok((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                attribute.unescape_value()?.into_owned(),
            ))
        })
        .collect()
}

fn required_attribute<'a>(
    attributes: &'a [(String, String)],
    key: &str,
    element: &str,
) -> Result<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| {
            MarcError::ParseError(format!("Missing \"{key}\" attribute on <{element}>"))
        })
}

/// Indicators and codes are single bytes; characters beyond Latin-1 cannot be
/// stored in one.
fn single_byte(value: &str) -> Option<u8> {
    value.chars().next().and_then(|c| u8::try_from(c).ok())
}

fn indicator(value: &str) -> u8 {
    single_byte(value).unwrap_or(b' ')
}

/// Work out the element prefix from the first element of a document.
fn detect_prefix(name: &str, attributes: &[(String, String)]) -> String {
    if attributes.iter().any(|(k, _)| k == "xmlns:marc") {
        return WRITER_PREFIX.to_string();
    }
    if attributes.iter().any(|(k, _)| k == "xmlns") {
        return String::new();
    }
    match name.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:"),
        None => String::new(),
    }
}

/// Parse the body of one `<record>` element; the opening tag is consumed.
fn parse_record<B: BufRead>(events: &mut EventSource<B>, prefix: &str) -> Result<MarcRecord> {
    let record_tag = format!("{prefix}record");
    let leader_tag = format!("{prefix}leader");
    let controlfield_tag = format!("{prefix}controlfield");
    let datafield_tag = format!("{prefix}datafield");

    match events.next_significant()? {
        XmlEvent::Start { name, .. } if name == leader_tag => {},
        other => {
            return Err(MarcError::ParseError(format!(
                "Expected <{leader_tag}>, found {}",
                other.describe()
            )))
        },
    }
    let leader = Leader::parse(events.text_until(&leader_tag)?.as_bytes())?;
    let mut record = MarcRecord::new(leader);

    loop {
        match events.next_significant()? {
            XmlEvent::Start { name, attributes } if name == controlfield_tag => {
                let tag = required_attribute(&attributes, "tag", &name)?;
                let value = events.text_until(&name)?;
                if value.is_empty() {
                    tracing::warn!(tag, "empty control field");
                }
                record.push_field(tag.parse()?, value.as_bytes());
            },
            XmlEvent::Start { name, attributes } if name == datafield_tag => {
                let tag = required_attribute(&attributes, "tag", &name)?;
                let ind1 = indicator(required_attribute(&attributes, "ind1", &name)?);
                let ind2 = indicator(required_attribute(&attributes, "ind2", &name)?);
                let subfields = parse_subfields(events, prefix, &name, tag, ind1, ind2)?;
                record.push_field(tag.parse()?, &subfields.serialize());
            },
            XmlEvent::End { name } if name == record_tag => break,
            other => {
                return Err(MarcError::ParseError(format!(
                    "Unexpected {} inside <{record_tag}>",
                    other.describe()
                )))
            },
        }
    }

    record.check_control_number()?;
    Ok(record)
}

fn parse_subfields<B: BufRead>(
    events: &mut EventSource<B>,
    prefix: &str,
    datafield: &str,
    tag: &str,
    ind1: u8,
    ind2: u8,
) -> Result<Subfields> {
    let subfield_tag = format!("{prefix}subfield");
    let mut subfields = Subfields::new(ind1, ind2);
    loop {
        match events.next_significant()? {
            XmlEvent::Start { name, attributes } if name == subfield_tag => {
                let code_attribute = required_attribute(&attributes, "code", &name)?;
                let code = single_byte(code_attribute).ok_or_else(|| {
                    MarcError::ParseError(format!(
                        "Invalid subfield code {code_attribute:?} in field {tag}"
                    ))
                })?;
                let value = events.text_until(&name)?;
                if value.is_empty() {
                    tracing::warn!(tag, code = %char::from(code), "empty subfield");
                }
                subfields.append_subfield(code, value.into_bytes());
            },
            XmlEvent::End { name } if name == datafield => return Ok(subfields),
            other => {
                return Err(MarcError::ParseError(format!(
                    "Unexpected {} inside <{datafield}>",
                    other.describe()
                )))
            },
        }
    }
}

/// Reader for MARC-XML.
#[derive(Debug)]
pub struct XmlMarcReader<R: BufRead + Seek> {
    source: R,
    path: Option<PathBuf>,
    namespace_prefix: Option<String>,
    records_read: usize,
}

impl<R: BufRead + Seek> XmlMarcReader<R> {
    /// Create a new reader over `source`.
    pub fn new(source: R) -> Self {
        XmlMarcReader {
            source,
            path: None,
            namespace_prefix: None,
            records_read: 0,
        }
    }

    /// Remember the file the source was opened from.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn next_record(&mut self) -> Result<Option<MarcRecord>> {
        // The parser only consumes the bytes of the events it returns, so a
        // fresh one can pick up after the previous </record>.
        let mut events = EventSource::new(&mut self.source);
        loop {
            match events.next_significant()? {
                XmlEvent::Eof => return Ok(None),
                XmlEvent::Start { name, attributes } => {
                    let prefix = self
                        .namespace_prefix
                        .get_or_insert_with(|| detect_prefix(&name, &attributes))
                        .clone();
                    if name == format!("{prefix}collection") {
                        continue;
                    }
                    if name == format!("{prefix}record") {
                        return parse_record(&mut events, &prefix).map(Some);
                    }
                    return Err(MarcError::ParseError(format!(
                        "Unexpected opening tag <{name}>, expected <{prefix}record>"
                    )));
                },
                XmlEvent::End { name } if name.ends_with("collection") => {},
                other => {
                    return Err(MarcError::ParseError(format!(
                        "Unexpected {} between records",
                        other.describe()
                    )))
                },
            }
        }
    }
}

impl<R: BufRead + Seek + std::fmt::Debug> MarcReader for XmlMarcReader<R> {
    fn read(&mut self) -> Result<Option<MarcRecord>> {
        let record = self.next_record()?;
        if record.is_some() {
            self.records_read += 1;
        }
        Ok(record)
    }

    fn rewind(&mut self) -> Result<()> {
        self.source.rewind()?;
        self.namespace_prefix = None;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn records_read(&self) -> usize {
        self.records_read
    }
}

/// Writer for MARC-XML.
///
/// The collection element is opened with the first record and closed by
/// [`MarcWriter::finish`], or on drop if `finish` was never called.
#[derive(Debug)]
pub struct XmlMarcWriter<W: Write> {
    sink: W,
    path: Option<PathBuf>,
    indent: usize,
    scratch: Vec<u8>,
    header_written: bool,
    finished: bool,
    records_written: usize,
}

impl<W: Write> XmlMarcWriter<W> {
    /// Create a new writer on `sink`, indenting nested elements by two spaces.
    pub fn new(sink: W) -> Self {
        XmlMarcWriter {
            sink,
            path: None,
            indent: 2,
            scratch: Vec::new(),
            header_written: false,
            finished: false,
            records_written: 0,
        }
    }

    /// Set the indentation width; zero writes each record on one line.
    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Remember the file the sink writes to.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn write_header(&mut self) -> Result<()> {
        let mut xml = Writer::new(&mut self.scratch);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        xml.get_mut().push(b'\n');
        let collection = BytesStart::new("marc:collection").with_attributes([
            ("xmlns:marc", MARCXML_NS),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ("xsi:schemaLocation", SCHEMA_LOCATION),
        ]);
        xml.write_event(Event::Start(collection))?;
        xml.get_mut().push(b'\n');
        Ok(())
    }

    fn write_record(&mut self, record: &MarcRecord) -> Result<()> {
        let mut leader = record.leader().clone();
        leader.set_record_length(0)?;
        leader.set_base_address_of_data(0)?;

        let mut xml = if self.indent > 0 {
            Writer::new_with_indent(&mut self.scratch, b' ', self.indent)
        } else {
            Writer::new(&mut self.scratch)
        };
        xml.write_event(Event::Start(BytesStart::new("marc:record")))?;
        write_text_element(&mut xml, "marc:leader", &[], &leader.to_string())?;

        for (tag, data) in record.fields() {
            let is_control_field = tag.is_control_field();
            let tag = tag.to_string();
            if is_control_field {
                let value = String::from_utf8_lossy(data);
                write_text_element(&mut xml, "marc:controlfield", &[("tag", &tag)], &value)?;
                continue;
            }

            let subfields = Subfields::parse(data);
            let ind1 = char::from(subfields.indicator1()).to_string();
            let ind2 = char::from(subfields.indicator2()).to_string();
            let datafield = BytesStart::new("marc:datafield").with_attributes([
                ("tag", tag.as_str()),
                ("ind1", ind1.as_str()),
                ("ind2", ind2.as_str()),
            ]);
            xml.write_event(Event::Start(datafield))?;
            for subfield in &subfields {
                let code = char::from(subfield.code).to_string();
                write_text_element(
                    &mut xml,
                    "marc:subfield",
                    &[("code", &code)],
                    &subfield.value_lossy(),
                )?;
            }
            xml.write_event(Event::End(BytesEnd::new("marc:datafield")))?;
        }

        xml.write_event(Event::End(BytesEnd::new("marc:record")))?;
        xml.get_mut().push(b'\n');
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.scratch.clear();
        if !self.header_written {
            self.write_header()?;
        }
        let mut xml = Writer::new(&mut self.scratch);
        xml.write_event(Event::End(BytesEnd::new("marc:collection")))?;
        xml.get_mut().push(b'\n');
        self.sink.write_all(&self.scratch)?;
        self.header_written = true;
        self.sink.flush()?;
        self.finished = true;
        Ok(())
    }
}

fn write_text_element<W: Write>(
    xml: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
    xml.write_event(Event::Start(start))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

impl<W: Write + std::fmt::Debug> MarcWriter for XmlMarcWriter<W> {
    fn write(&mut self, record: &MarcRecord) -> Result<()> {
        if self.finished {
            return Err(MarcError::CallerMisuse(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        self.scratch.clear();
        if !self.header_written {
            self.write_header()?;
        }
        self.write_record(record)?;
        self.sink.write_all(&self.scratch)?;
        self.header_written = true;
        self.records_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.close()
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn records_written(&self) -> usize {
        self.records_written
    }
}

impl<W: Write> Drop for XmlMarcWriter<W> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "failed to close MARC-XML collection");
            }
        }
    }
}

/// Serialize one record as a complete MARC-XML document.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized.
pub fn record_to_marcxml(record: &MarcRecord) -> Result<String> {
    let mut buffer = Vec::new();
    {
        let mut writer = XmlMarcWriter::new(&mut buffer);
        writer.write(record)?;
        writer.finish()?;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Parse every record of a MARC-XML document.
///
/// # Errors
///
/// Returns the first parse error.
pub fn marcxml_to_records(xml: &str) -> Result<Vec<MarcRecord>> {
    XmlMarcReader::new(Cursor::new(xml.as_bytes())).read_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MarcRecord {
        let mut record = MarcRecord::new(Leader::default());
        record.insert_field("001", b"PPN1").unwrap();
        record.insert_field("005", b"").unwrap();
        record
            .insert_field("245", b"10\x1FaFish & chips <new>\x1Fc\"Cook\"")
            .unwrap();
        record.insert_field("LOK", b"  \x1F0000 xxxxx").unwrap();
        record
    }

    #[test]
    fn test_write_produces_marcxml() {
        let xml = record_to_marcxml(&sample_record()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("xmlns:marc=\"http://www.loc.gov/MARC21/slim\""));
        assert!(xml.contains("<marc:leader>00000nam a2200000   4500</marc:leader>"));
        assert!(xml.contains("<marc:controlfield tag=\"001\">PPN1</marc:controlfield>"));
        assert!(xml.contains("<marc:datafield tag=\"245\" ind1=\"1\" ind2=\"0\">"));
        assert!(xml.contains("Fish &amp; chips &lt;new&gt;"));
        assert!(xml.contains("<marc:datafield tag=\"LOK\" ind1=\" \" ind2=\" \">"));
        assert!(xml.trim_end().ends_with("</marc:collection>"));
    }

    #[test]
    fn test_round_trip() {
        let original = sample_record();
        let xml = record_to_marcxml(&original).unwrap();
        let records = marcxml_to_records(&xml).unwrap();
        assert_eq!(records.len(), 1);

        let read = &records[0];
        assert_eq!(read.number_of_fields(), original.number_of_fields());
        for ((tag_a, data_a), (tag_b, data_b)) in read.fields().zip(original.fields()) {
            assert_eq!(tag_a, tag_b);
            assert_eq!(data_a, data_b);
        }
    }

    #[test]
    fn test_leader_lengths_zeroed() {
        let mut record = sample_record();
        record.leader_mut().set_record_length(1234).unwrap();
        record.leader_mut().set_base_address_of_data(99).unwrap();
        let xml = record_to_marcxml(&record).unwrap();
        assert!(xml.contains("<marc:leader>00000nam a2200000   4500</marc:leader>"));
    }

    #[test]
    fn test_default_namespace_and_empty_elements() {
        let xml = r#"<?xml version="1.0"?>
<collection xmlns="http://www.loc.gov/MARC21/slim">
  <record>
    <leader>00000cam a2200000   4500</leader>
    <controlfield tag="001">PPN7</controlfield>
    <datafield tag="245" ind1="0" ind2="0">
      <subfield code="a">Title</subfield>
      <subfield code="b"/>
    </datafield>
  </record>
</collection>"#;
        let records = marcxml_to_records(xml).unwrap();
        assert_eq!(records.len(), 1);
        let subfields = records[0].get_subfields_by_tag("245");
        assert_eq!(subfields.get_first_subfield_value(b'a'), Some(&b"Title"[..]));
        assert_eq!(subfields.get_first_subfield_value(b'b'), Some(&b""[..]));
    }

    #[test]
    fn test_missing_attribute_is_an_error() {
        let xml = r#"<marc:collection xmlns:marc="http://www.loc.gov/MARC21/slim">
<marc:record><marc:leader>00000nam a2200000   4500</marc:leader>
<marc:controlfield tag="001">1</marc:controlfield>
<marc:datafield tag="245" ind1="1"><marc:subfield code="a">x</marc:subfield></marc:datafield>
</marc:record></marc:collection>"#;
        let err = marcxml_to_records(xml).unwrap_err().to_string();
        assert!(err.contains("ind2"), "got: {err}");
    }

    #[test]
    fn test_unexpected_tag_is_an_error() {
        let xml = r#"<marc:collection xmlns:marc="http://www.loc.gov/MARC21/slim">
<marc:record><marc:leader>00000nam a2200000   4500</marc:leader>
<marc:bogus/></marc:record></marc:collection>"#;
        assert!(matches!(
            marcxml_to_records(xml),
            Err(MarcError::ParseError(_))
        ));
    }

    #[test]
    fn test_mismatched_close_tag_is_an_error() {
        let xml = r#"<collection><record><leader>00000nam a2200000   4500</leader>
<controlfield tag="001">1</datafield></record></collection>"#;
        assert!(matches!(
            marcxml_to_records(xml),
            Err(MarcError::ParseError(_))
        ));
    }

    #[test]
    fn test_prefix_is_used_consistently() {
        let xml = r#"<marc:collection xmlns:marc="http://www.loc.gov/MARC21/slim">
<record><leader>00000nam a2200000   4500</leader></record></marc:collection>"#;
        assert!(marcxml_to_records(xml).is_err());
    }

    #[test]
    fn test_rewind() {
        let xml = record_to_marcxml(&sample_record()).unwrap();
        let mut reader = XmlMarcReader::new(Cursor::new(xml.into_bytes()));
        assert!(reader.read().unwrap().is_some());
        assert!(reader.read().unwrap().is_none());
        reader.rewind().unwrap();
        assert!(reader.read().unwrap().is_some());
        assert_eq!(reader.records_read(), 2);
        assert!(matches!(reader.seek(0), Err(MarcError::Unsupported(_))));
    }

    #[test]
    fn test_writer_closes_collection_on_drop() {
        let mut buffer = Vec::new();
        {
            let mut writer = XmlMarcWriter::new(&mut buffer).with_indent(0);
            writer.write(&sample_record()).unwrap();
        }
        let xml = String::from_utf8(buffer).unwrap();
        assert!(xml.trim_end().ends_with("</marc:collection>"));
        assert_eq!(marcxml_to_records(&xml).unwrap().len(), 1);
    }

    /// Rejects the first `failures` writes, then buffers everything.
    #[derive(Debug, Default)]
    struct FailingSink {
        failures: usize,
        written: Vec<u8>,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_header_written_after_failed_first_write() {
        let mut writer = XmlMarcWriter::new(FailingSink {
            failures: 1,
            ..FailingSink::default()
        });
        assert!(matches!(
            writer.write(&sample_record()),
            Err(MarcError::IoError(_))
        ));
        assert_eq!(writer.records_written(), 0);

        writer.write(&sample_record()).unwrap();
        writer.finish().unwrap();

        let xml = String::from_utf8(std::mem::take(&mut writer.sink.written)).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert_eq!(marcxml_to_records(&xml).unwrap().len(), 1);
    }

    #[test]
    fn test_latin1_codes_and_indicators_cross_xml() {
        let mut record = MarcRecord::new(Leader::default());
        record.insert_field("001", b"PPN1").unwrap();
        record.insert_field("500", b"\xE01\x1F\xB1x").unwrap();

        let xml = record_to_marcxml(&record).unwrap();
        assert!(xml.contains("ind1=\"\u{E0}\""));
        let read = marcxml_to_records(&xml).unwrap();
        assert_eq!(read[0].get_field_data_by_tag("500"), b"\xE01\x1F\xB1x");
    }
}
