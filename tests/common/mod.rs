//! Fixture records shared across the integration tests.

#![allow(dead_code)]

use marc_engine::{Leader, MarcRecord, Subfields};

/// Content of a field opening a local data block.
pub const LOCAL_BLOCK_MARKER: &[u8] = b"  \x1F0000 xxxxx";

/// Serialize a data field from indicators and `(code, value)` pairs.
pub fn data_field(ind1: u8, ind2: u8, subfields: &[(u8, &str)]) -> Vec<u8> {
    let mut field = Subfields::new(ind1, ind2);
    for &(code, value) in subfields {
        field.append_subfield(code, value);
    }
    field.serialize()
}

/// A local pseudo field replicating `tag` with `indicators`.
pub fn local_field(tag: &str, indicators: &str, subfields: &[(u8, &str)]) -> Vec<u8> {
    let mut field = Subfields::new(b' ', b' ');
    field.append_subfield(b'0', format!("{tag}{indicators}"));
    for &(code, value) in subfields {
        field.append_subfield(code, value);
    }
    field.serialize()
}

/// An `008` field with `language` at positions 35-37.
pub fn fixed_length_data(language: &str) -> Vec<u8> {
    format!("850101s1925    xxu           000 1 {language} d").into_bytes()
}

/// A typical bibliographic record with 13 fields.
pub fn book_record() -> MarcRecord {
    let mut record = MarcRecord::new(Leader::default());
    record.insert_field("001", b"PPN0815").unwrap();
    record.insert_field("003", b"DE-627").unwrap();
    record.insert_field("005", b"20240101120000.0").unwrap();
    record.insert_field("008", &fixed_length_data("eng")).unwrap();
    record
        .insert_field("020", &data_field(b' ', b' ', &[(b'a', "9780743273565")]))
        .unwrap();
    record
        .insert_field("041", &data_field(b'0', b' ', &[(b'a', "eng"), (b'a', "ger")]))
        .unwrap();
    record
        .insert_field("100", &data_field(b'1', b' ', &[(b'a', "Fitzgerald, F. Scott")]))
        .unwrap();
    record
        .insert_field(
            "245",
            &data_field(b'1', b'4', &[(b'a', "The Great Gatsby /"), (b'c', "F. Scott Fitzgerald.")]),
        )
        .unwrap();
    record
        .insert_field("250", &data_field(b' ', b' ', &[(b'a', "1st ed.")]))
        .unwrap();
    record
        .insert_field(
            "260",
            &data_field(b' ', b' ', &[(b'a', "New York :"), (b'b', "Scribner,"), (b'c', "1925.")]),
        )
        .unwrap();
    record
        .insert_field("300", &data_field(b' ', b' ', &[(b'a', "218 p.")]))
        .unwrap();
    record
        .insert_field("650", &data_field(b' ', b'0', &[(b'a', "Rich people"), (b'z', "New York")]))
        .unwrap();
    record
        .insert_field("700", &data_field(b'1', b' ', &[(b'a', "Perkins, Maxwell")]))
        .unwrap();
    record
}

/// A record with 84 fields: `001`, `008` and 82 subject headings.
pub fn large_record() -> MarcRecord {
    let mut record = MarcRecord::new(Leader::default());
    record.insert_field("001", b"PPN84").unwrap();
    record.insert_field("008", &fixed_length_data("ger")).unwrap();
    for i in 0..82 {
        let heading = format!("Subject {i}");
        record
            .insert_field("650", &data_field(b' ', b'7', &[(b'a', &heading), (b'2', "gnd")]))
            .unwrap();
    }
    record
}

/// Append local data blocks of the given sizes to `record`.
///
/// Each block starts with the block marker, followed by alternating `852`
/// and `866` pseudo fields.
pub fn add_local_blocks(record: &mut MarcRecord, block_sizes: &[usize]) {
    for (block, &size) in block_sizes.iter().enumerate() {
        record.insert_field("LOK", LOCAL_BLOCK_MARKER).unwrap();
        for i in 1..size {
            let sigil = format!("DE-{block}");
            let content = if i % 2 == 1 {
                local_field("852", "  ", &[(b'a', &sigil)])
            } else {
                local_field("866", " 0", &[(b'a', "1990-")])
            };
            record.insert_field("LOK", &content).unwrap();
        }
    }
}

/// A record with 5 local fields in blocks of 2 and 3.
pub fn record_with_two_local_blocks() -> MarcRecord {
    let mut record = book_record();
    add_local_blocks(&mut record, &[2, 3]);
    record
}

/// A record with 57 local fields in 6 blocks.
pub fn record_with_six_local_blocks() -> MarcRecord {
    let mut record = book_record();
    add_local_blocks(&mut record, &[10, 10, 10, 10, 10, 7]);
    record
}

/// A record too large for one physical ISO 2709 record.
pub fn oversized_record() -> MarcRecord {
    let mut record = book_record();
    let note = "n".repeat(9_000);
    for _ in 0..25 {
        record
            .insert_field("520", &data_field(b' ', b' ', &[(b'a', &note)]))
            .unwrap();
    }
    record
}

/// Assert that two records carry the same fields in the same order.
pub fn assert_same_fields(actual: &MarcRecord, expected: &MarcRecord) {
    assert_eq!(actual.number_of_fields(), expected.number_of_fields());
    for ((tag_a, data_a), (tag_b, data_b)) in actual.fields().zip(expected.fields()) {
        assert_eq!(tag_a, tag_b);
        assert_eq!(data_a, data_b, "content of field {tag_a} differs");
    }
}
