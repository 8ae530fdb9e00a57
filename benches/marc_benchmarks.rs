#![allow(missing_docs)]
//! Benchmarks for the marc-engine codecs.
//!
//! Fixtures are generated in memory: 1,000 bibliographic records with a
//! couple of local data blocks each.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use marc_engine::{
    BinaryMarcReader, BinaryMarcWriter, Leader, MarcReader, MarcRecord, MarcWriter, Subfields,
    XmlMarcReader, XmlMarcWriter,
};
use std::io::Cursor;

fn data_field(ind1: u8, ind2: u8, subfields: &[(u8, &str)]) -> Vec<u8> {
    let mut field = Subfields::new(ind1, ind2);
    for &(code, value) in subfields {
        field.append_subfield(code, value);
    }
    field.serialize()
}

fn make_record(i: usize) -> MarcRecord {
    let mut record = MarcRecord::new(Leader::default());
    record.insert_field("001", format!("PPN{i:09}").as_bytes()).unwrap();
    record
        .insert_field("008", b"850101s1925    xxu           000 1 eng d")
        .unwrap();
    record
        .insert_field("041", &data_field(b'0', b' ', &[(b'a', "eng")]))
        .unwrap();
    record
        .insert_field("100", &data_field(b'1', b' ', &[(b'a', "Author, Some")]))
        .unwrap();
    let title = format!("Title number {i}");
    record
        .insert_field("245", &data_field(b'1', b'0', &[(b'a', &title), (b'c', "Some Author.")]))
        .unwrap();
    for subject in ["History", "Geography", "Travel"] {
        record
            .insert_field("650", &data_field(b' ', b'7', &[(b'a', subject), (b'2', "gnd")]))
            .unwrap();
    }
    for block in 0..2 {
        record.insert_field("LOK", b"  \x1F0000 xxxxx").unwrap();
        let sigil = format!("DE-{block}");
        record
            .insert_field("LOK", &data_field(b' ', b' ', &[(b'0', "852  "), (b'a', &sigil)]))
            .unwrap();
    }
    record
}

fn fixture_records() -> Vec<MarcRecord> {
    (0..1_000).map(make_record).collect()
}

fn to_binary(records: &[MarcRecord]) -> Vec<u8> {
    let mut buffer = Vec::new();
    BinaryMarcWriter::new(&mut buffer).write_batch(records).unwrap();
    buffer
}

fn to_xml(records: &[MarcRecord]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut writer = XmlMarcWriter::new(&mut buffer);
        writer.write_batch(records).unwrap();
        writer.finish().unwrap();
    }
    buffer
}

fn benchmark_read_binary_1k(c: &mut Criterion) {
    let fixture = black_box(to_binary(&fixture_records()));

    c.bench_function("read_binary_1k", |b| {
        b.iter(|| {
            let mut reader = BinaryMarcReader::new(Cursor::new(fixture.as_slice()));
            let mut count = 0;
            while let Ok(Some(_record)) = reader.read() {
                count += 1;
            }
            count
        });
    });
}

fn benchmark_read_with_field_access_1k(c: &mut Criterion) {
    let fixture = black_box(to_binary(&fixture_records()));

    c.bench_function("read_binary_1k_with_field_access", |b| {
        b.iter(|| {
            let mut reader = BinaryMarcReader::new(Cursor::new(fixture.as_slice()));
            let mut blocks = 0;
            while let Ok(Some(record)) = reader.read() {
                let _ = black_box(record.extract_first_subfield("245", b'a'));
                let _ = black_box(record.get_language("ger"));
                blocks += record.find_all_local_data_blocks().len();
            }
            blocks
        });
    });
}

fn benchmark_write_binary_1k(c: &mut Criterion) {
    let records = fixture_records();

    c.bench_function("write_binary_1k", |b| {
        b.iter(|| black_box(to_binary(&records)).len());
    });
}

fn benchmark_xml_roundtrip_1k(c: &mut Criterion) {
    let records = fixture_records();

    c.bench_function("xml_roundtrip_1k", |b| {
        b.iter(|| {
            let xml = to_xml(&records);
            let mut reader = XmlMarcReader::new(Cursor::new(xml.as_slice()));
            let mut count = 0;
            while let Ok(Some(_record)) = reader.read() {
                count += 1;
            }
            count
        });
    });
}

fn benchmark_filter_local_blocks_1k(c: &mut Criterion) {
    let records = fixture_records();
    let local = marc_engine::tag_set(["LOK"]).unwrap();

    c.bench_function("filter_local_blocks_1k", |b| {
        b.iter(|| {
            records
                .iter()
                .map(|record| record.clone().filter_tags(&local))
                .sum::<usize>()
        });
    });
}

criterion_group!(
    benches,
    benchmark_read_binary_1k,
    benchmark_read_with_field_access_1k,
    benchmark_write_binary_1k,
    benchmark_xml_roundtrip_1k,
    benchmark_filter_local_blocks_1k
);
criterion_main!(benches);
