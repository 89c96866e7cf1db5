#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

use larm_entry::{decode, encode, EntryFields, EntryKind, PAYLOAD_DESCRIPTION_WIDTH};

// One full-size chunk with the default 1000-byte chunk limit.
const CHUNK: [u8; 1000] = [0x5A; 1000];

fn chunk_fields() -> EntryFields<'static> {
    EntryFields {
        kind: EntryKind::PayloadChunk,
        entry_id: 1,
        chunk_index: 1,
        chunk_count: 3,
        alert_id: 42,
        session_id: b"0a1b2c3d4e5f",
        device_name: b"pump-controller-7",
        device_name_width: 32,
        description: b"crash.dmp",
        description_width: PAYLOAD_DESCRIPTION_WIDTH,
        data: &CHUNK,
    }
}

fn benchmark_entry_encode(c: &mut Criterion) {
    let fields = chunk_fields();
    let mut buf = vec![0u8; 1200];

    c.bench_function("entry_encode", |b| {
        b.iter(|| {
            black_box(encode(&mut buf, black_box(&fields)).map(|entry| entry.size())).unwrap();
        })
    });
}

fn benchmark_entry_decode(c: &mut Criterion) {
    let mut buf = vec![0u8; 1200];
    encode(&mut buf, &chunk_fields()).unwrap();

    c.bench_function("entry_decode", |b| {
        b.iter(|| {
            black_box(decode(black_box(&buf))).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_entry_encode, benchmark_entry_decode);
criterion_main!(benches);
