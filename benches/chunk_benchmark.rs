//! Chunk encoding benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use piwigo_uploadr::upload::chunked::{expected_chunks, ChunkTransmission};
use piwigo_uploadr::upload::ContentHash;

fn benchmark_chunk_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_encoding");
    let hash = ContentHash::new("d41d8cd98f00b204e9800998ecf8427e").unwrap();

    for size in [64 * 1024, 512 * 1024, 2 * 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(format!("{}_bytes", size), size, |b, &size| {
            let data = vec![0xA5u8; size];
            b.iter(|| {
                let chunk = ChunkTransmission::encode(&hash, 0, black_box(&data));
                black_box(chunk.payload.len());
            });
        });
    }

    group.finish();
}

fn benchmark_chunk_count(c: &mut Criterion) {
    c.bench_function("expected_chunks", |b| {
        b.iter(|| expected_chunks(black_box(7_340_033), black_box(512 * 1024)));
    });
}

criterion_group!(benches, benchmark_chunk_encoding, benchmark_chunk_count);
criterion_main!(benches);
