//! Criterion micro-benchmarks for the append path.
//!
//! Measures:
//! - Message set validation and offset stamping
//! - Filling chunks from a prepared batch
//! - Chunk serialization
//!
//! Run with: `cargo bench --bench framing_bench`

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chunklog::log::{Chunk, prepare_message_set};
use chunklog::protocol::build_message;

/// A batch of `count` v0 messages with `value_size`-byte values.
fn message_set(count: usize, value_size: usize) -> BytesMut {
    let value = vec![0xabu8; value_size];
    let mut set = BytesMut::new();
    for _ in 0..count {
        set.extend_from_slice(&build_message(0, None, Some(&value)));
    }
    set
}

/// Benchmark CRC validation and offset stamping for different batch sizes.
fn bench_prepare_message_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare_message_set");

    for count in [1, 10, 100, 1_000].iter() {
        let set = message_set(*count, 100);
        group.throughput(Throughput::Bytes(set.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| prepare_message_set(black_box(set.clone()), black_box(12345)));
        });
    }

    group.finish();
}

/// Benchmark splitting one batch across chunks of different capacities.
fn bench_fill_chunks(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_chunks");
    let set = message_set(1_000, 100);
    group.throughput(Throughput::Bytes(set.len() as u64));

    for chunk_size in [4 * 1024, 64 * 1024, 1024 * 1024].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut filler = match prepare_message_set(set.clone(), 0) {
                        Ok(filler) => filler,
                        Err(code) => panic!("benchmark batch rejected: {code:?}"),
                    };
                    let mut next_offset = 0;
                    let mut chunks = 0;
                    while !filler.is_done() {
                        let mut chunk = Chunk::new(next_offset, chunk_size);
                        next_offset += filler.fill_chunk(&mut chunk) as i64;
                        chunks += 1;
                    }
                    black_box(chunks)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark persisting a full chunk.
fn bench_chunk_to_bytes(c: &mut Criterion) {
    let mut chunk = Chunk::new(0, 64 * 1024);
    if let Ok(mut filler) = prepare_message_set(message_set(500, 100), 0) {
        filler.fill_chunk(&mut chunk);
    }

    c.bench_function("chunk_to_bytes_64k", |b| {
        b.iter(|| black_box(&chunk).to_bytes());
    });
}

criterion_group!(
    benches,
    bench_prepare_message_set,
    bench_fill_chunks,
    bench_chunk_to_bytes
);
criterion_main!(benches);
