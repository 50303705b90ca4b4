//! Decode throughput benchmarks for lzmaviz-lzma.
//!
//! Heat tracing adds floating-point work to every decoded bit, so these
//! benches track the decode cost across data patterns with very different
//! literal/match mixes.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lzmaviz_lzma::{compress_sized, decode_bytes};
use std::hint::black_box;

/// Test data patterns.
mod test_data {
    /// All bytes identical (one literal, then long copies).
    pub fn uniform(size: usize) -> Vec<u8> {
        vec![0xAA; size]
    }

    /// LCG noise (literal-dominated).
    pub fn random(size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut seed: u64 = 0x123456789ABCDEF0;
        for _ in 0..size {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((seed >> 32) as u8);
        }
        data
    }

    /// Repeated phrases (match-dominated at short distances).
    pub fn text_like(size: usize) -> Vec<u8> {
        let text = b"The quick brown fox jumps over the lazy dog. \
                     Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            let chunk = (size - data.len()).min(text.len());
            data.extend_from_slice(&text[..chunk]);
        }
        data
    }
}

fn bench_decode_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_patterns");

    let size = 64 * 1024;
    let patterns: [(&str, fn(usize) -> Vec<u8>); 3] = [
        ("uniform", test_data::uniform),
        ("random", test_data::random),
        ("text", test_data::text_like),
    ];

    for (name, generator) in patterns {
        let stream = compress_sized(&generator(size), 1 << 16);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &stream, |b, stream| {
            b.iter(|| {
                let decoded = decode_bytes(black_box(stream)).unwrap();
                black_box(decoded);
            });
        });
    }

    group.finish();
}

fn bench_decode_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_sizes");

    for (name, size) in [("1KB", 1024), ("16KB", 16 * 1024), ("256KB", 256 * 1024)] {
        let stream = compress_sized(&test_data::text_like(size), 1 << 16);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &stream, |b, stream| {
            b.iter(|| {
                let decoded = decode_bytes(black_box(stream)).unwrap();
                black_box(decoded);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode_patterns, bench_decode_sizes);
criterion_main!(benches);
