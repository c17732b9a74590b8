//! Storage benchmarks for Loam.
//!
//! Benchmarks critical storage operations including:
//! - Loose object commit/read at various sizes
//! - Codec encode/decode throughput
//! - Directory enumeration

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use loam_storage::{
    LooseObjectStore, MemoryObjectStore, ObjectReader, ObjectStorage, ObjectType, ObjectWriter,
    StoreConfig,
};
use std::io::{Cursor, Read, Write};
use tempfile::TempDir;

const SIZES: [usize; 4] = [1_024, 10_240, 102_400, 1_048_576];

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

fn loose_store() -> (TempDir, LooseObjectStore) {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new(dir.path().join("objects")).with_temp_dir(dir.path());
    let store = LooseObjectStore::new(config);
    store.init().unwrap();
    (dir, store)
}

/// Benchmark staging and committing loose objects
fn bench_loose_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("loose_store_write");

    for size in SIZES.iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("put", size), size, |b, &size| {
            let (_dir, store) = loose_store();
            let data = generate_data(size);
            let mut counter = 0u64;

            b.iter(|| {
                // Vary the payload so every iteration commits a new object.
                counter += 1;
                let mut payload = data.clone();
                payload[..8].copy_from_slice(&counter.to_le_bytes());
                black_box(store.put_bytes(ObjectType::Blob, &payload).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark looking up and streaming loose objects
fn bench_loose_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("loose_store_read");

    for size in SIZES.iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("get", size), size, |b, &size| {
            let (_dir, store) = loose_store();
            let id = store
                .put_bytes(ObjectType::Blob, &generate_data(size))
                .unwrap();

            b.iter(|| black_box(store.read_bytes(&id).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark the codec without filesystem I/O
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for size in SIZES.iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), size, |b, &size| {
            let data = generate_data(size);

            b.iter(|| {
                let mut writer =
                    ObjectWriter::new(Vec::new(), ObjectType::Blob, size as u64).unwrap();
                writer.write_all(&data).unwrap();
                black_box(writer.finish().unwrap())
            });
        });

        group.bench_with_input(BenchmarkId::new("decode", size), size, |b, &size| {
            let data = generate_data(size);
            let mut writer = ObjectWriter::new(Vec::new(), ObjectType::Blob, size as u64).unwrap();
            writer.write_all(&data).unwrap();
            let encoded = writer.finish().unwrap();

            b.iter(|| {
                let mut reader = ObjectReader::new(Cursor::new(&encoded)).unwrap();
                let mut out = Vec::with_capacity(size);
                reader.read_to_end(&mut out).unwrap();
                black_box(out)
            });
        });
    }

    group.finish();
}

/// Benchmark walking the objects directory
fn bench_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("iter");

    for count in [100usize, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("loose", count), count, |b, &count| {
            let (_dir, store) = loose_store();
            for i in 0..count {
                store
                    .put_bytes(ObjectType::Blob, format!("object {i}").as_bytes())
                    .unwrap();
            }

            b.iter(|| black_box(store.iter(None).unwrap().count()));
        });

        group.bench_with_input(BenchmarkId::new("memory", count), count, |b, &count| {
            let store = MemoryObjectStore::new();
            for i in 0..count {
                store
                    .put_bytes(ObjectType::Blob, format!("object {i}").as_bytes())
                    .unwrap();
            }

            b.iter(|| black_box(store.iter(None).unwrap().count()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_loose_write,
    bench_loose_read,
    bench_codec,
    bench_iter
);
criterion_main!(benches);
