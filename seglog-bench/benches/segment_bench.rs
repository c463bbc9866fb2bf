//! Segment-level benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seglog_wal::{checksum, LogState, OffsetIndex, SegmentLog, SegmentReader};
use tempfile::TempDir;

const MAX_RECORD_SIZE: usize = 64 * 1024;

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");

    for size in [64, 1024, 16 * 1024] {
        let data = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(checksum::hash(data)));
        });
    }

    group.finish();
}

fn bench_log_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append");

    for size in [100, 1000, 10000] {
        let dir = TempDir::new().unwrap();
        let mut log = SegmentLog::open(
            dir.path().join("00000000000000000000.log"),
            MAX_RECORD_SIZE,
            Some(LogState::default()),
        )
        .unwrap();
        let payload = vec![b'x'; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("payload_bytes", size), &payload, |b, p| {
            b.iter(|| black_box(log.append(p).unwrap()));
        });
    }

    group.finish();
}

fn bench_rebuild_and_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_scan");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("00000000000000000000.log");
    let records = 10_000u64;
    {
        let mut log = SegmentLog::open(&path, MAX_RECORD_SIZE, Some(LogState::default())).unwrap();
        for i in 0..records {
            log.append(format!("record-{:08}", i).as_bytes()).unwrap();
        }
        log.sync().unwrap();
    }

    group.throughput(Throughput::Elements(records));
    group.bench_function("rebuild_state", |b| {
        b.iter(|| {
            let mut log = SegmentLog::open(&path, MAX_RECORD_SIZE, None).unwrap();
            black_box(log.rebuild_state().unwrap())
        });
    });
    group.bench_function("reader", |b| {
        b.iter(|| {
            let mut reader = SegmentReader::open(&path, 0, MAX_RECORD_SIZE).unwrap();
            let mut count = 0u64;
            while reader.next().unwrap().is_some() {
                count += 1;
            }
            black_box(count)
        });
    });

    group.finish();
}

fn bench_index_find(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut index = OffsetIndex::open(dir.path().join("bench.index"), true).unwrap();
    for i in 0..100_000u32 {
        index.add(i * 2, i * 40).unwrap();
    }

    c.bench_function("index_find", |b| {
        let mut key = 0u32;
        b.iter(|| {
            key = (key + 7919) % 200_000;
            black_box(index.find(key).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_checksum,
    bench_log_append,
    bench_rebuild_and_scan,
    bench_index_find
);
criterion_main!(benches);
