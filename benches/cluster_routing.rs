use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use naiad_redis::cluster::slot::key_slot;
use naiad_redis::utils::crc16;

fn bench_key_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_slot");

    for key in ["short", "a-slightly-longer-key-name", "{user1000}.followers"] {
        group.bench_with_input(BenchmarkId::new("key_slot", key), &key, |b, &key| {
            b.iter(|| black_box(key_slot(key)));
        });
    }

    group.finish();
}

fn bench_crc16(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc16");

    for size in [8, 64, 512] {
        let data = vec![b'x'; size];
        group.bench_with_input(BenchmarkId::new("bytes", size), &data, |b, data| {
            b.iter(|| black_box(crc16(data)));
        });
    }

    group.finish();
}

/// Mirrors how a router picks the owning range out of a sorted slot list:
/// a linear scan over contiguous `(start, end)` ranges, the shape
/// `NodeRouter::node_for_slot` uses internally.
fn bench_slot_range_lookup(c: &mut Criterion) {
    let ranges: Vec<(u16, u16)> = (0..16u16)
        .map(|i| (i * 1024, i * 1024 + 1023))
        .collect();

    c.bench_function("slot_range_lookup_16_nodes", |b| {
        b.iter(|| {
            let slot = black_box(9000u16);
            let found = ranges.iter().find(|(start, end)| slot >= *start && slot <= *end);
            black_box(found);
        });
    });
}

criterion_group!(benches, bench_key_slot, bench_crc16, bench_slot_range_lookup);
criterion_main!(benches);
