use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipregion::{Address, IndexBuilder, IpFamily, Segment};
use std::hint::black_box;

/// Evenly sized v4 segments with `unique` distinct region strings
fn even_partition(count: u32, unique: u32) -> Vec<Segment> {
    let step = u32::MAX / count;
    (0..count)
        .map(|i| {
            let start = i * step;
            let end = if i + 1 == count { u32::MAX } else { start + step - 1 };
            Segment::new(
                Address::from_u128(IpFamily::V4, start as u128).unwrap(),
                Address::from_u128(IpFamily::V4, end as u128).unwrap(),
                format!("Country{}|0|City{}|ISP", i % unique, i % unique),
            )
            .unwrap()
        })
        .collect()
}

// Benchmark: building with heavy and no region sharing
fn bench_build_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(20);

    for count in [1_000u32, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));
        for (name, unique) in [("high_dedup", 10), ("no_dedup", count)] {
            let segs = even_partition(count, unique);
            group.bench_with_input(BenchmarkId::new(name, count), &segs, |b, segs| {
                b.iter(|| {
                    let mut builder = IndexBuilder::new(IpFamily::V4);
                    for seg in segs {
                        builder.add_segment(seg.clone()).unwrap();
                    }
                    black_box(builder.build().unwrap());
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_build_dedup);
criterion_main!(benches);
