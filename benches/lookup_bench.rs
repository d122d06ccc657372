use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipregion::{build, Address, Index, IpFamily, Segment};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr};

/// Contiguous v4 segments over the whole address space
fn v4_partition(rng: &mut StdRng, count: usize) -> Vec<Segment> {
    let mut cuts: Vec<u32> = (1..count).map(|_| rng.random::<u32>()).filter(|&c| c > 0).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut bounds = vec![0u32];
    bounds.extend(cuts);
    bounds
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = bounds.get(i + 1).map(|n| n - 1).unwrap_or(u32::MAX);
            Segment::new(
                Address::from_u128(IpFamily::V4, start as u128).unwrap(),
                Address::from_u128(IpFamily::V4, end as u128).unwrap(),
                format!("Country{}|Province{}|City{}|ISP{}", i % 200, i % 34, i % 500, i % 12),
            )
            .unwrap()
        })
        .collect()
}

fn random_queries(rng: &mut StdRng, count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|_| IpAddr::V4(Ipv4Addr::from(rng.random::<u32>())))
        .collect()
}

// Benchmark: lookups against memory-mapped and in-memory artifacts
fn bench_lookup_storage(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_storage");
    let mut rng = StdRng::seed_from_u64(42);
    let queries = random_queries(&mut rng, 10_000);

    for segment_count in [1_000usize, 100_000, 700_000] {
        let segs = v4_partition(&mut rng, segment_count);
        let bytes = build(&segs, IpFamily::V4, 2).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.xdb");
        std::fs::write(&path, &bytes).unwrap();

        let mapped = Index::open(&path).unwrap();
        let loaded = Index::load(&path).unwrap();

        group.throughput(Throughput::Elements(queries.len() as u64));
        for (name, index) in [("mmap", &mapped), ("memory", &loaded)] {
            group.bench_with_input(
                BenchmarkId::new(name, segment_count),
                &queries,
                |b, queries| {
                    b.iter(|| {
                        for ip in queries {
                            black_box(index.lookup_ip(black_box(*ip)).unwrap());
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

// Benchmark: text parsing plus lookup, the path the CLI takes
fn bench_lookup_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_text");
    let mut rng = StdRng::seed_from_u64(7);
    let segs = v4_partition(&mut rng, 100_000);
    let index = Index::from_bytes(build(&segs, IpFamily::V4, 2).unwrap()).unwrap();
    let queries: Vec<String> = random_queries(&mut rng, 10_000)
        .iter()
        .map(|ip| ip.to_string())
        .collect();

    group.throughput(Throughput::Elements(queries.len() as u64));
    group.bench_function("parse_and_lookup", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(index.lookup(black_box(q)).unwrap());
            }
        });
    });

    group.finish();
}

// Benchmark: vector index granularity
fn bench_prefix_len(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_len");
    let mut rng = StdRng::seed_from_u64(11);
    let segs = v4_partition(&mut rng, 200_000);
    let queries = random_queries(&mut rng, 10_000);

    group.throughput(Throughput::Elements(queries.len() as u64));
    for prefix_len in [1u8, 2] {
        let index = Index::from_bytes(build(&segs, IpFamily::V4, prefix_len).unwrap()).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(prefix_len),
            &queries,
            |b, queries| {
                b.iter(|| {
                    for ip in queries {
                        black_box(index.lookup_ip(*ip).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_lookup_storage, bench_lookup_text, bench_prefix_len);
criterion_main!(benches);
