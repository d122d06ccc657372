#![no_main]
use libfuzzer_sys::fuzz_target;
use ipregion::{build, Address, Index, IpFamily, Segment};

fuzz_target!(|data: &[u8]| {
    // Every four bytes is a cut point; the whole input is also looked up as text
    let mut cuts: Vec<u32> = data
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .filter(|&c| c > 0)
        .take(512)
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut bounds = vec![0u32];
    bounds.extend(&cuts);
    let segments: Vec<Segment> = bounds
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = bounds.get(i + 1).map(|n| n - 1).unwrap_or(u32::MAX);
            Segment::new(
                Address::from_u128(IpFamily::V4, start as u128).unwrap(),
                Address::from_u128(IpFamily::V4, end as u128).unwrap(),
                format!("R{}", i % 3),
            )
            .unwrap()
        })
        .collect();

    let bytes = build(&segments, IpFamily::V4, 2).unwrap();
    let index = Index::from_bytes(bytes).unwrap();
    for seg in &segments {
        assert_eq!(index.lookup_addr(&seg.start).unwrap(), seg.region);
        assert_eq!(index.lookup_addr(&seg.end).unwrap(), seg.region);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = index.lookup(s);
    }
});
