//! Property tests for the address codec and segment model

use ipregion::segment::merge_adjacent;
use ipregion::{build, Address, Index, IpFamily, Segment};
use proptest::prelude::*;
use std::cmp::Ordering;

fn v4() -> impl Strategy<Value = Address> {
    any::<u32>().prop_map(|v| Address::from_u128(IpFamily::V4, v as u128).unwrap())
}

fn v6() -> impl Strategy<Value = Address> {
    any::<u128>().prop_map(|v| Address::from_u128(IpFamily::V6, v).unwrap())
}

fn any_addr() -> impl Strategy<Value = Address> {
    prop_oneof![v4(), v6()]
}

fn range(family: IpFamily) -> impl Strategy<Value = (Address, Address)> {
    let addr = match family {
        IpFamily::V4 => v4().boxed(),
        IpFamily::V6 => v6().boxed(),
    };
    (addr.clone(), addr).prop_map(|(a, b)| {
        if a.compare(&b).unwrap() == Ordering::Greater {
            (b, a)
        } else {
            (a, b)
        }
    })
}

/// Contiguous segments over `[0, 2^32)` from sorted cut points and region ids
fn partition() -> impl Strategy<Value = Vec<Segment>> {
    prop::collection::vec((1u32.., 0u8..4), 0..40).prop_map(|mut cuts| {
        cuts.sort_by_key(|(c, _)| *c);
        cuts.dedup_by_key(|(c, _)| *c);
        let mut starts = vec![(0u32, 0u8)];
        starts.extend(cuts);
        starts
            .iter()
            .enumerate()
            .map(|(i, &(start, region))| {
                let end = starts
                    .get(i + 1)
                    .map(|(next, _)| next - 1)
                    .unwrap_or(u32::MAX);
                Segment::new(
                    Address::from_u128(IpFamily::V4, start as u128).unwrap(),
                    Address::from_u128(IpFamily::V4, end as u128).unwrap(),
                    format!("R{}|0|0", region),
                )
                .unwrap()
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_text_round_trip(a in any_addr()) {
        prop_assert_eq!(Address::parse(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn prop_compare_matches_numeric_order(a in v6(), b in v6()) {
        prop_assert_eq!(a.compare(&b).unwrap(), a.as_u128().cmp(&b.as_u128()));
        prop_assert_eq!(a.compare(&b).unwrap(), b.compare(&a).unwrap().reverse());
    }

    #[test]
    fn prop_compare_is_transitive(a in v4(), b in v4(), c in v4()) {
        let ab = a.compare(&b).unwrap();
        let bc = b.compare(&c).unwrap();
        if ab != Ordering::Greater && bc != Ordering::Greater {
            prop_assert_ne!(a.compare(&c).unwrap(), Ordering::Greater);
        }
    }

    #[test]
    fn prop_increment_decrement_inverse(a in any_addr()) {
        if !a.is_max() {
            prop_assert_eq!(a.increment().decrement(), a);
            prop_assert_eq!(a.compare(&a.increment()).unwrap(), Ordering::Less);
        }
        if a != a.family().min() {
            prop_assert_eq!(a.decrement().increment(), a);
        }
    }

    #[test]
    fn prop_split_tiles_range(
        (start, end) in range(IpFamily::V4),
        prefix_len in 1usize..=2,
    ) {
        let seg = Segment::new(start, end, "X|Y").unwrap();
        let parts = seg.split(prefix_len).unwrap();
        prop_assert_eq!(parts.first().unwrap().start, start);
        prop_assert_eq!(parts.last().unwrap().end, end);
        for pair in parts.windows(2) {
            prop_assert!(pair[0].is_followed_by(&pair[1]));
        }
        for part in &parts {
            prop_assert_eq!(part.start.prefix_value(prefix_len), part.end.prefix_value(prefix_len));
            prop_assert_eq!(&part.region, "X|Y");
        }
    }

    #[test]
    fn prop_split_v6_stays_in_block((start, end) in range(IpFamily::V6)) {
        // Keep the part count small: stay inside one /8
        let end = if end.prefix_value(1) != start.prefix_value(1) { start.block_max(1) } else { end };
        let parts = Segment::new(start, end, "V6").unwrap().split(2).unwrap();
        prop_assert_eq!(
            parts.len(),
            end.prefix_value(2) - start.prefix_value(2) + 1
        );
    }

    #[test]
    fn prop_merge_is_idempotent(segs in partition()) {
        let once = merge_adjacent(&segs).unwrap();
        prop_assert_eq!(merge_adjacent(&once).unwrap(), once.clone());
        for pair in once.windows(2) {
            prop_assert_ne!(&pair[0].region, &pair[1].region);
        }
    }
}

proptest! {
    // Each case builds a full artifact
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_build_then_search(segs in partition(), query in any::<u32>()) {
        let index = Index::from_bytes(build(&segs, IpFamily::V4, 2).unwrap()).unwrap();
        for seg in &segs {
            prop_assert_eq!(index.lookup_addr(&seg.start).unwrap(), seg.region.as_str());
            prop_assert_eq!(index.lookup_addr(&seg.end).unwrap(), seg.region.as_str());
        }
        let addr = Address::from_u128(IpFamily::V4, query as u128).unwrap();
        let owner = segs.iter().find(|s| s.contains(&addr)).unwrap();
        prop_assert_eq!(index.lookup_addr(&addr).unwrap(), owner.region.as_str());
    }
}
