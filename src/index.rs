//! Opened region index artifacts
//!
//! [`Index`] owns the artifact bytes, either memory-mapped or held in a
//! `Vec`, and answers lookups against them without copying. The header is
//! validated once on open; the struct is immutable afterwards, so a single
//! `Index` can be shared across threads and queried concurrently.
//!
//! # Example
//!
//! ```no_run
//! use ipregion::Index;
//!
//! let index = Index::open("ip2region.xdb")?;
//! println!("{}", index.lookup("1.2.3.4")?);
//! # Ok::<(), ipregion::RegionError>(())
//! ```

use crate::address::{compare_bytes, prefix_value, Address, IpFamily};
use crate::error::{RegionError, Result};
use crate::format::{Layout, RecordRef, VectorEntry};
use crate::search::SearchView;
use crate::segment::Segment;
use memmap2::Mmap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

/// Storage for artifact bytes - either owned or memory-mapped
enum Storage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mmap(m) => &m[..],
        }
    }
}

/// A read-only, validated region index
pub struct Index {
    storage: Storage,
    layout: Layout,
}

impl Index {
    /// Open an artifact using memory mapping.
    ///
    /// Only the pages touched by lookups are read from disk, and the OS
    /// shares them between processes opening the same file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| RegionError::Io(format!("failed to open {}: {}", path.display(), e)))?;

        // SAFETY: the mapping is read-only; artifacts are written once and
        // then made read-only by the builder CLI.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| RegionError::Io(format!("failed to mmap {}: {}", path.display(), e)))?;

        Self::from_storage(Storage::Mmap(mmap))
    }

    /// Read a whole artifact into memory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| RegionError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_bytes(bytes)
    }

    /// Use artifact bytes already in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_storage(Storage::Owned(bytes))
    }

    fn from_storage(storage: Storage) -> Result<Self> {
        let layout = Layout::validate(storage.as_slice())?;
        Ok(Self { storage, layout })
    }

    #[inline]
    fn view(&self) -> SearchView<'_> {
        SearchView::new(self.storage.as_slice(), &self.layout)
    }

    /// Look up the region for an address given as text
    pub fn lookup(&self, query: &str) -> Result<&str> {
        let addr = Address::parse(query)?;
        self.lookup_addr(&addr)
    }

    /// Look up the region for a parsed address.
    ///
    /// IPv4-mapped IPv6 queries are accepted by IPv4 artifacts.
    pub fn lookup_addr(&self, addr: &Address) -> Result<&str> {
        let addr = addr.normalize_to(self.layout.family)?;
        self.view()
            .lookup(addr.as_bytes())?
            .ok_or_else(|| RegionError::AddressNotCovered(addr.to_string()))
    }

    /// Look up the region for a standard library address
    pub fn lookup_ip(&self, ip: IpAddr) -> Result<&str> {
        self.lookup_addr(&Address::from(ip))
    }

    /// Address family of every segment
    pub fn family(&self) -> IpFamily {
        self.layout.family
    }

    /// Vector index prefix length in bytes
    pub fn prefix_len(&self) -> usize {
        self.layout.prefix_len
    }

    /// Number of records in the segment index
    pub fn segment_count(&self) -> usize {
        self.layout.segment_count
    }

    /// Size of the region data block
    pub fn region_data_len(&self) -> usize {
        self.layout.region_data_size
    }

    /// Unix time recorded at build, 0 if none was set
    pub fn build_epoch(&self) -> u64 {
        self.layout.build_epoch
    }

    /// Artifact format version
    pub fn version(&self) -> u32 {
        self.layout.version
    }

    /// Total artifact size in bytes
    pub fn size(&self) -> usize {
        self.layout.total_size
    }

    /// Validated block geometry
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// True if the artifact is memory-mapped rather than held in memory
    pub fn is_mmap(&self) -> bool {
        matches!(self.storage, Storage::Mmap(_))
    }

    /// Raw artifact bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Iterate every stored segment in ascending order
    pub fn segments(&self) -> Segments<'_> {
        Segments {
            view: self.view(),
            next: 0,
            count: self.layout.segment_count,
        }
    }

    /// Walk every record and vector entry, checking the artifact's internal consistency.
    ///
    /// Unlike [`Index::open`], which only checks the header and block
    /// geometry, this touches every byte of the vector and segment indexes.
    pub fn verify(&self) -> VerifyReport {
        let layout = &self.layout;
        let view = self.view();
        let mut report = VerifyReport::new(layout);
        let mut expected = vec![VectorEntry::EMPTY; layout.vector_entries()];
        let mut regions = FxHashSet::default();
        let mut prev: Option<RecordRef<'_>> = None;

        for i in 0..layout.segment_count {
            let record = match view.record(i) {
                Ok(r) => r,
                Err(e) => {
                    report.error(e.to_string());
                    break;
                }
            };

            if compare_bytes(record.start, record.end) == Ordering::Greater {
                report.error(format!("record {}: start is greater than end", i));
            }
            let prefix = prefix_value(record.start, layout.prefix_len);
            if prefix_value(record.end, layout.prefix_len) != prefix {
                report.error(format!("record {}: crosses a super-block boundary", i));
            }
            let offset = layout.record_offset(i) as u32;
            let entry = &mut expected[prefix];
            if entry.is_empty() {
                entry.first = offset;
            }
            entry.last = offset;

            match view.region(&record) {
                Ok(_) => {
                    regions.insert((record.region_offset, record.region_length));
                }
                Err(e) => report.error(format!("record {}: {}", i, e)),
            }

            if let Some(prev) = prev {
                if compare_bytes(record.start, prev.end) != Ordering::Greater {
                    report.error(format!("record {}: overlaps or precedes record {}", i, i - 1));
                } else if !follows(prev.end, record.start) {
                    report.stats.contiguous = false;
                    report.warning(format!("gap between record {} and record {}", i - 1, i));
                }
            }
            prev = Some(record);
        }

        for (prefix, want) in expected.iter().enumerate() {
            match view.vector_entry(prefix) {
                Ok(found) if found == *want => {}
                Ok(found) => report.error(format!(
                    "vector entry {:#x} is ({}, {}), records say ({}, {})",
                    prefix, found.first, found.last, want.first, want.last
                )),
                Err(e) => report.error(e.to_string()),
            }
            if !want.is_empty() {
                report.stats.buckets_used += 1;
            }
        }

        report.stats.unique_regions = regions.len();
        report.stats.covers_family = report.stats.contiguous
            && layout.segment_count > 0
            && self.covers_endpoints();
        report
    }

    fn covers_endpoints(&self) -> bool {
        let view = self.view();
        let family = self.layout.family;
        match (view.record(0), view.record(self.layout.segment_count - 1)) {
            (Ok(first), Ok(last)) => {
                first.start == family.min().as_bytes() && last.end == family.max().as_bytes()
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("family", &self.layout.family)
            .field("prefix_len", &self.layout.prefix_len)
            .field("segment_count", &self.layout.segment_count)
            .field("size", &self.layout.total_size)
            .field("mmap", &self.is_mmap())
            .finish()
    }
}

fn follows(prev_end: &[u8], start: &[u8]) -> bool {
    match (Address::from_bytes(prev_end), Address::from_bytes(start)) {
        (Ok(end), Ok(start)) => !end.is_max() && end.increment() == start,
        _ => false,
    }
}

/// Iterator over the segments stored in an [`Index`]
pub struct Segments<'a> {
    view: SearchView<'a>,
    next: usize,
    count: usize,
}

impl Segments<'_> {
    fn decode(&self, index: usize) -> Result<Segment> {
        let record = self.view.record(index)?;
        let start = Address::from_bytes(record.start)?;
        let end = Address::from_bytes(record.end)?;
        let region = self.view.region(&record)?;
        Segment::new(start, end, region)
            .map_err(|e| RegionError::CorruptArtifact(format!("record {}: {}", index, e)))
    }
}

impl Iterator for Segments<'_> {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.decode(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Segments<'_> {}

/// Errors listed individually before the report starts counting instead
const MAX_REPORTED_ERRORS: usize = 100;

/// Findings of [`Index::verify`]
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Problems that make lookups return wrong answers
    pub errors: Vec<String>,
    /// Errors beyond the first hundred, counted but not listed
    pub suppressed_errors: usize,
    /// Findings that do not affect lookup correctness
    pub warnings: Vec<String>,
    /// Artifact statistics gathered during the walk
    pub stats: IndexStats,
}

/// Statistics gathered while verifying an artifact
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// "IPv4" or "IPv6"
    pub family: &'static str,
    /// Format version
    pub version: u32,
    /// Vector index prefix length in bytes
    pub prefix_len: usize,
    /// Unix time of the build
    pub build_epoch: u64,
    /// Records in the segment index
    pub segment_count: usize,
    /// Non-empty vector index buckets
    pub buckets_used: usize,
    /// Distinct region slices referenced by records
    pub unique_regions: usize,
    /// Size of the region data block
    pub region_bytes: usize,
    /// Total artifact size
    pub file_size: usize,
    /// No gaps between consecutive records
    pub contiguous: bool,
    /// Records span the family from the all-zero to the all-ones address
    pub covers_family: bool,
}

impl VerifyReport {
    fn new(layout: &Layout) -> Self {
        Self {
            errors: Vec::new(),
            suppressed_errors: 0,
            warnings: Vec::new(),
            stats: IndexStats {
                family: layout.family.name(),
                version: layout.version,
                prefix_len: layout.prefix_len,
                build_epoch: layout.build_epoch,
                segment_count: layout.segment_count,
                buckets_used: 0,
                unique_regions: 0,
                region_bytes: layout.region_data_size,
                file_size: layout.total_size,
                contiguous: true,
                covers_family: false,
            },
        }
    }

    /// True if no errors were found
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(msg.into());
        } else {
            self.suppressed_errors += 1;
        }
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;

    const V4_SOURCE: &[&str] = &[
        "0.0.0.0|1.1.255.255|ZZ|0|0|0",
        "1.2.0.0|1.3.3.24|CN|GD|SZ|ISP_A",
        "1.3.3.25|255.255.255.255|US|0|0|0",
    ];

    fn v4_index() -> Index {
        let segs: Vec<Segment> = V4_SOURCE.iter().map(|l| Segment::parse(l).unwrap()).collect();
        Index::from_bytes(build(&segs, IpFamily::V4, 2).unwrap()).unwrap()
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Index>();
    }

    #[test]
    fn test_lookup_and_accessors() {
        let index = v4_index();
        assert_eq!(index.family(), IpFamily::V4);
        assert_eq!(index.prefix_len(), 2);
        assert_eq!(index.version(), crate::format::FORMAT_VERSION);
        assert_eq!(index.build_epoch(), 0);
        assert!(!index.is_mmap());

        assert_eq!(index.lookup("1.2.0.0").unwrap(), "CN|GD|SZ|ISP_A");
        assert_eq!(index.lookup("1.3.3.25").unwrap(), "US|0|0|0");
        assert_eq!(index.lookup("0.0.0.1").unwrap(), "ZZ|0|0|0");
        assert_eq!(
            index.lookup("::ffff:1.2.3.4").unwrap(),
            "CN|GD|SZ|ISP_A"
        );
        assert_eq!(
            index.lookup_ip("255.255.255.255".parse().unwrap()).unwrap(),
            "US|0|0|0"
        );
    }

    #[test]
    fn test_lookup_errors() {
        let index = v4_index();
        assert!(matches!(
            index.lookup("1.2.3"),
            Err(RegionError::InvalidAddressFormat(_))
        ));
        assert_eq!(
            index.lookup("2001::1").unwrap_err(),
            RegionError::FamilyMismatch {
                expected: "IPv4",
                found: "IPv6"
            }
        );
    }

    #[test]
    fn test_segments_round_trip() {
        let index = v4_index();
        let segs: Vec<Segment> = index.segments().collect::<Result<_>>().unwrap();
        assert_eq!(segs.len(), index.segment_count());
        let merged = crate::segment::merge_adjacent(&segs).unwrap();
        let lines: Vec<String> = merged.iter().map(|s| s.to_string()).collect();
        assert_eq!(lines, V4_SOURCE);
    }

    #[test]
    fn test_verify_clean_artifact() {
        let index = v4_index();
        let report = index.verify();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert!(report.stats.contiguous);
        assert!(report.stats.covers_family);
        assert_eq!(report.stats.unique_regions, 3);
        assert_eq!(report.stats.buckets_used, 65536);
    }

    #[test]
    fn test_verify_detects_tampering() {
        let index = v4_index();
        let mut bytes = index.as_bytes().to_vec();
        let layout = *index.layout();

        // Point bucket 0x0102 at the wrong record
        let off = layout.vector_index_offset + 0x0102 * crate::format::VECTOR_ENTRY_SIZE;
        let bogus = layout.record_offset(0) as u32;
        bytes[off..off + 4].copy_from_slice(&bogus.to_le_bytes());

        let tampered = Index::from_bytes(bytes).unwrap();
        let report = tampered.verify();
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("vector entry 0x102")));
    }

    #[test]
    fn test_open_rejects_truncated_bytes() {
        let index = v4_index();
        let bytes = index.as_bytes();
        let truncated = bytes[..bytes.len() - 1].to_vec();
        assert!(matches!(
            Index::from_bytes(truncated),
            Err(RegionError::CorruptArtifact(_))
        ));
        assert!(matches!(
            Index::from_bytes(Vec::new()),
            Err(RegionError::CorruptArtifact(_))
        ));
    }
}
