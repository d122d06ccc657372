//! Binary format structures for region index artifacts
//!
//! An artifact is four blocks laid out back to back:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (48 bytes, ArtifactHeader)            │
//! ├──────────────────────────────────────────────┤
//! │ Vector index: 256^prefix_len × VectorEntry   │
//! │   { first: u32, last: u32 } record offsets   │
//! ├──────────────────────────────────────────────┤
//! │ Segment index: segment_count × record        │
//! │   start [u8; W] | end [u8; W]                │
//! │   region_offset u32 | region_length u16      │
//! ├──────────────────────────────────────────────┤
//! │ Region data: concatenated UTF-8 text         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! `W` is 4 for IPv4 and 16 for IPv6. Addresses are stored big-endian so
//! that records compare with plain byte comparison; every integer is
//! little-endian. All block offsets in the header are absolute.
//!
//! A vector entry of `(0, 0)` marks a prefix with no segments; offset 0 is
//! always the header, so no real record can live there.

use crate::address::IpFamily;
use crate::dictionary::RegionRef;
use crate::error::{RegionError, Result};
use std::fmt;
use std::mem::size_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Magic bytes identifying a region index artifact
pub const MAGIC: &[u8; 8] = b"IPREGION";

/// Current format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of [`ArtifactHeader`] in bytes
pub const HEADER_SIZE: usize = 48;

/// Size of one vector index entry in bytes
pub const VECTOR_ENTRY_SIZE: usize = 8;

/// Bytes following the two addresses in a segment record (u32 offset + u16 length)
pub const REGION_PTR_SIZE: usize = 6;

/// Default vector index prefix length in bytes (65536 buckets)
pub const DEFAULT_PREFIX_LEN: u8 = 2;

/// Largest supported vector index prefix length
pub const MAX_PREFIX_LEN: u8 = 2;

/// Artifact file header (48 bytes, 8-byte aligned)
///
/// Fields hold little-endian values when serialized; use
/// [`ArtifactHeader::read`] and [`ArtifactHeader::to_bytes`] rather than
/// casting raw bytes directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ArtifactHeader {
    /// Magic bytes: "IPREGION"
    pub magic: [u8; 8],
    /// Format version
    pub version: u32,
    /// Address family tag: 4 or 6
    pub family: u8,
    /// Vector index prefix length in bytes (1 or 2)
    pub prefix_len: u8,
    /// Reserved (should be 0)
    pub reserved: [u8; 2],
    /// Unix time of the build, 0 when not recorded
    pub build_epoch: u64,
    /// Offset of the vector index block
    pub vector_index_offset: u32,
    /// Offset of the segment index block
    pub segment_index_offset: u32,
    /// Number of records in the segment index
    pub segment_count: u32,
    /// Offset of the region data block
    pub region_data_offset: u32,
    /// Size of the region data block
    pub region_data_size: u32,
    /// Total size of the artifact
    pub total_size: u32,
}

const _: () = {
    assert!(size_of::<ArtifactHeader>() == HEADER_SIZE);
    assert!(size_of::<VectorEntry>() == VECTOR_ENTRY_SIZE);
};

impl ArtifactHeader {
    /// Decode a header from the front of `buffer`
    pub fn read(buffer: &[u8]) -> Result<Self> {
        let (raw, _) = ArtifactHeader::read_from_prefix(buffer).map_err(|_| {
            RegionError::CorruptArtifact(format!(
                "file too small: {} bytes (need at least {})",
                buffer.len(),
                HEADER_SIZE
            ))
        })?;
        Ok(raw.swap_le())
    }

    /// Serialize to exactly [`HEADER_SIZE`] little-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.swap_le().as_bytes().to_vec()
    }

    // Little-endian <-> native is the same byte swap in both directions.
    fn swap_le(mut self) -> Self {
        self.version = u32::from_le(self.version);
        self.build_epoch = u64::from_le(self.build_epoch);
        self.vector_index_offset = u32::from_le(self.vector_index_offset);
        self.segment_index_offset = u32::from_le(self.segment_index_offset);
        self.segment_count = u32::from_le(self.segment_count);
        self.region_data_offset = u32::from_le(self.region_data_offset);
        self.region_data_size = u32::from_le(self.region_data_size);
        self.total_size = u32::from_le(self.total_size);
        self
    }
}

impl fmt::Display for ArtifactHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArtifactHeader {{ magic: {:?}, version: {}, family: {}, prefix_len: {}, segments: {}, size: {} }}",
            std::str::from_utf8(&self.magic).unwrap_or("???"),
            self.version,
            self.family,
            self.prefix_len,
            self.segment_count,
            self.total_size
        )
    }
}

/// One vector index bucket: byte offsets of the first and last record
/// whose start address carries the bucket's prefix
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct VectorEntry {
    /// Offset of the first record in the bucket
    pub first: u32,
    /// Offset of the last record in the bucket (inclusive)
    pub last: u32,
}

impl VectorEntry {
    /// Bucket with no records
    pub const EMPTY: VectorEntry = VectorEntry { first: 0, last: 0 };

    /// True for the empty sentinel
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first == 0 && self.last == 0
    }

    /// Decode the entry stored at `offset`, if it is in bounds
    #[inline]
    pub fn read_at(buffer: &[u8], offset: usize) -> Option<Self> {
        let (raw, _) = VectorEntry::read_from_prefix(buffer.get(offset..)?).ok()?;
        Some(VectorEntry {
            first: u32::from_le(raw.first),
            last: u32::from_le(raw.last),
        })
    }

    /// Append the little-endian encoding to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.first.to_le_bytes());
        out.extend_from_slice(&self.last.to_le_bytes());
    }
}

/// Size of one segment record for `family`
#[inline]
pub const fn record_size(family: IpFamily) -> usize {
    2 * family.width() + REGION_PTR_SIZE
}

/// Number of vector index buckets for a prefix length
#[inline]
pub const fn vector_entries(prefix_len: usize) -> usize {
    1usize << (8 * prefix_len)
}

/// Validate a vector index prefix length
pub fn check_prefix_len(prefix_len: u8) -> Result<usize> {
    if (1..=MAX_PREFIX_LEN).contains(&prefix_len) {
        Ok(prefix_len as usize)
    } else {
        Err(RegionError::UnsupportedPrefixLength(prefix_len))
    }
}

/// A borrowed, decoded segment record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef<'a> {
    /// Big-endian start address bytes
    pub start: &'a [u8],
    /// Big-endian end address bytes
    pub end: &'a [u8],
    /// Offset of the region text inside the region data block
    pub region_offset: u32,
    /// Length of the region text
    pub region_length: u16,
}

impl<'a> RecordRef<'a> {
    /// Decode a record of address width `width` from the front of `bytes`
    #[inline]
    pub fn decode(bytes: &'a [u8], width: usize) -> Option<Self> {
        let record = bytes.get(..2 * width + REGION_PTR_SIZE)?;
        let (start, rest) = record.split_at(width);
        let (end, ptr) = rest.split_at(width);
        Some(RecordRef {
            start,
            end,
            region_offset: u32::from_le_bytes([ptr[0], ptr[1], ptr[2], ptr[3]]),
            region_length: u16::from_le_bytes([ptr[4], ptr[5]]),
        })
    }
}

/// Append one segment record to `out`
pub fn encode_record(out: &mut Vec<u8>, start: &[u8], end: &[u8], region: RegionRef) {
    debug_assert_eq!(start.len(), end.len());
    out.extend_from_slice(start);
    out.extend_from_slice(end);
    out.extend_from_slice(&region.offset.to_le_bytes());
    out.extend_from_slice(&region.length.to_le_bytes());
}

/// Validated block geometry of an artifact, in native integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Address family of every record
    pub family: IpFamily,
    /// Vector index prefix length in bytes
    pub prefix_len: usize,
    /// Format version from the header
    pub version: u32,
    /// Build time recorded in the header
    pub build_epoch: u64,
    /// Offset of the vector index block
    pub vector_index_offset: usize,
    /// Offset of the segment index block
    pub segment_index_offset: usize,
    /// Number of segment records
    pub segment_count: usize,
    /// Offset of the region data block
    pub region_data_offset: usize,
    /// Size of the region data block
    pub region_data_size: usize,
    /// Total artifact size
    pub total_size: usize,
}

impl Layout {
    /// Compute the geometry for a new artifact
    pub fn compute(
        family: IpFamily,
        prefix_len: u8,
        segment_count: usize,
        region_data_size: usize,
        build_epoch: u64,
    ) -> Result<Self> {
        let prefix_len = check_prefix_len(prefix_len)?;
        let vector_index_offset = HEADER_SIZE;
        let segment_index_offset = vector_index_offset + vector_entries(prefix_len) * VECTOR_ENTRY_SIZE;
        let region_data_offset = segment_count
            .checked_mul(record_size(family))
            .and_then(|n| n.checked_add(segment_index_offset));
        let total_size = region_data_offset.and_then(|n| n.checked_add(region_data_size));

        match (region_data_offset, total_size) {
            (Some(region_data_offset), Some(total_size)) if total_size <= u32::MAX as usize => {
                Ok(Layout {
                    family,
                    prefix_len,
                    version: FORMAT_VERSION,
                    build_epoch,
                    vector_index_offset,
                    segment_index_offset,
                    segment_count,
                    region_data_offset,
                    region_data_size,
                    total_size,
                })
            }
            _ => Err(RegionError::malformed(format!(
                "{} segments with {} bytes of region text exceed the 4 GiB artifact limit",
                segment_count, region_data_size
            ))),
        }
    }

    /// Parse and validate the header of `buffer` against its actual length
    pub fn validate(buffer: &[u8]) -> Result<Self> {
        let header = ArtifactHeader::read(buffer)?;
        let corrupt = |msg: String| Err(RegionError::CorruptArtifact(msg));

        if &header.magic != MAGIC {
            return corrupt(format!(
                "invalid magic bytes: expected {:?}, found {:?}",
                std::str::from_utf8(MAGIC).unwrap_or("???"),
                String::from_utf8_lossy(&header.magic)
            ));
        }
        if header.version != FORMAT_VERSION {
            return corrupt(format!(
                "unsupported format version: found {}, supported {}",
                header.version, FORMAT_VERSION
            ));
        }
        let family = match IpFamily::from_tag(header.family) {
            Some(f) => f,
            None => return corrupt(format!("unknown address family tag {}", header.family)),
        };
        let prefix_len = check_prefix_len(header.prefix_len)
            .map_err(|_| RegionError::CorruptArtifact(format!("invalid prefix length {}", header.prefix_len)))?;

        let expected = Layout::compute(
            family,
            prefix_len as u8,
            header.segment_count as usize,
            header.region_data_size as usize,
            header.build_epoch,
        )
        .map_err(|e| RegionError::CorruptArtifact(e.to_string()))?;

        let checks = [
            ("vector index offset", header.vector_index_offset as usize, expected.vector_index_offset),
            ("segment index offset", header.segment_index_offset as usize, expected.segment_index_offset),
            ("region data offset", header.region_data_offset as usize, expected.region_data_offset),
            ("total size", header.total_size as usize, expected.total_size),
            ("file length", buffer.len(), expected.total_size),
        ];
        for (what, found, want) in checks {
            if found != want {
                return corrupt(format!("{} is {}, expected {}", what, found, want));
            }
        }

        Ok(expected)
    }

    /// Header describing this layout
    pub fn to_header(&self) -> ArtifactHeader {
        ArtifactHeader {
            magic: *MAGIC,
            version: self.version,
            family: self.family.tag(),
            prefix_len: self.prefix_len as u8,
            reserved: [0; 2],
            build_epoch: self.build_epoch,
            vector_index_offset: self.vector_index_offset as u32,
            segment_index_offset: self.segment_index_offset as u32,
            segment_count: self.segment_count as u32,
            region_data_offset: self.region_data_offset as u32,
            region_data_size: self.region_data_size as u32,
            total_size: self.total_size as u32,
        }
    }

    /// Size of one segment record
    #[inline]
    pub fn record_size(&self) -> usize {
        record_size(self.family)
    }

    /// Number of vector index buckets
    #[inline]
    pub fn vector_entries(&self) -> usize {
        vector_entries(self.prefix_len)
    }

    /// Absolute offset of record `index`
    #[inline]
    pub fn record_offset(&self, index: usize) -> usize {
        self.segment_index_offset + index * self.record_size()
    }

    /// Record index for an absolute offset, if it lies on a record boundary
    pub fn record_index(&self, offset: usize) -> Option<usize> {
        let rel = offset.checked_sub(self.segment_index_offset)?;
        if rel % self.record_size() != 0 {
            return None;
        }
        let index = rel / self.record_size();
        (index < self.segment_count).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layout() -> Layout {
        Layout::compute(IpFamily::V4, 2, 3, 10, 1_700_000_000).unwrap()
    }

    fn sample_buffer(layout: &Layout) -> Vec<u8> {
        let mut buf = layout.to_header().to_bytes();
        buf.resize(layout.total_size, 0);
        buf
    }

    #[test]
    fn test_struct_sizes() {
        assert_eq!(std::mem::size_of::<ArtifactHeader>(), 48);
        assert_eq!(std::mem::size_of::<VectorEntry>(), 8);
        assert_eq!(record_size(IpFamily::V4), 14);
        assert_eq!(record_size(IpFamily::V6), 38);
    }

    #[test]
    fn test_layout_geometry() {
        let layout = sample_layout();
        assert_eq!(layout.vector_index_offset, 48);
        assert_eq!(layout.segment_index_offset, 48 + 65536 * 8);
        assert_eq!(layout.region_data_offset, layout.segment_index_offset + 3 * 14);
        assert_eq!(layout.total_size, layout.region_data_offset + 10);
        assert_eq!(layout.record_index(layout.record_offset(2)), Some(2));
        assert_eq!(layout.record_index(layout.record_offset(3)), None);
        assert_eq!(layout.record_index(layout.record_offset(1) + 1), None);
        assert_eq!(layout.record_index(0), None);
    }

    #[test]
    fn test_header_round_trip() {
        let layout = sample_layout();
        let bytes = layout.to_header().to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..8], MAGIC);
        // Little-endian on disk regardless of host
        assert_eq!(&bytes[8..12], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(ArtifactHeader::read(&bytes).unwrap(), layout.to_header());
    }

    #[test]
    fn test_validate_accepts_consistent_buffer() {
        let layout = sample_layout();
        assert_eq!(Layout::validate(&sample_buffer(&layout)).unwrap(), layout);
    }

    #[test]
    fn test_validate_rejects_corruption() {
        let layout = sample_layout();
        let good = sample_buffer(&layout);

        let mut truncated = good.clone();
        truncated.pop();
        assert!(matches!(Layout::validate(&truncated), Err(RegionError::CorruptArtifact(_))));

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(matches!(Layout::validate(&bad_magic), Err(RegionError::CorruptArtifact(_))));

        let mut bad_family = good.clone();
        bad_family[12] = 5;
        assert!(matches!(Layout::validate(&bad_family), Err(RegionError::CorruptArtifact(_))));

        let mut bad_prefix = good.clone();
        bad_prefix[13] = 3;
        assert!(matches!(Layout::validate(&bad_prefix), Err(RegionError::CorruptArtifact(_))));

        let mut bad_count = good.clone();
        bad_count[32..36].copy_from_slice(&4u32.to_le_bytes());
        assert!(matches!(Layout::validate(&bad_count), Err(RegionError::CorruptArtifact(_))));

        assert!(matches!(Layout::validate(&good[..20]), Err(RegionError::CorruptArtifact(_))));
        assert!(matches!(Layout::validate(&[]), Err(RegionError::CorruptArtifact(_))));
    }

    #[test]
    fn test_vector_entry_encoding() {
        let entry = VectorEntry { first: 0x0102_0304, last: 0x0a0b_0c0d };
        let mut buf = vec![0xee; 3];
        entry.write_to(&mut buf);
        assert_eq!(&buf[3..7], &[4, 3, 2, 1]);
        assert_eq!(VectorEntry::read_at(&buf, 3), Some(entry));
        assert_eq!(VectorEntry::read_at(&buf, 4), None);
        assert!(VectorEntry::EMPTY.is_empty());
    }

    #[test]
    fn test_record_encoding() {
        let mut buf = Vec::new();
        encode_record(&mut buf, &[1, 1, 0, 0], &[1, 3, 3, 24], RegionRef { offset: 7, length: 14 });
        assert_eq!(buf.len(), record_size(IpFamily::V4));
        let rec = RecordRef::decode(&buf, 4).unwrap();
        assert_eq!(rec.start, &[1, 1, 0, 0]);
        assert_eq!(rec.end, &[1, 3, 3, 24]);
        assert_eq!(rec.region_offset, 7);
        assert_eq!(rec.region_length, 14);
        assert!(RecordRef::decode(&buf[1..], 4).is_none());
    }

    #[test]
    fn test_prefix_len_bounds() {
        assert_eq!(check_prefix_len(1).unwrap(), 1);
        assert_eq!(check_prefix_len(2).unwrap(), 2);
        assert_eq!(check_prefix_len(0), Err(RegionError::UnsupportedPrefixLength(0)));
        assert_eq!(check_prefix_len(3), Err(RegionError::UnsupportedPrefixLength(3)));
    }
}
