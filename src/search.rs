//! Segment index search
//!
//! Lookups narrow the search with the vector index: the first `prefix_len`
//! bytes of the query select a bucket holding the offsets of the first and
//! last record whose start address shares that prefix. Because the builder
//! splits segments at super-block boundaries, the covering record (if any)
//! is always inside that bucket, and a binary search over it finishes in
//! O(log records-per-bucket) comparisons.
//!
//! An empty bucket, or a bucket that holds no covering record, falls back to
//! a binary search over the whole segment index. That keeps lookups correct
//! for artifacts whose records were not split along the vector prefix.

use crate::address::{compare_bytes, prefix_value};
use crate::error::{RegionError, Result};
use crate::format::{Layout, RecordRef, VectorEntry, VECTOR_ENTRY_SIZE};
use std::cmp::Ordering;

/// Borrowed view over a validated artifact
#[derive(Debug, Clone, Copy)]
pub struct SearchView<'a> {
    data: &'a [u8],
    layout: &'a Layout,
}

impl<'a> SearchView<'a> {
    /// Create a view. `layout` must have been validated against `data`.
    pub fn new(data: &'a [u8], layout: &'a Layout) -> Self {
        Self { data, layout }
    }

    /// Find the region text for a big-endian address key of the artifact's width.
    ///
    /// Returns `Ok(None)` when no segment covers the key.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<&'a str>> {
        match self.find(key)? {
            Some(index) => {
                let record = self.record(index)?;
                self.region(&record).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Index of the record covering `key`, if any
    pub fn find(&self, key: &[u8]) -> Result<Option<usize>> {
        if key.len() != self.layout.family.width() {
            return Err(RegionError::InvalidAddressFormat(format!(
                "search key is {} bytes, artifact stores {}-byte addresses",
                key.len(),
                self.layout.family.width()
            )));
        }
        if self.layout.segment_count == 0 {
            return Ok(None);
        }

        let all = (0, self.layout.segment_count - 1);
        match self.bucket(key)? {
            Some(range) => match self.binary_search(key, range.0, range.1)? {
                Some(index) => Ok(Some(index)),
                None if range != all => self.binary_search(key, all.0, all.1),
                None => Ok(None),
            },
            None => self.binary_search(key, all.0, all.1),
        }
    }

    /// Vector index entry for a prefix value
    pub fn vector_entry(&self, prefix: usize) -> Result<VectorEntry> {
        let offset = self.layout.vector_index_offset + prefix * VECTOR_ENTRY_SIZE;
        VectorEntry::read_at(self.data, offset).ok_or_else(|| {
            RegionError::CorruptArtifact(format!("vector entry {} out of bounds", prefix))
        })
    }

    /// Inclusive record index range of the bucket `key` falls in, or `None` if empty
    fn bucket(&self, key: &[u8]) -> Result<Option<(usize, usize)>> {
        let prefix = prefix_value(key, self.layout.prefix_len);
        let entry = self.vector_entry(prefix)?;
        if entry.is_empty() {
            return Ok(None);
        }

        let first = self.layout.record_index(entry.first as usize);
        let last = self.layout.record_index(entry.last as usize);
        match (first, last) {
            (Some(first), Some(last)) if first <= last => Ok(Some((first, last))),
            _ => Err(RegionError::CorruptArtifact(format!(
                "vector entry {} points outside the segment index ({}..{})",
                prefix, entry.first, entry.last
            ))),
        }
    }

    fn binary_search(&self, key: &[u8], first: usize, last: usize) -> Result<Option<usize>> {
        let mut lo = first;
        let mut hi = last + 1;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let record = self.record(mid)?;
            if compare_bytes(key, record.start) == Ordering::Less {
                hi = mid;
            } else if compare_bytes(key, record.end) == Ordering::Greater {
                lo = mid + 1;
            } else {
                return Ok(Some(mid));
            }
        }
        Ok(None)
    }

    /// Decode record `index`
    #[inline]
    pub fn record(&self, index: usize) -> Result<RecordRef<'a>> {
        if index >= self.layout.segment_count {
            return Err(RegionError::CorruptArtifact(format!(
                "record {} exceeds segment count {}",
                index, self.layout.segment_count
            )));
        }
        let offset = self.layout.record_offset(index);
        self.data
            .get(offset..)
            .and_then(|bytes| RecordRef::decode(bytes, self.layout.family.width()))
            .ok_or_else(|| RegionError::CorruptArtifact(format!("record {} is truncated", index)))
    }

    /// Region text a record points at
    pub fn region(&self, record: &RecordRef<'_>) -> Result<&'a str> {
        let start = record.region_offset as usize;
        let end = start + record.region_length as usize;
        if end > self.layout.region_data_size {
            return Err(RegionError::CorruptArtifact(format!(
                "region slice {}..{} exceeds region data size {}",
                start, end, self.layout.region_data_size
            )));
        }
        let base = self.layout.region_data_offset;
        let bytes = &self.data[base + start..base + end];
        std::str::from_utf8(bytes).map_err(|e| {
            RegionError::CorruptArtifact(format!(
                "region at offset {} is not valid UTF-8: {}",
                start, e
            ))
        })
    }
}
