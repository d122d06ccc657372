//! Segment model
//!
//! A [`Segment`] is an inclusive address range plus the region text that
//! applies to every address in it. Source records look like
//!
//! ```text
//! 1.1.0.0|1.3.3.24|CN|GD|SZ|ISP_A
//! ```
//!
//! where everything after the second delimiter is the region text.
//!
//! A sequence of segments describing one index must be sorted, non-overlapping
//! and contiguous (`end[i] + 1 == start[i + 1]`); [`check_contiguous`] enforces
//! that and [`merge_adjacent`] collapses runs that share a region.

use crate::address::{compare_bytes, Address, IpFamily};
use crate::error::{RegionError, Result};
use crate::format::check_prefix_len;
use std::cmp::Ordering;
use std::fmt;

/// Field delimiter of source records and region text
pub const FIELD_DELIMITER: char = '|';

/// Minimum number of fields in a source record (start, end, region)
pub const MIN_FIELDS: usize = 3;

/// Longest region text that fits the artifact's 16-bit length field
pub const MAX_REGION_LEN: usize = u16::MAX as usize;

/// An inclusive range of addresses sharing one region record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// First address of the range
    pub start: Address,
    /// Last address of the range (inclusive)
    pub end: Address,
    /// Region text, fields joined with `|`
    pub region: String,
}

impl Segment {
    /// Create a segment, checking family agreement, ordering and region size
    pub fn new(start: Address, end: Address, region: impl Into<String>) -> Result<Self> {
        let segment = Segment {
            start,
            end,
            region: region.into(),
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Re-check the invariants of [`Segment::new`].
    ///
    /// The fields are public, so a segment assembled by hand may violate them.
    pub fn validate(&self) -> Result<()> {
        self.end.ensure_family(self.start.family())?;
        if compare_bytes(self.start.as_bytes(), self.end.as_bytes()) == Ordering::Greater {
            return Err(RegionError::malformed(format!(
                "start address {} is greater than end address {}",
                self.start, self.end
            )));
        }
        if self.region.len() > MAX_REGION_LEN {
            return Err(RegionError::malformed(format!(
                "region text is {} bytes (max {})",
                self.region.len(),
                MAX_REGION_LEN
            )));
        }
        Ok(())
    }

    /// Parse a `startIP|endIP|region...` source record
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.splitn(MIN_FIELDS, FIELD_DELIMITER);
        let (start, end, region) = match (fields.next(), fields.next(), fields.next()) {
            (Some(start), Some(end), Some(region)) => (start, end, region),
            _ => {
                return Err(RegionError::malformed(format!(
                    "expected at least {} '{}'-separated fields in '{}'",
                    MIN_FIELDS, FIELD_DELIMITER, line
                )))
            }
        };
        let start = Address::parse(start)?;
        let end = Address::parse(end)?;
        Segment::new(start, end, region)
    }

    /// Address family of both endpoints
    pub fn family(&self) -> IpFamily {
        self.start.family()
    }

    /// True if `addr` lies within `[start, end]`
    pub fn contains(&self, addr: &Address) -> bool {
        addr.family() == self.family()
            && compare_bytes(addr.as_bytes(), self.start.as_bytes()) != Ordering::Less
            && compare_bytes(addr.as_bytes(), self.end.as_bytes()) != Ordering::Greater
    }

    /// True if `next` starts exactly one address after this segment ends
    pub fn is_followed_by(&self, next: &Segment) -> bool {
        next.family() == self.family() && !self.end.is_max() && self.end.increment() == next.start
    }

    /// Split the segment so that no part crosses a super-block boundary.
    ///
    /// A super-block is the set of addresses sharing their first
    /// `prefix_len` bytes. Parts are returned in ascending order, tile the
    /// original range exactly, and all carry the original region text.
    /// `prefix_len` must be 1 or 2, else `UnsupportedPrefixLength`.
    pub fn split(&self, prefix_len: usize) -> Result<Vec<Segment>> {
        let checked = u8::try_from(prefix_len).unwrap_or(u8::MAX);
        check_prefix_len(checked)?;
        Ok(self.split_blocks(prefix_len))
    }

    /// [`Segment::split`] for a prefix length already checked by the caller
    pub(crate) fn split_blocks(&self, prefix_len: usize) -> Vec<Segment> {
        let mut parts = Vec::new();
        let mut cursor = self.start;
        loop {
            let boundary = cursor.block_max(prefix_len);
            if compare_bytes(boundary.as_bytes(), self.end.as_bytes()) != Ordering::Less {
                parts.push(Segment {
                    start: cursor,
                    end: self.end,
                    region: self.region.clone(),
                });
                break;
            }
            parts.push(Segment {
                start: cursor,
                end: boundary,
                region: self.region.clone(),
            });
            cursor = boundary.increment();
        }
        parts
    }

    /// Keep only the listed region fields (0-based), in the listed order
    pub fn with_fields(&self, field_list: &[usize]) -> Result<Segment> {
        let fields: Vec<&str> = self.region.split(FIELD_DELIMITER).collect();
        let mut selected = Vec::with_capacity(field_list.len());
        for &idx in field_list {
            let field = fields.get(idx).ok_or_else(|| {
                RegionError::malformed(format!(
                    "field index {} out of range, region '{}' has {} fields",
                    idx,
                    self.region,
                    fields.len()
                ))
            })?;
            selected.push(*field);
        }
        Ok(Segment {
            start: self.start,
            end: self.end,
            region: selected.join("|"),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.start, FIELD_DELIMITER, self.end, FIELD_DELIMITER, self.region
        )
    }
}

/// Verify that segments share one family, are ascending, and leave no gaps.
pub fn check_contiguous(segments: &[Segment]) -> Result<()> {
    if let Some(first) = segments.first() {
        let family = first.family();
        for seg in segments {
            seg.start.ensure_family(family)?;
            seg.validate()?;
        }
    }
    for pair in segments.windows(2) {
        check_pair(&pair[0], &pair[1])?;
    }
    Ok(())
}

fn check_pair(prev: &Segment, next: &Segment) -> Result<()> {
    if prev.is_followed_by(next) {
        return Ok(());
    }
    let kind = if compare_bytes(next.start.as_bytes(), prev.end.as_bytes()) != Ordering::Greater {
        "overlap"
    } else {
        "gap"
    };
    Err(RegionError::NonContiguousInput(format!(
        "{} between '{}' and '{}'",
        kind, prev, next
    )))
}

/// Coalesce adjacent segments with byte-identical region text.
///
/// Fails with `NonContiguousInput` if the sequence has any gap or overlap,
/// whether or not the neighbours would have merged.
pub fn merge_adjacent(segments: &[Segment]) -> Result<Vec<Segment>> {
    check_contiguous(segments)?;

    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match merged.last_mut() {
            Some(last) if last.region == seg.region => last.end = seg.end,
            _ => merged.push(seg.clone()),
        }
    }
    Ok(merged)
}

/// True if the segments span their family from the all-zero to the all-ones address
pub fn covers_family(segments: &[Segment]) -> bool {
    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => {
            first.start == first.family().min() && last.end == last.family().max()
        }
        _ => false,
    }
}
