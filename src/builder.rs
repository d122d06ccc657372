//! Region index builder
//!
//! Turns an ordered, contiguous list of segments into artifact bytes:
//!
//! 1. validate family and contiguity
//! 2. merge neighbours with identical region text
//! 3. split at super-block boundaries (parallel, order preserving)
//! 4. intern region text
//! 5. emit the segment index
//! 6. build the vector index in one pass over the sorted records
//! 7. serialize header and blocks
//! 8. self-check every indexed start and end address against the bytes
//!
//! Any failure aborts the whole build and no bytes are returned.

use crate::address::IpFamily;
use crate::dictionary::{RegionDictionary, RegionRef};
use crate::error::{RegionError, Result};
use crate::format::{check_prefix_len, encode_record, Layout, VectorEntry, DEFAULT_PREFIX_LEN};
use crate::search::SearchView;
use crate::segment::{covers_family, merge_adjacent, Segment};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

/// Pipeline stage reported to a [`BuildObserver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Input checked; count is the number of source segments
    Validate,
    /// Neighbours merged; count is the merged segment count
    Merge,
    /// Super-block split done; count is the number of records to index
    Split,
    /// Region text interned; count is the number of distinct regions
    Intern,
    /// Segment index emitted; count is the block size in bytes
    Emit,
    /// Vector index built; count is the number of non-empty buckets
    VectorIndex,
    /// Artifact serialized; count is the artifact size in bytes
    Serialize,
    /// Self-check passed; count is the number of addresses looked up
    SelfCheck,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Validate => "validate",
            BuildStage::Merge => "merge",
            BuildStage::Split => "split",
            BuildStage::Intern => "intern",
            BuildStage::Emit => "emit",
            BuildStage::VectorIndex => "vector-index",
            BuildStage::Serialize => "serialize",
            BuildStage::SelfCheck => "self-check",
        };
        f.pad(name)
    }
}

/// Progress hook for long builds. The library itself never prints.
pub trait BuildObserver {
    /// Called once after each pipeline stage completes
    fn on_stage(&self, stage: BuildStage, count: usize) {
        let _ = (stage, count);
    }
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BuildObserver for NoopObserver {}

/// Statistics about a finished build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Segments handed to the builder
    pub source_segments: usize,
    /// Segments left after merging equal neighbours
    pub merged_segments: usize,
    /// Records in the segment index after splitting
    pub indexed_segments: usize,
    /// Distinct region strings
    pub unique_regions: usize,
    /// Size of the region data block
    pub region_bytes: usize,
    /// Total artifact size
    pub artifact_size: usize,
    /// Input spans the family from the all-zero to the all-ones address
    pub covers_family: bool,
}

/// Artifact bytes plus the statistics gathered while producing them
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Serialized artifact
    pub bytes: Vec<u8>,
    /// Build statistics
    pub stats: BuildStats,
}

/// Region index builder
pub struct IndexBuilder {
    family: IpFamily,
    prefix_len: u8,
    build_epoch: u64,
    segments: Vec<Segment>,
    observer: Box<dyn BuildObserver>,
}

impl IndexBuilder {
    /// Create a builder for one address family with the default prefix length
    pub fn new(family: IpFamily) -> Self {
        Self {
            family,
            prefix_len: DEFAULT_PREFIX_LEN,
            build_epoch: 0,
            segments: Vec::new(),
            observer: Box::new(NoopObserver),
        }
    }

    /// Set the vector index prefix length in bytes (1 or 2)
    ///
    /// Also controls where segments are split. Checked by [`build`](Self::build).
    pub fn with_prefix_len(mut self, prefix_len: u8) -> Self {
        self.prefix_len = prefix_len;
        self
    }

    /// Record a build time in the header
    ///
    /// Defaults to 0 so that identical input always yields identical bytes.
    pub fn with_build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = epoch;
        self
    }

    /// Receive a callback after each pipeline stage
    pub fn with_observer(mut self, observer: impl BuildObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Append a segment. Segments must be added in ascending order.
    pub fn add_segment(&mut self, segment: Segment) -> Result<()> {
        segment.start.ensure_family(self.family)?;
        segment.validate()?;
        self.segments.push(segment);
        Ok(())
    }

    /// Parse a `startIP|endIP|region` line and append it
    pub fn add_record(&mut self, line: &str) -> Result<()> {
        let segment = Segment::parse(line)?;
        self.add_segment(segment)
    }

    /// Address family this builder accepts
    pub fn family(&self) -> IpFamily {
        self.family
    }

    /// Number of segments added so far
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True if no segments have been added
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Run the full pipeline and return the artifact
    pub fn build(&self) -> Result<BuildOutput> {
        let prefix_len = check_prefix_len(self.prefix_len)?;
        let observer = self.observer.as_ref();

        for segment in &self.segments {
            segment.start.ensure_family(self.family)?;
        }
        // merge_adjacent rejects gaps and overlaps before touching anything
        let merged = merge_adjacent(&self.segments)?;
        observer.on_stage(BuildStage::Validate, self.segments.len());
        observer.on_stage(BuildStage::Merge, merged.len());

        let split: Vec<Segment> = merged
            .par_iter()
            .flat_map_iter(|segment| segment.split_blocks(prefix_len))
            .collect();
        observer.on_stage(BuildStage::Split, split.len());

        let mut dictionary = RegionDictionary::new();
        let regions: Vec<RegionRef> = split
            .iter()
            .map(|segment| dictionary.intern(&segment.region))
            .collect::<Result<_>>()?;
        let unique_regions = dictionary.len();
        observer.on_stage(BuildStage::Intern, unique_regions);

        let layout = Layout::compute(
            self.family,
            self.prefix_len,
            split.len(),
            dictionary.data_len(),
            self.build_epoch,
        )?;

        let mut records = Vec::with_capacity(split.len() * layout.record_size());
        for (segment, region) in split.iter().zip(&regions) {
            encode_record(
                &mut records,
                segment.start.as_bytes(),
                segment.end.as_bytes(),
                *region,
            );
        }
        observer.on_stage(BuildStage::Emit, records.len());

        let vector = build_vector_index(&split, &layout);
        observer.on_stage(
            BuildStage::VectorIndex,
            vector.iter().filter(|e| !e.is_empty()).count(),
        );

        let region_bytes = dictionary.data_len();
        let mut bytes = Vec::with_capacity(layout.total_size);
        bytes.extend_from_slice(&layout.to_header().to_bytes());
        for entry in &vector {
            entry.write_to(&mut bytes);
        }
        bytes.extend_from_slice(&records);
        bytes.extend_from_slice(&dictionary.into_bytes());
        if bytes.len() != layout.total_size {
            return Err(RegionError::CorruptArtifact(format!(
                "serialized {} bytes, layout expects {}",
                bytes.len(),
                layout.total_size
            )));
        }
        observer.on_stage(BuildStage::Serialize, bytes.len());

        self_check(&bytes, &split)?;
        observer.on_stage(BuildStage::SelfCheck, split.len() * 2);

        let stats = BuildStats {
            source_segments: self.segments.len(),
            merged_segments: merged.len(),
            indexed_segments: split.len(),
            unique_regions,
            region_bytes,
            artifact_size: bytes.len(),
            covers_family: covers_family(&merged),
        };
        Ok(BuildOutput { bytes, stats })
    }
}

/// Build an artifact from ordered, contiguous segments of one family
pub fn build(segments: &[Segment], family: IpFamily, prefix_len: u8) -> Result<Vec<u8>> {
    let mut builder = IndexBuilder::new(family).with_prefix_len(prefix_len);
    for segment in segments {
        builder.add_segment(segment.clone())?;
    }
    Ok(builder.build()?.bytes)
}

fn build_vector_index(segments: &[Segment], layout: &Layout) -> Vec<VectorEntry> {
    let mut vector = vec![VectorEntry::EMPTY; layout.vector_entries()];
    for (i, segment) in segments.iter().enumerate() {
        let offset = layout.record_offset(i) as u32;
        let entry = &mut vector[segment.start.prefix_value(layout.prefix_len)];
        if entry.is_empty() {
            entry.first = offset;
        }
        entry.last = offset;
    }
    vector
}

/// Look up both ends of every indexed segment in the finished bytes
fn self_check(bytes: &[u8], segments: &[Segment]) -> Result<()> {
    let layout = Layout::validate(bytes)?;
    let view = SearchView::new(bytes, &layout);

    segments.par_iter().enumerate().try_for_each(|(i, segment)| {
        for addr in [&segment.start, &segment.end] {
            match view.lookup(addr.as_bytes())? {
                Some(region) if region == segment.region => {}
                found => {
                    return Err(RegionError::CorruptArtifact(format!(
                        "self-check failed for record {} at {}: expected '{}', got {:?}",
                        i, addr, segment.region, found
                    )))
                }
            }
        }
        Ok(())
    })
}
