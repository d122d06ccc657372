//! ipregion - Disk-Resident IP to Region Index
//!
//! ipregion turns a text list of contiguous IP ranges, each tagged with a
//! `|`-delimited region string, into a compact binary artifact, and answers
//! "which region does this address belong to?" against that artifact in a
//! handful of comparisons. IPv4 and IPv6 are both supported, one family per
//! artifact.
//!
//! # Quick Start
//!
//! ```rust
//! use ipregion::{Index, IndexBuilder, IpFamily, RegionError};
//!
//! let mut builder = IndexBuilder::new(IpFamily::V4);
//! builder.add_record("1.1.0.0|1.3.3.24|CN|GD|SZ|ISP_A")?;
//! builder.add_record("1.3.3.25|255.255.255.255|US|0|0|0")?;
//! let output = builder.build()?;
//!
//! let index = Index::from_bytes(output.bytes)?;
//! assert_eq!(index.lookup("1.2.0.0")?, "CN|GD|SZ|ISP_A");
//! assert_eq!(index.lookup("2.0.0.0")?, "US|0|0|0");
//! assert!(matches!(
//!     index.lookup("0.0.0.1"),
//!     Err(RegionError::AddressNotCovered(_))
//! ));
//! # Ok::<(), RegionError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Artifact                            │
//! ├──────────────────────────────────────┤
//! │  1. Header (offsets of every block)  │
//! │  2. Vector index (prefix → bucket)   │
//! │  3. Segment index (sorted records)   │
//! │  4. Region data (deduplicated text)  │
//! └──────────────────────────────────────┘
//!          ↓ mmap() or read()
//! ┌──────────────────────────────────────┐
//! │  Index (read-only, Send + Sync)      │
//! │  bucket lookup → binary search       │
//! └──────────────────────────────────────┘
//! ```
//!
//! See [`format`] for the exact byte layout.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
/// Artifact construction pipeline
pub mod builder;
/// Region text interning for the region data block
pub mod dictionary;
/// Error types for ipregion operations
pub mod error;
pub mod format;
pub mod index;
pub mod search;
pub mod segment;
pub mod source;

pub use crate::address::{Address, IpFamily};
pub use crate::builder::{
    build, BuildObserver, BuildOutput, BuildStage, BuildStats, IndexBuilder, NoopObserver,
};
pub use crate::error::{RegionError, Result};
pub use crate::index::{Index, IndexStats, VerifyReport};
pub use crate::segment::Segment;

/// Version of the ipregion library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
