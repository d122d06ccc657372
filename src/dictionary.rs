//! Region dictionary
//!
//! Deduplicates region text while an artifact is being built. Each distinct
//! string is appended once to the pending region data block; later
//! occurrences reuse the first offset. Offsets follow insertion order, so two
//! builds from the same input produce byte-identical data blocks.

use crate::error::{RegionError, Result};
use crate::segment::MAX_REGION_LEN;
use rustc_hash::FxHashMap;

/// Location of a region string inside the region data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionRef {
    /// Byte offset relative to the start of the region data block
    pub offset: u32,
    /// Length in bytes
    pub length: u16,
}

/// Insertion-ordered string interner backing the region data block
#[derive(Debug, Default)]
pub struct RegionDictionary {
    index: FxHashMap<String, RegionRef>,
    data: Vec<u8>,
}

impl RegionDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the location of `text`, appending it on first sight
    pub fn intern(&mut self, text: &str) -> Result<RegionRef> {
        if let Some(&existing) = self.index.get(text) {
            return Ok(existing);
        }

        if text.len() > MAX_REGION_LEN {
            return Err(RegionError::malformed(format!(
                "region text is {} bytes (max {})",
                text.len(),
                MAX_REGION_LEN
            )));
        }
        let offset = u32::try_from(self.data.len())
            .ok()
            .filter(|off| off.checked_add(text.len() as u32).is_some())
            .ok_or_else(|| RegionError::malformed("region data block exceeds 4 GiB"))?;

        let region = RegionRef {
            offset,
            length: text.len() as u16,
        };
        self.data.extend_from_slice(text.as_bytes());
        self.index.insert(text.to_string(), region);
        Ok(region)
    }

    /// Number of distinct region strings
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if nothing has been interned yet
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Size of the pending region data block in bytes
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Consume the dictionary, returning the region data block
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut dict = RegionDictionary::new();
        let a = dict.intern("CN|GD|SZ|ISP_A").unwrap();
        let b = dict.intern("US|0|0|0").unwrap();
        let a2 = dict.intern("CN|GD|SZ|ISP_A").unwrap();

        assert_eq!(a, a2);
        assert_eq!(a, RegionRef { offset: 0, length: 14 });
        assert_eq!(b, RegionRef { offset: 14, length: 8 });
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.data_len(), 22);
        assert_eq!(dict.into_bytes(), b"CN|GD|SZ|ISP_AUS|0|0|0".to_vec());
    }

    #[test]
    fn test_insertion_order_is_deterministic() {
        let build = |texts: &[&str]| {
            let mut dict = RegionDictionary::new();
            for t in texts {
                dict.intern(t).unwrap();
            }
            dict.into_bytes()
        };
        let texts = ["b", "a", "b", "c", "a"];
        assert_eq!(build(&texts), build(&texts));
        assert_eq!(build(&texts), b"bac".to_vec());
    }

    #[test]
    fn test_empty_and_oversized_text() {
        let mut dict = RegionDictionary::new();
        assert!(dict.is_empty());
        assert_eq!(dict.intern("").unwrap(), RegionRef { offset: 0, length: 0 });

        let huge = "x".repeat(MAX_REGION_LEN + 1);
        assert!(matches!(
            dict.intern(&huge),
            Err(RegionError::MalformedSegmentRecord { .. })
        ));
    }
}
