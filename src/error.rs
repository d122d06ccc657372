/// Error types for the ipregion library
use std::fmt;

/// Result type alias for ipregion operations
pub type Result<T> = std::result::Result<T, RegionError>;

/// Main error type for building and searching region indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// Text could not be parsed as an IPv4 or IPv6 address
    InvalidAddressFormat(String),

    /// Two addresses (or an address and an artifact) of different families met
    FamilyMismatch {
        /// Family the operation expected
        expected: &'static str,
        /// Family that was actually supplied
        found: &'static str,
    },

    /// A source record line could not be turned into a segment
    MalformedSegmentRecord {
        /// 1-based source line, when the record came from a file
        line: Option<usize>,
        /// What was wrong with the record
        reason: String,
    },

    /// Segments overlap, leave a gap, or are out of order
    NonContiguousInput(String),

    /// No segment in the artifact covers the queried address
    AddressNotCovered(String),

    /// Artifact header or block offsets are inconsistent with its bytes
    CorruptArtifact(String),

    /// Vector index prefix length outside the supported range
    UnsupportedPrefixLength(u8),

    /// I/O errors from the surrounding file handling
    Io(String),
}

impl RegionError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            RegionError::InvalidAddressFormat(_) => "InvalidAddressFormat",
            RegionError::FamilyMismatch { .. } => "FamilyMismatch",
            RegionError::MalformedSegmentRecord { .. } => "MalformedSegmentRecord",
            RegionError::NonContiguousInput(_) => "NonContiguousInput",
            RegionError::AddressNotCovered(_) => "AddressNotCovered",
            RegionError::CorruptArtifact(_) => "CorruptArtifact",
            RegionError::UnsupportedPrefixLength(_) => "UnsupportedPrefixLength",
            RegionError::Io(_) => "Io",
        }
    }

    /// Process exit code used by the CLI for this error kind.
    ///
    /// Every kind maps to a distinct non-zero code; 1 is left for
    /// "not found"-style outcomes and generic failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            RegionError::InvalidAddressFormat(_) => 2,
            RegionError::FamilyMismatch { .. } => 3,
            RegionError::MalformedSegmentRecord { .. } => 4,
            RegionError::NonContiguousInput(_) => 5,
            RegionError::AddressNotCovered(_) => 6,
            RegionError::CorruptArtifact(_) => 7,
            RegionError::UnsupportedPrefixLength(_) => 8,
            RegionError::Io(_) => 9,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        RegionError::MalformedSegmentRecord {
            line: None,
            reason: reason.into(),
        }
    }

    /// Attach a source line number to a record error; other kinds pass through unchanged.
    pub fn at_line(self, line_no: usize) -> Self {
        match self {
            RegionError::MalformedSegmentRecord { reason, .. } => {
                RegionError::MalformedSegmentRecord {
                    line: Some(line_no),
                    reason,
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::InvalidAddressFormat(text) => {
                write!(f, "Invalid address format: '{}'", text)
            }
            RegionError::FamilyMismatch { expected, found } => {
                write!(f, "Address family mismatch: expected {}, found {}", expected, found)
            }
            RegionError::MalformedSegmentRecord {
                line: Some(line),
                reason,
            } => write!(f, "Malformed segment record at line {}: {}", line, reason),
            RegionError::MalformedSegmentRecord { line: None, reason } => {
                write!(f, "Malformed segment record: {}", reason)
            }
            RegionError::NonContiguousInput(msg) => write!(f, "Non-contiguous input: {}", msg),
            RegionError::AddressNotCovered(addr) => {
                write!(f, "Address not covered by any segment: {}", addr)
            }
            RegionError::CorruptArtifact(msg) => write!(f, "Corrupt artifact: {}", msg),
            RegionError::UnsupportedPrefixLength(len) => {
                write!(f, "Unsupported vector index prefix length: {} (expected 1 or 2)", len)
            }
            RegionError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for RegionError {}

impl From<std::io::Error> for RegionError {
    fn from(err: std::io::Error) -> Self {
        RegionError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            RegionError::InvalidAddressFormat("x".into()),
            RegionError::FamilyMismatch {
                expected: "IPv4",
                found: "IPv6",
            },
            RegionError::malformed("x"),
            RegionError::NonContiguousInput("x".into()),
            RegionError::AddressNotCovered("x".into()),
            RegionError::CorruptArtifact("x".into()),
            RegionError::UnsupportedPrefixLength(3),
            RegionError::Io("x".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&c| c > 1));
    }

    #[test]
    fn test_at_line_only_annotates_record_errors() {
        let err = RegionError::malformed("too few fields").at_line(7);
        assert_eq!(err.kind(), "MalformedSegmentRecord");
        assert!(err.to_string().contains("line 7"));

        let err = RegionError::InvalidAddressFormat("1.2.3".into()).at_line(7);
        assert_eq!(err, RegionError::InvalidAddressFormat("1.2.3".into()));

        let err = RegionError::NonContiguousInput("gap".into()).at_line(7);
        assert_eq!(err.kind(), "NonContiguousInput");
    }
}
