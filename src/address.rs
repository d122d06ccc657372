//! Address codec
//!
//! Addresses are fixed-width big-endian byte sequences: 4 bytes for IPv4 and
//! 16 bytes for IPv6. The family is an explicit tag carried by every
//! [`Address`]; code that only needs ordering (the search loop) works on the
//! raw bytes through [`compare_bytes`] and never looks at the tag.
//!
//! # Example
//!
//! ```
//! use ipregion::address::{Address, IpFamily};
//!
//! let a = Address::parse("1.1.255.255")?;
//! assert_eq!(a.family(), IpFamily::V4);
//! assert_eq!(a.increment().to_string(), "1.2.0.0");
//!
//! let max = IpFamily::V6.max();
//! assert_eq!(max.increment(), max); // saturates, never wraps
//! # Ok::<(), ipregion::RegionError>(())
//! ```

use crate::error::{RegionError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of an address, segment, or artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpFamily {
    /// 32-bit addresses
    V4,
    /// 128-bit addresses
    V6,
}

impl IpFamily {
    /// Number of bytes in an address of this family
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            IpFamily::V4 => 4,
            IpFamily::V6 => 16,
        }
    }

    /// Tag byte stored in the artifact header
    #[inline]
    pub const fn tag(self) -> u8 {
        match self {
            IpFamily::V4 => 4,
            IpFamily::V6 => 6,
        }
    }

    /// Decode a header tag byte
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            4 => Some(IpFamily::V4),
            6 => Some(IpFamily::V6),
            _ => None,
        }
    }

    /// Human-readable name ("IPv4" / "IPv6")
    pub const fn name(self) -> &'static str {
        match self {
            IpFamily::V4 => "IPv4",
            IpFamily::V6 => "IPv6",
        }
    }

    /// The all-zero address of this family
    pub const fn min(self) -> Address {
        Address {
            family: self,
            bytes: [0; 16],
        }
    }

    /// The all-ones address of this family
    pub fn max(self) -> Address {
        let mut bytes = [0u8; 16];
        bytes[..self.width()].fill(0xff);
        Address {
            family: self,
            bytes,
        }
    }

    #[inline]
    const fn max_value(self) -> u128 {
        match self {
            IpFamily::V4 => u32::MAX as u128,
            IpFamily::V6 => u128::MAX,
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IpFamily {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "4" | "v4" | "ipv4" => Ok(IpFamily::V4),
            "6" | "v6" | "ipv6" => Ok(IpFamily::V6),
            _ => Err(RegionError::InvalidAddressFormat(format!(
                "unknown address family '{}'",
                s
            ))),
        }
    }
}

/// A single IPv4 or IPv6 address as big-endian bytes.
///
/// Only the first `family().width()` bytes are meaningful; the remainder is
/// always zero so that derived equality and hashing are exact.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    family: IpFamily,
    bytes: [u8; 16],
}

impl Address {
    /// Parse dotted-decimal IPv4 or colon-hex IPv6 text.
    ///
    /// Accepts `::` compression and embedded IPv4 tails
    /// (`::ffff:114.114.114.114`). Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        trimmed
            .parse::<IpAddr>()
            .map(Address::from)
            .map_err(|_| RegionError::InvalidAddressFormat(trimmed.to_string()))
    }

    /// Build an address from 4 or 16 raw big-endian bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let family = match raw.len() {
            4 => IpFamily::V4,
            16 => IpFamily::V6,
            n => {
                return Err(RegionError::InvalidAddressFormat(format!(
                    "expected 4 or 16 address bytes, got {}",
                    n
                )))
            }
        };
        let mut bytes = [0u8; 16];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Address { family, bytes })
    }

    /// Build an address from its numeric value within a family
    pub fn from_u128(family: IpFamily, value: u128) -> Result<Self> {
        if value > family.max_value() {
            return Err(RegionError::InvalidAddressFormat(format!(
                "value {:#x} does not fit in an {} address",
                value, family
            )));
        }
        Ok(Self::from_u128_unchecked(family, value))
    }

    fn from_u128_unchecked(family: IpFamily, value: u128) -> Self {
        let mut bytes = [0u8; 16];
        match family {
            IpFamily::V4 => bytes[..4].copy_from_slice(&(value as u32).to_be_bytes()),
            IpFamily::V6 => bytes = value.to_be_bytes(),
        }
        Address { family, bytes }
    }

    /// Address family
    #[inline]
    pub fn family(&self) -> IpFamily {
        self.family
    }

    /// The big-endian bytes, exactly `family().width()` long
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.family.width()]
    }

    /// Numeric value of the address
    pub fn as_u128(&self) -> u128 {
        match self.family {
            IpFamily::V4 => {
                u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
                    as u128
            }
            IpFamily::V6 => u128::from_be_bytes(self.bytes),
        }
    }

    /// Compare two addresses of the same family.
    ///
    /// Fails with `FamilyMismatch` when the widths differ.
    pub fn compare(&self, other: &Address) -> Result<Ordering> {
        self.ensure_family(other.family)?;
        Ok(compare_bytes(self.as_bytes(), other.as_bytes()))
    }

    /// The next address, saturating at the family maximum
    pub fn increment(&self) -> Address {
        let value = self.as_u128();
        if value == self.family.max_value() {
            *self
        } else {
            Self::from_u128_unchecked(self.family, value + 1)
        }
    }

    /// The previous address, saturating at the family minimum
    pub fn decrement(&self) -> Address {
        match self.as_u128().checked_sub(1) {
            Some(value) => Self::from_u128_unchecked(self.family, value),
            None => *self,
        }
    }

    /// True for the all-ones address of the family
    pub fn is_max(&self) -> bool {
        self.as_u128() == self.family.max_value()
    }

    /// Integer value of the first `prefix_len` bytes (the super-block number)
    #[inline]
    pub fn prefix_value(&self, prefix_len: usize) -> usize {
        prefix_value(self.as_bytes(), prefix_len)
    }

    /// Last address of the super-block this address belongs to
    pub fn block_max(&self, prefix_len: usize) -> Address {
        let mut out = *self;
        let width = self.family.width();
        out.bytes[prefix_len.min(width)..width].fill(0xff);
        out
    }

    /// Return this address in the requested family.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are converted to IPv4
    /// when `family` is `V4`. Anything else of the wrong family fails with
    /// `FamilyMismatch`.
    pub fn normalize_to(&self, family: IpFamily) -> Result<Address> {
        if self.family == family {
            return Ok(*self);
        }
        if family == IpFamily::V4 {
            if let Some(v4) = Ipv6Addr::from(self.bytes).to_ipv4_mapped() {
                return Ok(Address::from(IpAddr::V4(v4)));
            }
        }
        Err(RegionError::FamilyMismatch {
            expected: family.name(),
            found: self.family.name(),
        })
    }

    /// Convert to a standard library address
    pub fn to_ip_addr(&self) -> IpAddr {
        match self.family {
            IpFamily::V4 => IpAddr::V4(Ipv4Addr::new(
                self.bytes[0],
                self.bytes[1],
                self.bytes[2],
                self.bytes[3],
            )),
            IpFamily::V6 => IpAddr::V6(Ipv6Addr::from(self.bytes)),
        }
    }

    pub(crate) fn ensure_family(&self, family: IpFamily) -> Result<()> {
        if self.family == family {
            Ok(())
        } else {
            Err(RegionError::FamilyMismatch {
                expected: family.name(),
                found: self.family.name(),
            })
        }
    }
}

impl From<IpAddr> for Address {
    fn from(addr: IpAddr) -> Self {
        let mut bytes = [0u8; 16];
        match addr {
            IpAddr::V4(v4) => {
                bytes[..4].copy_from_slice(&v4.octets());
                Address {
                    family: IpFamily::V4,
                    bytes,
                }
            }
            IpAddr::V6(v6) => {
                bytes.copy_from_slice(&v6.octets());
                Address {
                    family: IpFamily::V6,
                    bytes,
                }
            }
        }
    }
}

impl FromStr for Address {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_ip_addr(), f)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Unsigned lexicographic comparison of two equal-width address byte strings
#[inline]
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    debug_assert_eq!(a.len(), b.len());
    a.cmp(b)
}

/// Integer value of the first `prefix_len` bytes of an address
#[inline]
pub fn prefix_value(bytes: &[u8], prefix_len: usize) -> usize {
    bytes[..prefix_len]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize)
}
