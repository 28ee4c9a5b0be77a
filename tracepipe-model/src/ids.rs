use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::macros::impl_str_serde;

/// An error parsing or decoding a [`TraceId`] or [`SpanId`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// The hex representation has more digits than the id can hold.
    #[error("id is longer than {max} hex characters")]
    TooLong {
        /// Maximum number of hex digits.
        max: usize,
    },
    /// The hex representation contains non-hex characters or is empty.
    #[error("invalid hex id")]
    InvalidHex,
    /// The binary representation has the wrong number of bytes.
    #[error("expected {expected} id bytes, found {found}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        found: usize,
    },
}

/// A 128-bit trace identifier, split into a high and a low half.
///
/// Trace ids written by older clients only carry the low 64 bits, in which case `high` is zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId {
    /// The upper 64 bits.
    pub high: u64,
    /// The lower 64 bits.
    pub low: u64,
}

impl TraceId {
    /// Number of bytes in the binary representation.
    pub const LEN: usize = 16;

    /// Creates a trace id from its two halves.
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// Returns the big-endian binary representation used on the wire.
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut bytes = [0; Self::LEN];
        bytes[..8].copy_from_slice(&self.high.to_be_bytes());
        bytes[8..].copy_from_slice(&self.low.to_be_bytes());
        bytes
    }

    /// Decodes the big-endian binary representation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        let bytes: [u8; Self::LEN] = bytes.try_into().map_err(|_| IdError::InvalidLength {
            expected: Self::LEN,
            found: bytes.len(),
        })?;

        let value = u128::from_be_bytes(bytes);
        Ok(Self {
            high: (value >> 64) as u64,
            low: value as u64,
        })
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{:016x}", self.low)
        } else {
            write!(f, "{:016x}{:016x}", self.high, self.low)
        }
    }
}

impl FromStr for TraceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > 32 {
            return Err(IdError::TooLong { max: 32 });
        }

        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdError::InvalidHex);
        }

        // All bytes are ASCII, so any index is a char boundary.
        let (high, low) = s.split_at(s.len().saturating_sub(16));
        let low = parse_hex(low)?;
        let high = if high.is_empty() { 0 } else { parse_hex(high)? };

        Ok(Self { high, low })
    }
}

impl_str_serde!(TraceId, "a trace identifier");

/// A 64-bit span identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(pub u64);

impl SpanId {
    /// Number of bytes in the binary representation.
    pub const LEN: usize = 8;

    /// Returns the big-endian binary representation used on the wire.
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        self.0.to_be_bytes()
    }

    /// Decodes the big-endian binary representation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        let bytes: [u8; Self::LEN] = bytes.try_into().map_err(|_| IdError::InvalidLength {
            expected: Self::LEN,
            found: bytes.len(),
        })?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > 16 {
            return Err(IdError::TooLong { max: 16 });
        }
        parse_hex(s).map(Self)
    }
}

impl_str_serde!(SpanId, "a span identifier");

/// Parses up to 16 hex digits without sign or prefix.
fn parse_hex(s: &str) -> Result<u64, IdError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IdError::InvalidHex);
    }
    u64::from_str_radix(s, 16).map_err(|_| IdError::InvalidHex)
}
