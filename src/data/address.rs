//! IP address parsing and textual ordering.
//!
//! Addresses are compared group by group on their normalized form rather than
//! through `std::net`, because the backend hands us whatever text the bitmap
//! configuration contained (leading zeros, `::` shorthand, ...). The version is
//! decided once, when the address is constructed, and travels with it.
//!
//! IPv6 normalization pads every `:`-separated segment to four hex digits and
//! treats empty segments as `0000`. It does **not** expand `::` to the number of
//! zero groups it stands for, so `1::2` normalizes to three groups, not eight,
//! and orders against other addresses by whatever groups exist.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, ViewerError};

/// Upper bound on `:`-separated segments: eight groups plus one extra empty
/// segment produced by a leading or trailing `::`.
const MAX_V6_SEGMENTS: usize = 9;
/// `::` alone splits into three empty segments; nothing shorter is IPv6 text.
const MIN_V6_SEGMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressVersion {
    V4,
    V6,
}

impl AddressVersion {
    /// Pick the version from raw text. Only [`Address::parse`] calls this.
    fn detect(text: &str) -> Self {
        if text.contains(':') {
            AddressVersion::V6
        } else {
            AddressVersion::V4
        }
    }

    /// Address width in bits.
    pub fn bits(self) -> u8 {
        match self {
            AddressVersion::V4 => 32,
            AddressVersion::V6 => 128,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            AddressVersion::V4 => 4,
            AddressVersion::V6 => 6,
        }
    }
}

impl fmt::Display for AddressVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.number())
    }
}

/// An IPv4 or IPv6 address in textual form with its normalized groups.
#[derive(Debug, Clone)]
pub struct Address {
    version: AddressVersion,
    groups: Vec<u16>,
    text: String,
}

impl Address {
    /// Parse an address, deciding the version from the text (`:` means IPv6).
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        Self::parse_as(AddressVersion::detect(text), text)
    }

    /// Parse an address that must be of the given version.
    pub fn parse_as(version: AddressVersion, text: &str) -> Result<Self> {
        let text = text.trim();
        let groups = match version {
            AddressVersion::V4 => parse_v4_groups(text)?,
            AddressVersion::V6 => parse_v6_groups(text)?,
        };
        Ok(Self {
            version,
            groups,
            text: text.to_string(),
        })
    }

    pub fn version(&self) -> AddressVersion {
        self.version
    }

    pub fn bits(&self) -> u8 {
        self.version.bits()
    }

    /// Normalized groups: four decimal octets for IPv4, one value per segment for IPv6.
    pub fn groups(&self) -> &[u16] {
        &self.groups
    }

    /// The text the address was parsed from (used verbatim in backend queries).
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Normalized text form (`010.0.0.1` -> `10.0.0.1`, `a::1` -> `000a:0000:0001`).
    pub fn normalized(&self) -> String {
        match self.version {
            AddressVersion::V4 => self
                .groups
                .iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join("."),
            AddressVersion::V6 => self
                .groups
                .iter()
                .map(|g| format!("{g:04x}"))
                .collect::<Vec<_>>()
                .join(":"),
        }
    }

    /// Order two addresses of the same version.
    pub fn compare(&self, other: &Address) -> Result<Ordering> {
        if self.version != other.version {
            return Err(ViewerError::VersionMismatch {
                left: self.version.number(),
                right: other.version.number(),
            });
        }
        Ok(self.groups.cmp(&other.groups))
    }

    pub fn less_or_equal(&self, other: &Address) -> Result<bool> {
        Ok(self.compare(other)? != Ordering::Greater)
    }
}

/// Free-function form of [`Address::compare`].
pub fn compare(a: &Address, b: &Address) -> Result<Ordering> {
    a.compare(b)
}

/// Free-function form of [`Address::less_or_equal`].
pub fn less_or_equal(a: &Address, b: &Address) -> Result<bool> {
    a.less_or_equal(b)
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.groups == other.groups
    }
}

impl Eq for Address {}

impl PartialOrd for Address {
    /// `None` across versions; use [`Address::compare`] to get the error instead.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::str::FromStr for Address {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

fn parse_v4_groups(text: &str) -> Result<Vec<u16>> {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 4 {
        return Err(ViewerError::invalid_address(
            text,
            format!("expected 4 dotted groups, found {}", parts.len()),
        ));
    }
    parts
        .iter()
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ViewerError::invalid_address(
                    text,
                    format!("group {part:?} is not a decimal number"),
                ));
            }
            match part.parse::<u32>() {
                Ok(value) if value <= 255 => Ok(value as u16),
                _ => Err(ViewerError::invalid_address(
                    text,
                    format!("group {part:?} is outside 0..=255"),
                )),
            }
        })
        .collect()
}

fn parse_v6_groups(text: &str) -> Result<Vec<u16>> {
    let parts: Vec<&str> = text.split(':').collect();
    if !(MIN_V6_SEGMENTS..=MAX_V6_SEGMENTS).contains(&parts.len()) {
        return Err(ViewerError::invalid_address(
            text,
            format!("expected 3 to 9 colon-separated segments, found {}", parts.len()),
        ));
    }
    parts
        .iter()
        .map(|part| {
            if part.is_empty() {
                return Ok(0);
            }
            if part.len() > 4 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ViewerError::invalid_address(
                    text,
                    format!("segment {part:?} is not a 1-4 digit hex group"),
                ));
            }
            u16::from_str_radix(part, 16).map_err(|e| ViewerError::invalid_address(text, e.to_string()))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// AddressRange
// ─────────────────────────────────────────────────────────────────────────────

/// Inclusive address range with `low <= high`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRange {
    low: Address,
    high: Address,
}

impl AddressRange {
    /// Build a range from two endpoints in either order.
    pub fn new(a: Address, b: Address) -> Result<Self> {
        match a.compare(&b)? {
            Ordering::Greater => Ok(Self { low: b, high: a }),
            _ => Ok(Self { low: a, high: b }),
        }
    }

    pub fn low(&self) -> &Address {
        &self.low
    }

    pub fn high(&self) -> &Address {
        &self.high
    }

    pub fn version(&self) -> AddressVersion {
        self.low.version()
    }

    pub fn contains(&self, address: &Address) -> Result<bool> {
        Ok(self.low.less_or_equal(address)? && address.less_or_equal(&self.high)?)
    }

    /// `true` when both ends normalize to the same address.
    pub fn is_single(&self) -> bool {
        self.low == self.high
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.low, self.high)
    }
}
