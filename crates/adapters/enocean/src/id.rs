//! EnOcean device identifiers.
//!
//! Every EnOcean radio module is addressed by a 4-byte chip id. Its textual
//! form is four uppercase hex bytes separated by colons, e.g. `01:A3:19:B2`.
//! That string is also the device's durable `unique_id` in the registry.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::EnOceanError;

/// Number of bytes in an EnOcean device identifier.
pub const ID_LEN: usize = 4;

/// A 4-byte EnOcean device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "HexInput")]
pub struct EnOceanId([u8; ID_LEN]);

impl EnOceanId {
    #[must_use]
    pub const fn new(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn bytes(self) -> [u8; ID_LEN] {
        self.0
    }

    /// Lowercase hex without separators, for use in entity ids (e.g. `01a319b2`).
    #[must_use]
    pub fn slug(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl From<[u8; ID_LEN]> for EnOceanId {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for EnOceanId {
    type Error = EnOceanError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        <[u8; ID_LEN]>::try_from(value)
            .map(Self)
            .map_err(|_| EnOceanError::InvalidIdentifier(format!("{value:02X?}")))
    }
}

impl fmt::Display for EnOceanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}")
    }
}

impl FromStr for EnOceanId {
    type Err = EnOceanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_tokens(s)
            .and_then(|bytes| Self::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| EnOceanError::InvalidIdentifier(s.to_string()))
    }
}

impl TryFrom<HexInput> for EnOceanId {
    type Error = EnOceanError;

    fn try_from(value: HexInput) -> Result<Self, Self::Error> {
        match value {
            HexInput::Text(text) => text.parse(),
            HexInput::Bytes(bytes) => Self::try_from(bytes.as_slice()),
        }
    }
}

/// Either accepted serialized form of a hex byte sequence: the colon-hex
/// string or a list of integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HexInput {
    Text(String),
    Bytes(Vec<u8>),
}

/// Split `s` on `:` and parse every token as a hex byte.
///
/// Returns `None` as soon as one token is empty, not hex, or above `0xFF`.
pub(crate) fn parse_hex_tokens(s: &str) -> Option<Vec<u8>> {
    s.split(':')
        .map(|token| u8::from_str_radix(token.trim(), 16).ok())
        .collect()
}
