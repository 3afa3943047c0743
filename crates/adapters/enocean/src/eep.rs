//! EnOcean Equipment Profiles.
//!
//! An EEP is the `(RORG, FUNC, TYPE)` triple that tells which telegram
//! layout a device speaks. It is written like an identifier: `D2:01:0A`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::EnOceanError;
use crate::id::{HexInput, parse_hex_tokens};

/// An EnOcean Equipment Profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "HexInput")]
pub struct Eep {
    rorg: u8,
    func: u8,
    kind: u8,
}

impl Eep {
    #[must_use]
    pub const fn new(rorg: u8, func: u8, kind: u8) -> Self {
        Self { rorg, func, kind }
    }

    #[must_use]
    pub const fn rorg(self) -> u8 {
        self.rorg
    }

    #[must_use]
    pub const fn func(self) -> u8 {
        self.func
    }

    /// The profile's TYPE field.
    #[must_use]
    pub const fn kind(self) -> u8 {
        self.kind
    }
}

impl TryFrom<&[u8]> for Eep {
    type Error = EnOceanError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value {
            [rorg, func, kind] => Ok(Self::new(*rorg, *func, *kind)),
            _ => Err(EnOceanError::InvalidEquipmentProfile(format!(
                "{value:02X?}"
            ))),
        }
    }
}

impl fmt::Display for Eep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}:{:02X}:{:02X}", self.rorg, self.func, self.kind)
    }
}

impl FromStr for Eep {
    type Err = EnOceanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_tokens(s)
            .and_then(|bytes| Self::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| EnOceanError::InvalidEquipmentProfile(s.to_string()))
    }
}

impl TryFrom<HexInput> for Eep {
    type Error = EnOceanError;

    fn try_from(value: HexInput) -> Result<Self, Self::Error> {
        match value {
            HexInput::Text(text) => text.parse(),
            HexInput::Bytes(bytes) => Self::try_from(bytes.as_slice()),
        }
    }
}
