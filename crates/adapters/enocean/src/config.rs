//! EnOcean integration configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::eep::Eep;
use crate::error::EnOceanError;
use crate::id::EnOceanId;
use crate::switch::{DEFAULT_CHANNEL, check_channel};

/// Configuration for the EnOcean integration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnOceanConfig {
    /// Serial device of the dongle. Empty means auto-detect.
    pub device: String,
    /// How long each identification attempt waits for the base id, in milliseconds.
    pub identification_retry_ms: u64,
    /// Identification attempts made after each response frame.
    pub identification_attempts: u32,
    /// Capacity of the inbound telegram channel.
    pub dispatch_capacity: usize,
    /// Switches declared by hand rather than learned.
    pub switches: Vec<SwitchConfig>,
}

impl Default for EnOceanConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            identification_retry_ms: 100,
            identification_attempts: 10,
            dispatch_capacity: 64,
            switches: Vec::new(),
        }
    }
}

impl EnOceanConfig {
    #[must_use]
    pub fn identification_retry(&self) -> Duration {
        Duration::from_millis(self.identification_retry_ms)
    }

    /// # Errors
    ///
    /// Returns [`EnOceanError::InvalidCapacity`] for a zero dispatch capacity
    /// and [`EnOceanError::InvalidChannel`] for a switch channel above `0x1F`.
    pub fn validate(&self) -> Result<(), EnOceanError> {
        if self.dispatch_capacity == 0 {
            return Err(EnOceanError::InvalidCapacity);
        }
        for switch in &self.switches {
            check_channel(switch.channel)?;
        }
        Ok(())
    }
}

/// A statically declared switch.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchConfig {
    /// `"01:A3:19:B2"` or `[1, 163, 25, 178]`.
    pub id: EnOceanId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(default)]
    pub eep: Option<Eep>,
}

fn default_channel() -> u8 {
    DEFAULT_CHANNEL
}
