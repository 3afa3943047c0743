//! Decoders for the telegram families the switch understands, and the one
//! command it sends.
//!
//! Decoders take the user data of a frame ([`RadioPacket::payload`]), so the
//! RORG byte and the trailing sender and status bytes are never read.
//!
//! [`RadioPacket::payload`]: crate::packet::RadioPacket::payload

use crate::id::EnOceanId;
use crate::packet::{OutboundPacket, PACKET_RADIO_ERP1, RORG_VLD};

/// D2-01 command id of an "actuator status response".
pub const CMD_ACTUATOR_STATUS: u8 = 0x04;
/// D2-01 command id of "actuator set output".
pub const CMD_SET_OUTPUT: u8 = 0x01;
/// Output value of a fully-on actuator.
pub const OUTPUT_ON: u8 = 0x64;
pub const OUTPUT_OFF: u8 = 0x00;

/// Highest channel number the 5-bit I/O field can address.
pub const MAX_CHANNEL: u8 = 0x1F;

/// Send with the dongle's default sub-telegram count.
const SUB_TEL_NUM: u8 = 0x03;
const DBM_SEND: u8 = 0xFF;
const SECURITY_LEVEL: u8 = 0x00;

/// A decoded A5-12-01 (electricity meter) telegram.
///
/// | Field | Bits |
/// |-------|------|
/// | MR (meter reading) | DB3..DB1, 24 bits |
/// | TI (tariff info) | DB0 bits 7..4 |
/// | DT (data type) | DB0 bit 2, `1` = current value |
/// | DIV (divisor) | DB0 bits 1..0, reading / 10^DIV |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterReading {
    pub raw: u32,
    pub tariff: u8,
    pub is_current_value: bool,
    pub divisor_exponent: u8,
}

impl MeterReading {
    /// Decode the four data bytes of a 4BS metering telegram.
    ///
    /// Returns `None` unless `payload` is exactly DB3..DB0.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let &[db3, db2, db1, db0] = payload else {
            return None;
        };
        Some(Self {
            raw: u32::from_be_bytes([0, db3, db2, db1]),
            tariff: db0 >> 4,
            is_current_value: (db0 >> 2) & 0x01 == 1,
            divisor_exponent: db0 & 0x03,
        })
    }

    /// Current power in watts, or `None` for a cumulative counter value.
    #[must_use]
    pub fn watts(&self) -> Option<f64> {
        self.is_current_value
            .then(|| f64::from(self.raw) / 10f64.powi(i32::from(self.divisor_exponent)))
    }
}

/// A decoded D2-01 "actuator status response" (CMD 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorStatus {
    pub channel: u8,
    /// 0 = off, 1..=100 = output level in percent.
    pub output: u8,
}

impl ActuatorStatus {
    /// Decode a VLD actuator telegram.
    ///
    /// Returns `None` when the payload lacks the CMD, I/O or OV byte, or
    /// carries another command.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let &[cmd, io, ov, ..] = payload else {
            return None;
        };
        (cmd & 0x0F == CMD_ACTUATOR_STATUS).then_some(Self {
            channel: io & 0x1F,
            output: ov & 0x7F,
        })
    }
}

/// Build a D2-01 "actuator set output" command addressed to `destination`.
#[must_use]
pub fn set_output(destination: EnOceanId, channel: u8, level: u8) -> OutboundPacket {
    let [d0, d1, d2, d3] = destination.bytes();
    OutboundPacket {
        packet_type: PACKET_RADIO_ERP1,
        data: vec![RORG_VLD, CMD_SET_OUTPUT, channel, level, 0, 0, 0, 0, 0],
        optional: vec![SUB_TEL_NUM, d0, d1, d2, d3, DBM_SEND, SECURITY_LEVEL],
    }
}
