//! ESP3 packet model.
//!
//! Frames coming off the dongle are classified exactly once, in
//! [`Packet::from_esp3`], into a closed set of kinds. Downstream code matches
//! on [`Packet`] and [`Telegram`] instead of inspecting raw bytes again.
//!
//! ERP1 radio frame layout (`data`):
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | RORG |
//! | 1..len-5 | user data |
//! | len-5..len-1 | sender id |
//! | len-1 | status |

use crate::id::EnOceanId;

/// ESP3 packet type of a radio telegram.
pub const PACKET_RADIO_ERP1: u8 = 0x01;
/// ESP3 packet type of a response to a common command.
pub const PACKET_RESPONSE: u8 = 0x02;

/// 4-byte sensor telegrams.
pub const RORG_BS4: u8 = 0xA5;
/// 1-byte sensor telegrams.
pub const RORG_BS1: u8 = 0xD5;
/// Variable-length telegrams.
pub const RORG_VLD: u8 = 0xD2;
/// Universal teach-in.
pub const RORG_UTE: u8 = 0xD4;

const SENDER_AND_STATUS_LEN: usize = 5;
const ERP1_MIN_LEN: usize = 1 + SENDER_AND_STATUS_LEN;
const UTE_MIN_LEN: usize = 13;

/// One inbound ESP3 frame, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Reply of the dongle to a common command (e.g. the base-id read).
    Response(ResponsePacket),
    /// A radio telegram sent by some device.
    Telegram(Telegram),
    /// Anything this adapter does not interpret.
    Other { packet_type: u8 },
}

/// Reply of the dongle to a common command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    pub return_code: u8,
    pub data: Vec<u8>,
}

/// A radio telegram, plain or teach-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Telegram {
    Radio(RadioPacket),
    TeachIn(TeachInPacket),
}

impl Telegram {
    /// The underlying radio frame.
    #[must_use]
    pub fn radio(&self) -> &RadioPacket {
        match self {
            Self::Radio(radio) => radio,
            Self::TeachIn(teach_in) => &teach_in.radio,
        }
    }

    #[must_use]
    pub fn sender(&self) -> EnOceanId {
        self.radio().sender
    }
}

/// A decoded ERP1 radio frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioPacket {
    pub sender: EnOceanId,
    pub rorg: u8,
    /// FUNC of the announced profile, when the frame carries one.
    pub rorg_func: Option<u8>,
    /// TYPE of the announced profile, when the frame carries one.
    pub rorg_type: Option<u8>,
    /// The full ERP1 data, RORG byte included.
    pub data: Vec<u8>,
    pub optional: Vec<u8>,
    /// Whether the frame is a teach-in.
    pub learn: bool,
}

impl RadioPacket {
    /// User data: everything between the RORG byte and the trailing sender
    /// and status bytes. Empty when the frame carries none.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let end = self.data.len().saturating_sub(SENDER_AND_STATUS_LEN);
        self.data.get(1..end).unwrap_or_default()
    }
}

/// A UTE teach-in telegram.
///
/// UTE frames carry their own RORG (`0xD4`) plus the RORG of the profile
/// they announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeachInPacket {
    pub radio: RadioPacket,
    pub rorg_of_eep: u8,
}

/// An outbound ESP3 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    pub packet_type: u8,
    pub data: Vec<u8>,
    pub optional: Vec<u8>,
}

impl Packet {
    /// Classify a raw ESP3 frame.
    ///
    /// Truncated frames of a known type degrade to [`Packet::Other`].
    #[must_use]
    pub fn from_esp3(packet_type: u8, data: Vec<u8>, optional: Vec<u8>) -> Self {
        match packet_type {
            PACKET_RESPONSE => match data.split_first() {
                Some((&return_code, rest)) => Self::Response(ResponsePacket {
                    return_code,
                    data: rest.to_vec(),
                }),
                None => Self::Other { packet_type },
            },
            PACKET_RADIO_ERP1 => {
                parse_erp1(data, optional).map_or(Self::Other { packet_type }, Self::Telegram)
            }
            _ => Self::Other { packet_type },
        }
    }
}

fn parse_erp1(data: Vec<u8>, optional: Vec<u8>) -> Option<Telegram> {
    if data.len() < ERP1_MIN_LEN {
        return None;
    }
    let sender_start = data.len() - SENDER_AND_STATUS_LEN;
    let sender = EnOceanId::try_from(&data[sender_start..data.len() - 1]).ok()?;
    let rorg = data[0];

    let mut radio = RadioPacket {
        sender,
        rorg,
        rorg_func: None,
        rorg_type: None,
        data,
        optional,
        learn: false,
    };

    match rorg {
        RORG_BS4 if radio.data.len() >= 5 + SENDER_AND_STATUS_LEN => {
            let db0 = radio.data[4];
            radio.learn = db0 & 0x08 == 0;
            // Teach-in variant 2 carries FUNC and TYPE in DB3/DB2.
            if radio.learn && db0 & 0x80 != 0 {
                radio.rorg_func = Some(radio.data[1] >> 2);
                radio.rorg_type = Some(((radio.data[1] & 0x03) << 5) | (radio.data[2] >> 3));
            }
        }
        RORG_BS1 => {
            radio.learn = radio.data[1] & 0x08 == 0;
        }
        RORG_UTE if radio.data.len() >= UTE_MIN_LEN => {
            radio.learn = true;
            radio.rorg_type = Some(radio.data[5]);
            radio.rorg_func = Some(radio.data[6]);
            let rorg_of_eep = radio.data[7];
            return Some(Telegram::TeachIn(TeachInPacket { radio, rorg_of_eep }));
        }
        _ => {}
    }

    Some(Telegram::Radio(radio))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTE_DATA: [u8; 13] = [
        0xD4, 0xA0, 0x01, 0x46, 0x00, 0x0A, 0x01, 0xD2, 0x01, 0xA3, 0x19, 0xB2, 0x00,
    ];
    const UTE_OPTIONAL: [u8; 7] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x47, 0x00];

    #[test]
    fn should_classify_response_packet() {
        let packet = Packet::from_esp3(PACKET_RESPONSE, vec![0x00, 0xFF, 0x80, 0x00, 0x01], vec![]);
        assert_eq!(
            packet,
            Packet::Response(ResponsePacket {
                return_code: 0x00,
                data: vec![0xFF, 0x80, 0x00, 0x01],
            })
        );
    }

    #[test]
    fn should_classify_ute_frame_as_teach_in() {
        let packet = Packet::from_esp3(PACKET_RADIO_ERP1, UTE_DATA.to_vec(), UTE_OPTIONAL.to_vec());
        let Packet::Telegram(Telegram::TeachIn(teach_in)) = packet else {
            panic!("expected a teach-in telegram, got {packet:?}");
        };
        assert_eq!(teach_in.rorg_of_eep, RORG_VLD);
        assert_eq!(teach_in.radio.rorg, RORG_UTE);
        assert_eq!(teach_in.radio.rorg_func, Some(0x01));
        assert_eq!(teach_in.radio.rorg_type, Some(0x0A));
        assert_eq!(teach_in.radio.sender.to_string(), "01:A3:19:B2");
        assert!(teach_in.radio.learn);
    }

    #[test]
    fn should_extract_profile_from_bs4_teach_in() {
        // FUNC 0x12, TYPE 0x01 packed into DB3/DB2, DB0 = LRN type + teach-in.
        let data = vec![0xA5, 0x48, 0x08, 0x00, 0x80, 0x04, 0x05, 0x06, 0x07, 0x00];
        let packet = Packet::from_esp3(PACKET_RADIO_ERP1, data, vec![]);
        let Packet::Telegram(Telegram::Radio(radio)) = packet else {
            panic!("expected a radio telegram");
        };
        assert!(radio.learn);
        assert_eq!(radio.rorg_func, Some(0x12));
        assert_eq!(radio.rorg_type, Some(0x01));
        assert_eq!(radio.sender, EnOceanId::new([4, 5, 6, 7]));
    }

    #[test]
    fn should_not_extract_profile_from_bs4_data_telegram() {
        let data = vec![0xA5, 0x00, 0x00, 0x96, 0x0C, 0x04, 0x05, 0x06, 0x07, 0x00];
        let Packet::Telegram(telegram) = Packet::from_esp3(PACKET_RADIO_ERP1, data, vec![]) else {
            panic!("expected a telegram");
        };
        assert!(!telegram.radio().learn);
        assert_eq!(telegram.radio().rorg_func, None);
    }

    #[test]
    fn should_read_bs1_learn_bit() {
        let data = vec![0xD5, 0x00, 0x04, 0x05, 0x06, 0x07, 0x00];
        let Packet::Telegram(telegram) = Packet::from_esp3(PACKET_RADIO_ERP1, data, vec![]) else {
            panic!("expected a telegram");
        };
        assert!(telegram.radio().learn);
        assert_eq!(telegram.sender(), EnOceanId::new([4, 5, 6, 7]));
    }

    #[test]
    fn should_degrade_truncated_frames_to_other() {
        assert_eq!(
            Packet::from_esp3(PACKET_RADIO_ERP1, vec![0xD2, 0x01, 0x02], vec![]),
            Packet::Other {
                packet_type: PACKET_RADIO_ERP1
            }
        );
        assert_eq!(
            Packet::from_esp3(PACKET_RESPONSE, vec![], vec![]),
            Packet::Other {
                packet_type: PACKET_RESPONSE
            }
        );
    }

    #[test]
    fn should_classify_unknown_type_as_other() {
        assert_eq!(
            Packet::from_esp3(0x04, vec![0x01], vec![]),
            Packet::Other { packet_type: 0x04 }
        );
    }

    #[test]
    fn should_strip_rorg_sender_and_status_from_payload() {
        let Packet::Telegram(telegram) = Packet::from_esp3(
            PACKET_RADIO_ERP1,
            vec![0xD2, 0x04, 0x01, 0x64, 0x01, 0xA3, 0x19, 0xB2, 0x00],
            vec![],
        ) else {
            panic!("expected a telegram");
        };
        assert_eq!(telegram.radio().payload(), &[0x04, 0x01, 0x64]);

        let Packet::Telegram(empty) = Packet::from_esp3(
            PACKET_RADIO_ERP1,
            vec![0xA5, 0x00, 0x00, 0x96, 0x0D, 0x00],
            vec![],
        ) else {
            panic!("expected a telegram");
        };
        assert!(empty.radio().payload().is_empty());
    }
}
