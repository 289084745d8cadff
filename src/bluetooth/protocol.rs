//! GoDice Protocol
//!
//! UUIDs, outbound command encoding, and notification frame decoding for the
//! GoDice BLE protocol. Pure and stateless; the caller attaches device
//! identifiers to decoded payloads.

use crate::domain::models::{ParseError, Vector3};
use uuid::Uuid;

/// GoDice BLE Service UUID (Nordic UART service)
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// Write Characteristic UUID - where commands are sent
pub const WRITE_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// Notify Characteristic UUID - where dice notifications are received
pub const NOTIFY_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

// Frame tag bytes. 'S' doubles as the inner tag of Fake/Tilt/Move frames.
const TAG_ROLL: u8 = b'R';
const TAG_BATTERY: u8 = b'B';
const TAG_COLOR: u8 = b'C';
const TAG_STABLE: u8 = b'S';
const TAG_FAKE_STABLE: u8 = b'F';
const TAG_TILT_STABLE: u8 = b'T';
const TAG_MOVE_STABLE: u8 = b'M';

/// Outbound commands understood by the die.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiceCommand {
    /// Ask the die to report its shell color.
    RequestColor,
    /// Ask the die to report its battery charge level.
    RequestBatteryLevel,
    /// Drive the LEDs. The payload is passed through opaque; the die never
    /// echoes it back in a decodable frame.
    SetLed(Vec<u8>),
    /// Toggle an LED blink pattern. Payload opaque, as with [`Self::SetLed`].
    ToggleLed(Vec<u8>),
}

impl DiceCommand {
    /// Encode this command into the payload written to the write
    /// characteristic.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::RequestColor => vec![0x17],
            Self::RequestBatteryLevel => vec![0x03],
            Self::SetLed(payload) => {
                let mut bytes = Vec::with_capacity(1 + payload.len());
                bytes.push(0x08);
                bytes.extend_from_slice(payload);
                bytes
            }
            Self::ToggleLed(payload) => {
                let mut bytes = Vec::with_capacity(1 + payload.len());
                bytes.push(0x10);
                bytes.extend_from_slice(payload);
                bytes
            }
        }
    }
}

/// One decoded notification payload, before a device identifier is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    RollStarted,
    BatteryLevel(u8),
    ColorFetched(u8),
    Stable(Vector3),
    FakeStable(Vector3),
    TiltStable(Vector3),
    MoveStable(Vector3),
}

/// Decode one notification frame.
///
/// # Frame layout
///
/// ```text
/// 'R'                      : roll started (trailing bytes ignored)
/// 'B' 'a' 't' <level>      : battery level
/// 'C' 'o' 'l' <color>      : shell color
/// 'S' <x> <y> <z>          : stable orientation vector
/// 'F' 'S' <x> <y> <z>      : fake stable (bump, same face)
/// 'T' 'S' <x> <y> <z>      : tilt stable (resting against an obstacle)
/// 'M' 'S' <x> <y> <z>      : move stable (moved without rolling)
/// ```
pub fn decode(frame: &[u8]) -> Result<Notification, ParseError> {
    let (&tag, rest) = frame.split_first().ok_or(ParseError::EmptyFrame)?;
    match tag {
        TAG_ROLL => Ok(Notification::RollStarted),
        TAG_BATTERY => match rest {
            [b'a', b't', level, ..] => Ok(Notification::BatteryLevel(*level)),
            _ => Err(ParseError::BadBatteryFrame),
        },
        TAG_COLOR => match rest {
            [b'o', b'l', color, ..] => Ok(Notification::ColorFetched(*color)),
            _ => Err(ParseError::BadColorFrame),
        },
        TAG_STABLE => stable_vector(frame).map(Notification::Stable),
        TAG_FAKE_STABLE => stable_vector(rest).map(Notification::FakeStable),
        TAG_TILT_STABLE => stable_vector(rest).map(Notification::TiltStable),
        TAG_MOVE_STABLE => stable_vector(rest).map(Notification::MoveStable),
        other => Err(ParseError::UnknownTag(other)),
    }
}

/// Parse the `'S' x y z` tail shared by all stable frame kinds. Exactly four
/// bytes; anything else is malformed.
fn stable_vector(data: &[u8]) -> Result<Vector3, ParseError> {
    match data {
        [TAG_STABLE, x, y, z] => Ok(Vector3 {
            x: *x,
            y: *y,
            z: *z,
        }),
        _ => Err(ParseError::BadRollFrame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_is_rejected() {
        assert_eq!(decode(&[]), Err(ParseError::EmptyFrame));
    }

    #[test]
    fn roll_started_ignores_trailing_bytes() {
        assert_eq!(decode(&[0x52]), Ok(Notification::RollStarted));
        assert_eq!(decode(&[0x52, 0xff, 0x00]), Ok(Notification::RollStarted));
        assert_eq!(
            decode(&[0x52, 0x53, 1, 2, 3]),
            Ok(Notification::RollStarted)
        );
    }

    #[test]
    fn battery_frames_decode_for_all_levels() {
        for level in 0..=255u8 {
            assert_eq!(
                decode(&[0x42, 0x61, 0x74, level]),
                Ok(Notification::BatteryLevel(level))
            );
        }
    }

    #[test]
    fn battery_frames_with_wrong_magic_or_length_are_rejected() {
        assert_eq!(decode(&[0x42]), Err(ParseError::BadBatteryFrame));
        assert_eq!(decode(&[0x42, 0x61, 0x74]), Err(ParseError::BadBatteryFrame));
        assert_eq!(
            decode(&[0x42, 0x62, 0x74, 50]),
            Err(ParseError::BadBatteryFrame)
        );
        assert_eq!(
            decode(&[0x42, 0x61, 0x75, 50]),
            Err(ParseError::BadBatteryFrame)
        );
    }

    #[test]
    fn color_frames_decode_for_all_values() {
        for value in 0..=255u8 {
            assert_eq!(
                decode(&[0x43, 0x6f, 0x6c, value]),
                Ok(Notification::ColorFetched(value))
            );
        }
    }

    #[test]
    fn color_frames_with_wrong_magic_or_length_are_rejected() {
        assert_eq!(decode(&[0x43]), Err(ParseError::BadColorFrame));
        assert_eq!(decode(&[0x43, 0x6f, 0x6c]), Err(ParseError::BadColorFrame));
        assert_eq!(
            decode(&[0x43, 0x6f, 0x6d, 2]),
            Err(ParseError::BadColorFrame)
        );
    }

    #[test]
    fn stable_frames_carry_the_raw_vector() {
        assert_eq!(
            decode(&[0x53, 10, 20, 30]),
            Ok(Notification::Stable(Vector3 {
                x: 10,
                y: 20,
                z: 30
            }))
        );
        assert_eq!(
            decode(&[0x53, 0, 0, 255]),
            Ok(Notification::Stable(Vector3 { x: 0, y: 0, z: 255 }))
        );
    }

    #[test]
    fn stable_frames_require_exactly_four_bytes() {
        assert_eq!(decode(&[0x53]), Err(ParseError::BadRollFrame));
        assert_eq!(decode(&[0x53, 1, 2]), Err(ParseError::BadRollFrame));
        assert_eq!(decode(&[0x53, 1, 2, 3, 4]), Err(ParseError::BadRollFrame));
    }

    #[test]
    fn prefixed_stable_frames_map_to_their_kind() {
        assert_eq!(
            decode(&[0x46, 0x53, 1, 2, 3]),
            Ok(Notification::FakeStable(Vector3 { x: 1, y: 2, z: 3 }))
        );
        assert_eq!(
            decode(&[0x54, 0x53, 4, 5, 6]),
            Ok(Notification::TiltStable(Vector3 { x: 4, y: 5, z: 6 }))
        );
        assert_eq!(
            decode(&[0x4d, 0x53, 7, 8, 9]),
            Ok(Notification::MoveStable(Vector3 { x: 7, y: 8, z: 9 }))
        );
    }

    #[test]
    fn prefixed_stable_frames_require_inner_tag_and_length() {
        // Missing the inner 'S' tag.
        assert_eq!(decode(&[0x46, 1, 2, 3, 4]), Err(ParseError::BadRollFrame));
        assert_eq!(decode(&[0x54, 0x52, 1, 2, 3]), Err(ParseError::BadRollFrame));
        // Wrong remaining length.
        assert_eq!(decode(&[0x46, 0x53, 1, 2]), Err(ParseError::BadRollFrame));
        assert_eq!(
            decode(&[0x4d, 0x53, 1, 2, 3, 4]),
            Err(ParseError::BadRollFrame)
        );
        assert_eq!(decode(&[0x46]), Err(ParseError::BadRollFrame));
    }

    #[test]
    fn unknown_tags_are_reported() {
        assert_eq!(decode(&[0x99, 1, 2]), Err(ParseError::UnknownTag(0x99)));
        assert_eq!(decode(&[0x00]), Err(ParseError::UnknownTag(0x00)));
    }

    #[test]
    fn command_encoding_matches_the_wire_table() {
        assert_eq!(DiceCommand::RequestColor.encode(), vec![0x17]);
        assert_eq!(DiceCommand::RequestBatteryLevel.encode(), vec![0x03]);
        assert_eq!(
            DiceCommand::SetLed(vec![0xff, 0x00, 0x00]).encode(),
            vec![0x08, 0xff, 0x00, 0x00]
        );
        assert_eq!(DiceCommand::ToggleLed(vec![]).encode(), vec![0x10]);
    }

    #[test]
    fn characteristic_uuids_share_the_service_base() {
        let service = SERVICE_UUID.as_fields();
        let write = WRITE_CHAR_UUID.as_fields();
        let notify = NOTIFY_CHAR_UUID.as_fields();
        assert_eq!(service.0, 0x6e400001);
        assert_eq!(write.0, 0x6e400002);
        assert_eq!(notify.0, 0x6e400003);
        assert_eq!(service.3, write.3);
        assert_eq!(service.3, notify.3);
    }
}
