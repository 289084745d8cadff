//! Core data model shared by the codec, sessions, and registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque, stable identifier naming one physical die for the registry's
/// lifetime. Supplied by the platform collaborator at discovery time
/// (a peripheral identifier on CoreBluetooth, a formatted address on WinRT).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Raw orientation readout bytes from a stable-roll frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vector3 {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

/// Die shell colors as reported by the color notification.
///
/// The session keeps the raw byte; this is an interpretation helper for
/// callers that want the named variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceColor {
    Black,
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
}

impl DiceColor {
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Black),
            1 => Some(Self::Red),
            2 => Some(Self::Green),
            3 => Some(Self::Blue),
            4 => Some(Self::Yellow),
            5 => Some(Self::Orange),
            _ => None,
        }
    }
}

/// Typed events fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiceEvent {
    /// A die was discovered by the scan (or re-announced on scan restart).
    Found { id: DeviceId, name: String },
    /// The session reached `Active`: characteristics resolved, notifications on.
    Connected { id: DeviceId },
    /// Connection setup failed; the session has been removed.
    ConnectionFailed { id: DeviceId, error: ConnectionError },
    /// The die disconnected; the session has been removed.
    Disconnected { id: DeviceId, reason: Option<String> },
    /// The die left its resting face and a roll is in progress.
    RollStarted { id: DeviceId },
    /// The die reported its shell color (raw byte; see [`DiceColor`]).
    ColorFetched { id: DeviceId, value: u8 },
    /// The die reported its battery charge level.
    BatteryLevel { id: DeviceId, value: u8 },
    /// The die settled on a face.
    Stable { id: DeviceId, vector: Vector3 },
    /// Stable after a bump that did not change the face.
    FakeStable { id: DeviceId, vector: Vector3 },
    /// Stable but resting tilted against an obstacle.
    TiltStable { id: DeviceId, vector: Vector3 },
    /// Stable after being moved without rolling.
    MoveStable { id: DeviceId, vector: Vector3 },
    /// A notification payload did not decode; the session is unaffected.
    ParseError { id: DeviceId, error: ParseError },
    /// Scanning was halted; active sessions keep streaming.
    ListeningStopped,
}

/// Malformed notification payloads. Recovered locally and surfaced as a
/// [`DiceEvent::ParseError`]; never fatal to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty notification frame")]
    EmptyFrame,
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
    #[error("malformed battery frame")]
    BadBatteryFrame,
    #[error("malformed color frame")]
    BadColorFrame,
    #[error("malformed roll frame")]
    BadRollFrame,
}

/// Fatal connection-setup failures. The session transitions to
/// `Disconnected`, is removed from the registry, and a
/// [`DiceEvent::ConnectionFailed`] is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("dice service not present on the peripheral")]
    ServiceDiscoveryFailed,
    #[error("required write/notify characteristic missing")]
    MissingCharacteristic,
}

/// Caller misuse, returned as a value rather than crashing or silently
/// dropping the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("session is not ready to accept writes")]
    NotReady,
    #[error("no session exists for the given device identifier")]
    UnknownDevice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_round_trips_through_display() {
        let id = DeviceId::new("E7:12:0A:33:9F:01");
        assert_eq!(id.to_string(), "E7:12:0A:33:9F:01");
        assert_eq!(id.as_str(), "E7:12:0A:33:9F:01");
    }

    #[test]
    fn dice_color_maps_known_bytes() {
        assert_eq!(DiceColor::from_raw(0), Some(DiceColor::Black));
        assert_eq!(DiceColor::from_raw(3), Some(DiceColor::Blue));
        assert_eq!(DiceColor::from_raw(5), Some(DiceColor::Orange));
        assert_eq!(DiceColor::from_raw(6), None);
        assert_eq!(DiceColor::from_raw(99), None);
    }
}
