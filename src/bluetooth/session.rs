//! Dice Session Module
//!
//! Per-device state machine tracking one die from discovery through
//! disconnection. Transitions are driven exclusively by collaborator events
//! fed in by the registry; every outbound reaction (service discovery,
//! notify subscription, the color auto-fetch) is forwarded through the
//! [`BlePlatform`] handle the registry passes in.

use crate::bluetooth::platform::BlePlatform;
use crate::bluetooth::protocol::{self, DiceCommand, Notification};
use crate::domain::models::{ConnectionError, DeviceId, DiceEvent, SendError};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Connection lifecycle states.
///
/// Monotonic except for `Disconnected`, which is terminal and reachable from
/// every other state on failure or explicit teardown. A session is never
/// reused after reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Discovered,
    Connecting,
    ServicesDiscovering,
    CharacteristicsReady,
    Active,
    Disconnecting,
    Disconnected,
}

/// One device session. Created on discovery, populated during connection
/// setup, destroyed by the registry on disconnect or failure.
pub struct Session {
    id: DeviceId,
    name: String,
    state: SessionState,
    color: Option<u8>,
    write_char: Option<Uuid>,
    notify_char: Option<Uuid>,
}

impl Session {
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: SessionState::Discovered,
            color: None,
            write_char: None,
            notify_char: None,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Raw color byte, unset until a color notification has been observed.
    pub fn color(&self) -> Option<u8> {
        self.color
    }

    /// Caller asked to connect. Forwards to the platform from `Discovered`;
    /// repeated requests while already connecting are ignored.
    pub fn connect_requested(&mut self, platform: &dyn BlePlatform) {
        match self.state {
            SessionState::Discovered => {
                debug!(id = %self.id, "connecting");
                self.state = SessionState::Connecting;
                platform.connect(&self.id);
            }
            state => debug!(id = %self.id, ?state, "connect request ignored in current state"),
        }
    }

    /// The platform reports the link is up; ask it for the dice service.
    pub fn platform_connected(&mut self, platform: &dyn BlePlatform) {
        match self.state {
            SessionState::Connecting => {
                debug!(id = %self.id, "link established, discovering services");
                self.state = SessionState::ServicesDiscovering;
                platform.discover_services(&self.id, protocol::SERVICE_UUID);
            }
            state => debug!(id = %self.id, ?state, "connected event ignored in current state"),
        }
    }

    /// Service enumeration finished. Absence of the dice service is fatal;
    /// otherwise request the write/notify characteristics. Results arriving
    /// in any other state (a disconnect raced the callback) are ignored.
    pub fn services_discovered(
        &mut self,
        platform: &dyn BlePlatform,
        services: &[Uuid],
    ) -> Result<(), ConnectionError> {
        if self.state != SessionState::ServicesDiscovering {
            debug!(id = %self.id, state = ?self.state, "service discovery result ignored in current state");
            return Ok(());
        }

        if !services.contains(&protocol::SERVICE_UUID) {
            warn!(id = %self.id, "dice service not found on peripheral");
            return Err(ConnectionError::ServiceDiscoveryFailed);
        }

        debug!(id = %self.id, "dice service found, discovering characteristics");
        self.state = SessionState::CharacteristicsReady;
        platform.discover_characteristics(
            &self.id,
            protocol::SERVICE_UUID,
            &[protocol::WRITE_CHAR_UUID, protocol::NOTIFY_CHAR_UUID],
        );
        Ok(())
    }

    /// Characteristic enumeration finished. Both the write and notify
    /// characteristics must be present; on success, notifications are
    /// enabled and the color is auto-fetched once per session lifetime.
    /// Returns the `Connected` event to emit, or `None` when the result
    /// arrived in any other state (a disconnect raced the callback) and was
    /// ignored: a torn-down session must never come back to life.
    pub fn characteristics_discovered(
        &mut self,
        platform: &dyn BlePlatform,
        characteristics: &[Uuid],
    ) -> Result<Option<DiceEvent>, ConnectionError> {
        if self.state != SessionState::CharacteristicsReady {
            debug!(id = %self.id, state = ?self.state, "characteristic discovery result ignored in current state");
            return Ok(None);
        }

        let write = characteristics
            .iter()
            .find(|&&c| c == protocol::WRITE_CHAR_UUID);
        let notify = characteristics
            .iter()
            .find(|&&c| c == protocol::NOTIFY_CHAR_UUID);

        let (Some(&write), Some(&notify)) = (write, notify) else {
            warn!(id = %self.id, "write or notify characteristic missing");
            return Err(ConnectionError::MissingCharacteristic);
        };

        self.write_char = Some(write);
        self.notify_char = Some(notify);
        platform.set_notify(&self.id, notify, true);

        if self.color.is_none() {
            trace!(id = %self.id, "requesting die color");
            platform.write_value(&self.id, write, &DiceCommand::RequestColor.encode());
        }

        debug!(id = %self.id, "session active");
        self.state = SessionState::Active;
        Ok(Some(DiceEvent::Connected {
            id: self.id.clone(),
        }))
    }

    /// A value update arrived. Only payloads from the resolved notify
    /// characteristic are decoded; anything else is ignored. Decode failures
    /// surface as a `ParseError` event and never change state.
    pub fn notification_received(&mut self, characteristic: Uuid, bytes: &[u8]) -> Option<DiceEvent> {
        match self.state {
            SessionState::CharacteristicsReady | SessionState::Active => {}
            state => {
                debug!(id = %self.id, ?state, "notification ignored in current state");
                return None;
            }
        }
        if self.notify_char != Some(characteristic) {
            debug!(id = %self.id, %characteristic, "value update on unexpected characteristic ignored");
            return None;
        }

        let id = self.id.clone();
        match protocol::decode(bytes) {
            Ok(Notification::RollStarted) => Some(DiceEvent::RollStarted { id }),
            Ok(Notification::BatteryLevel(value)) => Some(DiceEvent::BatteryLevel { id, value }),
            Ok(Notification::ColorFetched(value)) => {
                self.color = Some(value);
                Some(DiceEvent::ColorFetched { id, value })
            }
            Ok(Notification::Stable(vector)) => Some(DiceEvent::Stable { id, vector }),
            Ok(Notification::FakeStable(vector)) => Some(DiceEvent::FakeStable { id, vector }),
            Ok(Notification::TiltStable(vector)) => Some(DiceEvent::TiltStable { id, vector }),
            Ok(Notification::MoveStable(vector)) => Some(DiceEvent::MoveStable { id, vector }),
            Err(error) => {
                warn!(id = %id, %error, frame = ?bytes, "undecodable notification");
                Some(DiceEvent::ParseError { id, error })
            }
        }
    }

    /// Caller asked to disconnect. Forwards teardown to the platform;
    /// idempotent once already tearing down.
    pub fn disconnect_requested(&mut self, platform: &dyn BlePlatform) {
        match self.state {
            SessionState::Disconnecting | SessionState::Disconnected => {
                trace!(id = %self.id, "disconnect request already in progress");
            }
            _ => {
                debug!(id = %self.id, "disconnecting");
                self.state = SessionState::Disconnecting;
                platform.cancel_connection(&self.id);
            }
        }
    }

    /// The platform confirmed teardown (or the die dropped the link).
    /// Returns the `Disconnected` event to emit.
    pub fn platform_disconnected(&mut self, reason: Option<String>) -> DiceEvent {
        self.state = SessionState::Disconnected;
        DiceEvent::Disconnected {
            id: self.id.clone(),
            reason,
        }
    }

    /// Mark the session dead after a fatal connection-setup error.
    pub fn mark_failed(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// Write an arbitrary payload to the die. Only permitted once the write
    /// characteristic has been resolved.
    pub fn send(&self, platform: &dyn BlePlatform, payload: &[u8]) -> Result<(), SendError> {
        match (self.state, self.write_char) {
            (SessionState::CharacteristicsReady | SessionState::Active, Some(write)) => {
                platform.write_value(&self.id, write, payload);
                Ok(())
            }
            _ => Err(SendError::NotReady),
        }
    }
}
