//! Device Registry Module
//!
//! Owns every live [`Session`], keyed by device identifier. Processes
//! discovery/connection/disconnection events from the platform collaborator,
//! controls scanning, and fans typed events out through the
//! [`EventDispatcher`]. The registry plus its sessions form one
//! serialized-access domain: the service facade wraps it in a single mutex,
//! so no two transitions ever interleave.

use crate::bluetooth::dispatcher::EventDispatcher;
use crate::bluetooth::platform::{BlePlatform, PlatformEvent};
use crate::bluetooth::protocol;
use crate::bluetooth::session::Session;
use crate::domain::models::{ConnectionError, DeviceId, DiceEvent, SendError};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct DeviceRegistry {
    platform: Arc<dyn BlePlatform>,
    dispatcher: EventDispatcher,
    sessions: HashMap<DeviceId, Session>,
    listening: bool,
}

impl DeviceRegistry {
    pub fn new(platform: Arc<dyn BlePlatform>, dispatcher: EventDispatcher) -> Self {
        Self {
            platform,
            dispatcher,
            sessions: HashMap::new(),
            listening: false,
        }
    }

    /// Single entry point for collaborator events.
    pub fn handle_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::DeviceFound { id, name } => self.on_device_found(id, name),
            PlatformEvent::Connected { id } => self.on_platform_connected(&id),
            PlatformEvent::Disconnected { id, reason } => {
                self.on_platform_disconnected(&id, reason)
            }
            PlatformEvent::ServicesDiscovered { id, services } => {
                self.on_services_discovered(&id, &services)
            }
            PlatformEvent::CharacteristicsDiscovered {
                id,
                characteristics,
                ..
            } => self.on_characteristics_discovered(&id, &characteristics),
            PlatformEvent::ValueUpdated {
                id,
                characteristic,
                bytes,
            } => self.on_notification(&id, characteristic, &bytes),
        }
    }

    /// A die advertised. Idempotent: the collaborator may redeliver
    /// discovery events, and re-advertisements of a known die are ignored.
    pub fn on_device_found(&mut self, id: DeviceId, name: String) {
        if self.sessions.contains_key(&id) {
            debug!(%id, "re-advertisement for known die ignored");
            return;
        }

        info!(%id, %name, "die discovered");
        self.sessions
            .insert(id.clone(), Session::new(id.clone(), name.clone()));
        self.dispatcher.dispatch(&DiceEvent::Found { id, name });
    }

    /// Caller-requested connect. Unknown ids are a logged no-op, covering
    /// discovery/teardown races.
    pub fn connect(&mut self, id: &DeviceId) {
        match self.sessions.get_mut(id) {
            Some(session) => session.connect_requested(self.platform.as_ref()),
            None => debug!(%id, "connect for unknown die ignored"),
        }
    }

    /// Caller-requested disconnect. Unknown ids are a logged no-op.
    pub fn disconnect(&mut self, id: &DeviceId) {
        match self.sessions.get_mut(id) {
            Some(session) => session.disconnect_requested(self.platform.as_ref()),
            None => debug!(%id, "disconnect for unknown die ignored"),
        }
    }

    pub fn on_platform_connected(&mut self, id: &DeviceId) {
        match self.sessions.get_mut(id) {
            Some(session) => session.platform_connected(self.platform.as_ref()),
            None => debug!(%id, "connected event for unknown die ignored"),
        }
    }

    pub fn on_services_discovered(&mut self, id: &DeviceId, services: &[Uuid]) {
        let Some(session) = self.sessions.get_mut(id) else {
            debug!(%id, "service discovery for unknown die ignored");
            return;
        };
        if let Err(error) = session.services_discovered(self.platform.as_ref(), services) {
            self.fail_connection(id, error);
        }
    }

    pub fn on_characteristics_discovered(&mut self, id: &DeviceId, characteristics: &[Uuid]) {
        let Some(session) = self.sessions.get_mut(id) else {
            debug!(%id, "characteristic discovery for unknown die ignored");
            return;
        };
        match session.characteristics_discovered(self.platform.as_ref(), characteristics) {
            Ok(Some(event)) => self.dispatcher.dispatch(&event),
            Ok(None) => {}
            Err(error) => self.fail_connection(id, error),
        }
    }

    pub fn on_notification(&mut self, id: &DeviceId, characteristic: Uuid, bytes: &[u8]) {
        let Some(session) = self.sessions.get_mut(id) else {
            debug!(%id, "notification for unknown die ignored");
            return;
        };
        if let Some(event) = session.notification_received(characteristic, bytes) {
            self.dispatcher.dispatch(&event);
        }
    }

    /// The collaborator confirmed a disconnect. The session is removed;
    /// every later operation naming this id is a no-op until rediscovery.
    pub fn on_platform_disconnected(&mut self, id: &DeviceId, reason: Option<String>) {
        let Some(mut session) = self.sessions.remove(id) else {
            debug!(%id, "disconnect event for unknown die ignored");
            return;
        };
        info!(%id, ?reason, "die disconnected");
        let event = session.platform_disconnected(reason);
        self.dispatcher.dispatch(&event);
    }

    /// Write an arbitrary payload to a die.
    pub fn send(&mut self, id: &DeviceId, payload: &[u8]) -> Result<(), SendError> {
        let session = self.sessions.get(id).ok_or(SendError::UnknownDevice)?;
        session.send(self.platform.as_ref(), payload)
    }

    /// Start or stop scanning.
    ///
    /// Starting is idempotent and re-announces every known die, so a
    /// subscriber attaching after earlier discoveries still observes them.
    /// Stopping halts the scan only: sessions already streaming are
    /// deliberately preserved.
    pub fn set_listening(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            if self.listening {
                return Ok(());
            }
            info!("starting scan for dice");
            self.platform.start_scan(protocol::SERVICE_UUID)?;
            self.listening = true;

            let known: Vec<(DeviceId, String)> = self
                .sessions
                .values()
                .map(|s| (s.id().clone(), s.name().to_string()))
                .collect();
            for (id, name) in known {
                self.dispatcher.dispatch(&DiceEvent::Found { id, name });
            }
        } else {
            if !self.listening {
                return Ok(());
            }
            info!("stopping scan, keeping live sessions");
            self.platform.stop_scan()?;
            self.listening = false;
            self.dispatcher.dispatch(&DiceEvent::ListeningStopped);
        }
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Fatal connection-setup error: tear the platform side down, drop the
    /// session, and raise `ConnectionFailed`.
    fn fail_connection(&mut self, id: &DeviceId, error: ConnectionError) {
        warn!(%id, %error, "connection failed");
        if let Some(mut session) = self.sessions.remove(id) {
            session.mark_failed();
        }
        self.platform.cancel_connection(id);
        self.dispatcher.dispatch(&DiceEvent::ConnectionFailed {
            id: id.clone(),
            error,
        });
    }
}
