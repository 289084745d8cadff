//! GoDice Service Module
//!
//! Main service that coordinates scanning, sessions, and event delivery.
//! Wraps the [`DeviceRegistry`] in a single mutex: the registry and every
//! session it owns form one serialized-access domain, and both caller
//! operations and collaborator events funnel through that lock, so no two
//! state transitions ever interleave. Nothing here blocks the caller beyond
//! that short critical section.

use crate::bluetooth::dispatcher::{DiceEventSubscriber, EventDispatcher, SubscriptionId};
use crate::bluetooth::platform::{BlePlatform, PlatformEvent};
use crate::bluetooth::protocol::DiceCommand;
use crate::bluetooth::registry::DeviceRegistry;
use crate::domain::models::{DeviceId, SendError};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Public entry point for applications talking to GoDice dice.
pub struct GoDiceService {
    registry: Arc<Mutex<DeviceRegistry>>,
    dispatcher: EventDispatcher,
}

impl GoDiceService {
    pub fn new(platform: Arc<dyn BlePlatform>) -> Self {
        let dispatcher = EventDispatcher::new();
        let registry = Arc::new(Mutex::new(DeviceRegistry::new(
            platform,
            dispatcher.clone(),
        )));
        Self {
            registry,
            dispatcher,
        }
    }

    /// Channel pair connecting a platform adapter to [`Self::spawn_event_pump`].
    pub fn event_channel() -> (
        mpsc::UnboundedSender<PlatformEvent>,
        mpsc::UnboundedReceiver<PlatformEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    /// Drain collaborator events into the registry on a background task.
    /// The task ends when every sender side of the channel is dropped.
    pub fn spawn_event_pump(
        &self,
        mut events: mpsc::UnboundedReceiver<PlatformEvent>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                registry.lock().handle_event(event);
            }
            debug!("platform event channel closed");
        })
    }

    /// Apply one collaborator event synchronously. The pump uses this
    /// internally; tests and single-threaded hosts can call it directly.
    pub fn handle_platform_event(&self, event: PlatformEvent) {
        self.registry.lock().handle_event(event);
    }

    /// Register a subscriber for all dice events.
    ///
    /// Delivery is synchronous on the registry's processing context, while
    /// the registry lock is held. Subscribers that need to issue service
    /// calls in reaction to an event must defer them (e.g. over a channel)
    /// rather than calling back into the service from the callback.
    pub fn subscribe(&self, subscriber: Arc<dyn DiceEventSubscriber>) -> SubscriptionId {
        self.dispatcher.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Begin connecting to a discovered die. Unknown ids are a no-op.
    pub fn connect(&self, id: &DeviceId) {
        self.registry.lock().connect(id);
    }

    /// Tear down a die's connection. Unknown ids are a no-op.
    pub fn disconnect(&self, id: &DeviceId) {
        self.registry.lock().disconnect(id);
    }

    /// Write a raw payload to a die's write characteristic.
    pub fn send(&self, id: &DeviceId, payload: &[u8]) -> Result<(), SendError> {
        self.registry.lock().send(id, payload)
    }

    /// Encode and send a protocol command.
    pub fn send_command(&self, id: &DeviceId, command: &DiceCommand) -> Result<(), SendError> {
        self.send(id, &command.encode())
    }

    /// Start or stop scanning. Stopping never interrupts dice that are
    /// already streaming.
    pub fn set_listening(&self, enabled: bool) -> Result<()> {
        self.registry.lock().set_listening(enabled)
    }

    pub fn is_listening(&self) -> bool {
        self.registry.lock().is_listening()
    }
}
