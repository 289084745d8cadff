//! Shared test doubles for the session/registry test modules.

use crate::bluetooth::dispatcher::DiceEventSubscriber;
use crate::bluetooth::platform::BlePlatform;
use crate::domain::models::{DeviceId, DiceEvent};
use anyhow::Result;
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    StartScan(Uuid),
    StopScan,
    Connect(DeviceId),
    CancelConnection(DeviceId),
    DiscoverServices(DeviceId, Uuid),
    DiscoverCharacteristics(DeviceId, Uuid, Vec<Uuid>),
    SetNotify(DeviceId, Uuid, bool),
    WriteValue(DeviceId, Uuid, Vec<u8>),
}

/// Platform double that records every outbound call.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
}

impl RecordingPlatform {
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().push(call);
    }
}

impl BlePlatform for RecordingPlatform {
    fn start_scan(&self, service_filter: Uuid) -> Result<()> {
        self.record(PlatformCall::StartScan(service_filter));
        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        self.record(PlatformCall::StopScan);
        Ok(())
    }

    fn connect(&self, id: &DeviceId) {
        self.record(PlatformCall::Connect(id.clone()));
    }

    fn cancel_connection(&self, id: &DeviceId) {
        self.record(PlatformCall::CancelConnection(id.clone()));
    }

    fn discover_services(&self, id: &DeviceId, filter: Uuid) {
        self.record(PlatformCall::DiscoverServices(id.clone(), filter));
    }

    fn discover_characteristics(&self, id: &DeviceId, service: Uuid, filter: &[Uuid]) {
        self.record(PlatformCall::DiscoverCharacteristics(
            id.clone(),
            service,
            filter.to_vec(),
        ));
    }

    fn set_notify(&self, id: &DeviceId, characteristic: Uuid, enabled: bool) {
        self.record(PlatformCall::SetNotify(id.clone(), characteristic, enabled));
    }

    fn write_value(&self, id: &DeviceId, characteristic: Uuid, payload: &[u8]) {
        self.record(PlatformCall::WriteValue(
            id.clone(),
            characteristic,
            payload.to_vec(),
        ));
    }
}

/// Subscriber double that collects every dispatched event.
#[derive(Default)]
pub struct CollectingSubscriber {
    events: Mutex<Vec<DiceEvent>>,
}

impl CollectingSubscriber {
    pub fn events(&self) -> Vec<DiceEvent> {
        self.events.lock().clone()
    }
}

impl DiceEventSubscriber for CollectingSubscriber {
    fn on_event(&self, event: &DiceEvent) {
        self.events.lock().push(event.clone());
    }
}
