//! Platform Collaborator Boundary
//!
//! The capability set the core consumes from a platform Bluetooth stack:
//! scan, connect, discover, write, notify. Outbound calls are fire-and-forget;
//! completions arrive later as [`PlatformEvent`]s on the channel the adapter
//! was constructed with, the same way the WinRT handlers push events here.

use crate::domain::models::DeviceId;
use anyhow::Result;
use uuid::Uuid;

/// Outbound capability set satisfied by a per-platform adapter.
///
/// No method blocks: a `connect` call returns immediately and its outcome is
/// reported later as [`PlatformEvent::Connected`] or
/// [`PlatformEvent::Disconnected`]. There are no timeouts at this layer; a
/// connection attempt that never completes is resolved only by an explicit
/// `cancel_connection`.
pub trait BlePlatform: Send + Sync {
    /// Start advertising discovery filtered to the given service UUID.
    fn start_scan(&self, service_filter: Uuid) -> Result<()>;

    /// Stop advertising discovery. Established connections are unaffected.
    fn stop_scan(&self) -> Result<()>;

    /// Begin connecting to a previously discovered device.
    fn connect(&self, id: &DeviceId);

    /// Tear down a connection or abort an in-flight attempt.
    fn cancel_connection(&self, id: &DeviceId);

    /// Enumerate GATT services matching the filter.
    fn discover_services(&self, id: &DeviceId, filter: Uuid);

    /// Enumerate characteristics of a service matching the filter.
    fn discover_characteristics(&self, id: &DeviceId, service: Uuid, filter: &[Uuid]);

    /// Enable or disable value-changed notifications on a characteristic.
    fn set_notify(&self, id: &DeviceId, characteristic: Uuid, enabled: bool);

    /// Write a payload to a characteristic.
    fn write_value(&self, id: &DeviceId, characteristic: Uuid, payload: &[u8]);
}

/// Inbound events produced by the platform adapter.
///
/// Events for a single device arrive in the order the platform produced
/// them; events across different devices may interleave arbitrarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    DeviceFound {
        id: DeviceId,
        name: String,
    },
    Connected {
        id: DeviceId,
    },
    Disconnected {
        id: DeviceId,
        reason: Option<String>,
    },
    ServicesDiscovered {
        id: DeviceId,
        services: Vec<Uuid>,
    },
    CharacteristicsDiscovered {
        id: DeviceId,
        service: Uuid,
        characteristics: Vec<Uuid>,
    },
    ValueUpdated {
        id: DeviceId,
        characteristic: Uuid,
        bytes: Vec<u8>,
    },
}
