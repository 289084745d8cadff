//! GoDice BLE Core
//!
//! Discovers, connects to, and streams data from GoDice Bluetooth-LE
//! electronic dice, decoding their binary notification protocol into typed
//! [`DiceEvent`]s and managing multiple simultaneous device sessions behind
//! stable per-device identifiers.
//!
//! The platform Bluetooth stack (WinRT, CoreBluetooth, ...) is consumed
//! through the [`BlePlatform`] trait; everything above that boundary is
//! platform-neutral and testable without radio hardware.

pub mod bluetooth;
pub mod domain;
pub mod infrastructure;

pub use bluetooth::dispatcher::{DiceCallbacks, DiceEventSubscriber, EventDispatcher, SubscriptionId};
pub use bluetooth::platform::{BlePlatform, PlatformEvent};
pub use bluetooth::protocol::{self, DiceCommand};
pub use bluetooth::service::GoDiceService;
pub use bluetooth::session::SessionState;
pub use domain::models::{
    ConnectionError, DeviceId, DiceColor, DiceEvent, ParseError, SendError, Vector3,
};
