//! Bluetooth Module
//!
//! Provides the GoDice session core on top of a pluggable BLE platform.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     GoDiceService                        │
//! │   (Main coordinator - public API for the application)    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌────────────┐  ┌────────────┐  ┌────────────┐
//! │  Registry  │  │ Dispatcher │  │  Platform  │
//! │            │  │            │  │            │
//! │ - Sessions │  │ - Subscri- │  │ - scan     │
//! │ - Scan     │  │   bers     │  │ - connect  │
//! │   policy   │  │ - fan-out  │  │ - GATT     │
//! └──────┬─────┘  └────────────┘  └────────────┘
//!        │
//!        ▼
//! ┌────────────┐  ┌────────────┐
//! │  Session   │─▶│  Protocol  │
//! │ (state     │  │ (codec,    │
//! │  machine)  │  │  UUIDs)    │
//! └────────────┘  └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - GoDice wire protocol: UUIDs, command encoding, frame decoding
//! - [`session`] - Per-device connection lifecycle state machine
//! - [`registry`] - Device identifier → session map, scan policy, event fan-out
//! - [`dispatcher`] - Subscriber registration and synchronous event delivery
//! - [`platform`] - Collaborator trait and inbound platform events
//! - [`service`] - Main service coordinator
//! - [`winrt`] - WinRT adapter satisfying [`platform::BlePlatform`] (Windows only)

pub mod dispatcher;
pub mod platform;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod session;

#[cfg(windows)]
pub mod winrt;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main service for convenience
pub use service::GoDiceService;
