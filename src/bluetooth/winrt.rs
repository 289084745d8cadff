//! WinRT Platform Adapter
//!
//! Satisfies [`BlePlatform`] with the Windows Bluetooth stack: an
//! advertisement watcher for discovery and the GATT APIs for connection,
//! characteristic access, notifications, and writes. Inbound WinRT handler
//! callbacks are translated into [`PlatformEvent`]s on the adapter's channel;
//! every outbound call is dispatched onto the tokio runtime captured at
//! construction, keeping the trait fire-and-forget.
//!
//! Device identifiers are the formatted 48-bit Bluetooth address
//! (`"E7120A339F01"`).

use crate::bluetooth::platform::{BlePlatform, PlatformEvent};
use crate::domain::models::DeviceId;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, DataWriter, IBuffer};

struct DeviceEntry {
    device: BluetoothLEDevice,
    characteristics: HashMap<Uuid, GattCharacteristic>,
}

/// WinRT-backed collaborator. Construct on a thread inside a tokio runtime.
pub struct WinRtPlatform {
    sender: mpsc::UnboundedSender<PlatformEvent>,
    runtime: tokio::runtime::Handle,
    watcher: Mutex<Option<BluetoothLEAdvertisementWatcher>>,
    // Shared with spawned tasks, which outlive the &self borrow.
    devices: Arc<Mutex<HashMap<DeviceId, DeviceEntry>>>,
}

impl WinRtPlatform {
    pub fn new(sender: mpsc::UnboundedSender<PlatformEvent>) -> Result<Self> {
        Ok(Self {
            sender,
            runtime: tokio::runtime::Handle::try_current()?,
            watcher: Mutex::new(None),
            devices: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn characteristic(&self, id: &DeviceId, uuid: Uuid) -> Option<GattCharacteristic> {
        self.devices
            .lock()
            .get(id)
            .and_then(|entry| entry.characteristics.get(&uuid).cloned())
    }

    async fn connect_device(
        sender: mpsc::UnboundedSender<PlatformEvent>,
        id: DeviceId,
        address: u64,
    ) -> Result<BluetoothLEDevice> {
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address)?.await?;

        // Link drops are reported through the status handler; the connect
        // itself completes once the device object resolves.
        let status_sender = sender.clone();
        let status_id = id.clone();
        let status_handler =
            TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                if let Some(dev) = dev.as_ref() {
                    if let Ok(status) = dev.ConnectionStatus() {
                        if status == BluetoothConnectionStatus::Disconnected {
                            let _ = status_sender.send(PlatformEvent::Disconnected {
                                id: status_id.clone(),
                                reason: Some("link lost".to_string()),
                            });
                        }
                    }
                }
                Ok(())
            });
        device.ConnectionStatusChanged(&status_handler)?;

        let _ = sender.send(PlatformEvent::Connected { id });
        Ok(device)
    }

    async fn discover_services_async(
        device: &BluetoothLEDevice,
        filter: Uuid,
    ) -> Result<Vec<Uuid>> {
        let result = device
            .GetGattServicesForUuidAsync(guid_from_uuid(filter))?
            .await?;
        if result.Status()? != GattCommunicationStatus::Success {
            anyhow::bail!("GATT service query failed: {:?}", result.Status()?);
        }

        let services = result.Services()?;
        let mut uuids = Vec::new();
        for i in 0..services.Size()? {
            uuids.push(uuid_from_guid(&services.GetAt(i)?.Uuid()?));
        }
        Ok(uuids)
    }

    async fn discover_characteristics_async(
        device: &BluetoothLEDevice,
        service: Uuid,
        filter: &[Uuid],
    ) -> Result<Vec<(Uuid, GattCharacteristic)>> {
        let services_result = device
            .GetGattServicesForUuidAsync(guid_from_uuid(service))?
            .await?;
        if services_result.Status()? != GattCommunicationStatus::Success {
            anyhow::bail!("GATT service query failed");
        }
        let services = services_result.Services()?;
        if services.Size()? == 0 {
            anyhow::bail!("service vanished between discovery and enumeration");
        }

        let gatt_service = services.GetAt(0)?;
        let access = gatt_service.RequestAccessAsync()?.await?;
        debug!(?access, "service access requested");

        let chars_result = gatt_service.GetCharacteristicsAsync()?.await?;
        if chars_result.Status()? != GattCommunicationStatus::Success {
            anyhow::bail!("characteristic enumeration failed");
        }

        let characteristics = chars_result.Characteristics()?;
        let mut found = Vec::new();
        for i in 0..characteristics.Size()? {
            let characteristic = characteristics.GetAt(i)?;
            let uuid = uuid_from_guid(&characteristic.Uuid()?);
            if filter.contains(&uuid) {
                found.push((uuid, characteristic));
            }
        }
        Ok(found)
    }

    async fn enable_notifications(
        sender: mpsc::UnboundedSender<PlatformEvent>,
        id: DeviceId,
        uuid: Uuid,
        characteristic: GattCharacteristic,
    ) -> Result<()> {
        let status = characteristic
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            )?
            .await?;
        if status != GattCommunicationStatus::Success {
            anyhow::bail!("CCCD write returned {:?}", status);
        }

        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    if let Ok(value) = args.CharacteristicValue() {
                        if let Ok(bytes) = buffer_to_vec(&value) {
                            let _ = sender.send(PlatformEvent::ValueUpdated {
                                id: id.clone(),
                                characteristic: uuid,
                                bytes,
                            });
                        }
                    }
                }
                Ok(())
            },
        );
        characteristic.ValueChanged(&handler)?;
        Ok(())
    }
}

impl BlePlatform for WinRtPlatform {
    fn start_scan(&self, service_filter: Uuid) -> Result<()> {
        let mut slot = self.watcher.lock();
        if slot.is_some() {
            return Ok(());
        }

        info!(%service_filter, "starting BLE advertisement watcher");
        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let sender = self.sender.clone();
        let target = guid_from_uuid(service_filter);
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let adv = args.Advertisement()?;
                    let service_uuids = adv.ServiceUuids()?;

                    let mut matched = false;
                    for i in 0..service_uuids.Size()? {
                        if service_uuids.GetAt(i)? == target {
                            matched = true;
                            break;
                        }
                    }

                    if matched {
                        let name = adv.LocalName()?.to_string();
                        let address = args.BluetoothAddress()?;
                        let _ = sender.send(PlatformEvent::DeviceFound {
                            id: DeviceId::new(format!("{address:012X}")),
                            name,
                        });
                    }
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher.Start()?;
        *slot = Some(watcher);
        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        if let Some(watcher) = self.watcher.lock().take() {
            info!("stopping BLE advertisement watcher");
            watcher.Stop()?;
        }
        Ok(())
    }

    fn connect(&self, id: &DeviceId) {
        let Some(address) = parse_address(id) else {
            warn!(%id, "identifier is not a Bluetooth address");
            return;
        };

        let sender = self.sender.clone();
        let id = id.clone();
        let devices = Arc::clone(&self.devices);
        self.runtime.spawn(async move {
            match Self::connect_device(sender.clone(), id.clone(), address).await {
                Ok(device) => {
                    devices.lock().insert(
                        id,
                        DeviceEntry {
                            device,
                            characteristics: HashMap::new(),
                        },
                    );
                }
                Err(error) => {
                    warn!(%id, %error, "connect failed");
                    let _ = sender.send(PlatformEvent::Disconnected {
                        id,
                        reason: Some(error.to_string()),
                    });
                }
            }
        });
    }

    fn cancel_connection(&self, id: &DeviceId) {
        if let Some(entry) = self.devices.lock().remove(id) {
            let _ = entry.device.Close();
            let _ = self.sender.send(PlatformEvent::Disconnected {
                id: id.clone(),
                reason: None,
            });
        }
    }

    fn discover_services(&self, id: &DeviceId, filter: Uuid) {
        let Some(device) = self.devices.lock().get(id).map(|e| e.device.clone()) else {
            warn!(%id, "service discovery for unknown device");
            return;
        };

        let sender = self.sender.clone();
        let id = id.clone();
        self.runtime.spawn(async move {
            let services = match Self::discover_services_async(&device, filter).await {
                Ok(services) => services,
                Err(error) => {
                    warn!(%id, %error, "service discovery failed");
                    Vec::new()
                }
            };
            let _ = sender.send(PlatformEvent::ServicesDiscovered { id, services });
        });
    }

    fn discover_characteristics(&self, id: &DeviceId, service: Uuid, filter: &[Uuid]) {
        let Some(device) = self.devices.lock().get(id).map(|e| e.device.clone()) else {
            warn!(%id, "characteristic discovery for unknown device");
            return;
        };

        let sender = self.sender.clone();
        let id = id.clone();
        let filter = filter.to_vec();
        let devices = Arc::clone(&self.devices);
        self.runtime.spawn(async move {
            let found = match Self::discover_characteristics_async(&device, service, &filter).await
            {
                Ok(found) => found,
                Err(error) => {
                    warn!(%id, %error, "characteristic discovery failed");
                    Vec::new()
                }
            };

            let uuids: Vec<Uuid> = found.iter().map(|(uuid, _)| *uuid).collect();
            if let Some(entry) = devices.lock().get_mut(&id) {
                entry.characteristics.extend(found);
            }
            let _ = sender.send(PlatformEvent::CharacteristicsDiscovered {
                id,
                service,
                characteristics: uuids,
            });
        });
    }

    fn set_notify(&self, id: &DeviceId, characteristic: Uuid, enabled: bool) {
        if !enabled {
            debug!(%id, "notification disable requested, ignoring");
            return;
        }
        let Some(gatt) = self.characteristic(id, characteristic) else {
            warn!(%id, %characteristic, "set_notify for unresolved characteristic");
            return;
        };

        let sender = self.sender.clone();
        let id = id.clone();
        self.runtime.spawn(async move {
            if let Err(error) =
                Self::enable_notifications(sender, id.clone(), characteristic, gatt).await
            {
                warn!(%id, %error, "enabling notifications failed");
            }
        });
    }

    fn write_value(&self, id: &DeviceId, characteristic: Uuid, payload: &[u8]) {
        let Some(gatt) = self.characteristic(id, characteristic) else {
            warn!(%id, %characteristic, "write for unresolved characteristic");
            return;
        };

        let id = id.clone();
        let payload = payload.to_vec();
        self.runtime.spawn(async move {
            let write = || -> Result<()> {
                let writer = DataWriter::new()?;
                writer.WriteBytes(&payload)?;
                let buffer = writer.DetachBuffer()?;
                let _ = gatt.WriteValueAsync(&buffer)?;
                Ok(())
            };
            if let Err(error) = write() {
                warn!(%id, %error, "characteristic write failed");
            }
        });
    }
}

fn parse_address(id: &DeviceId) -> Option<u64> {
    u64::from_str_radix(id.as_str(), 16).ok()
}

fn guid_from_uuid(uuid: Uuid) -> GUID {
    let (d1, d2, d3, d4) = uuid.as_fields();
    GUID {
        data1: d1,
        data2: d2,
        data3: d3,
        data4: *d4,
    }
}

fn uuid_from_guid(guid: &GUID) -> Uuid {
    Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
}

fn buffer_to_vec(buffer: &IBuffer) -> windows::core::Result<Vec<u8>> {
    let reader = DataReader::FromBuffer(buffer)?;
    let length = reader.UnconsumedBufferLength()? as usize;
    let mut bytes = vec![0u8; length];
    reader.ReadBytes(&mut bytes)?;
    Ok(bytes)
}
