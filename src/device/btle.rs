use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, Service as GattService};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{stream, StreamExt};
use log::{debug, info, warn};
use tokio::time::{sleep, Duration, Instant};
use uuid::Uuid;

use crate::device::constants::SCAN_POLL_DELAY;
use crate::device::transport::{Link, LinkEvents, Transport};
use crate::device::types::LinkEvent;
use crate::error::DeviceError;

pub struct BtleTransport {
    manager: Manager,
    scan_timeout: Duration,
}

impl BtleTransport {
    pub async fn new(scan_timeout: Duration) -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;
        Ok(BtleTransport { manager, scan_timeout })
    }
}

async fn start_scanning(manager: &Manager, service: Uuid) -> Result<Vec<Adapter>, DeviceError> {
    let adapters = manager.adapters().await?;
    if adapters.is_empty() {
        return Err(DeviceError::NoAdapter);
    }

    let filter = ScanFilter {
        services: vec![service],
    };

    for adapter in &adapters {
        info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        adapter.start_scan(filter.clone()).await?;
    }

    Ok(adapters)
}

async fn stop_scanning(adapters: &[Adapter]) {
    for adapter in adapters {
        if let Err(err) = adapter.stop_scan().await {
            warn!("Failed to stop scanning: {:?}", err);
        }
    }
}

async fn find_peripheral(adapters: &[Adapter], service: Uuid) -> Option<BtleLink> {
    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            },
        };

        for peripheral in peripherals {
            match peripheral.properties().await {
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                },
                Ok(None) => {
                    debug!("Peripheral has no properties");
                },
                Ok(Some(properties)) => {
                    // Some environments ignore the filter, so make sure to check the service uuid again
                    if properties.services.contains(&service) {
                        let name = properties.local_name.unwrap_or(properties.address.to_string());
                        info!(
                            "Using peripheral {} {:?} {}",
                            properties.address,
                            properties.address_type,
                            name,
                        );
                        return Some(BtleLink { name, adapter: adapter.clone(), peripheral });
                    }
                }
            }
        }
    }

    None
}

#[async_trait]
impl Transport for BtleTransport {
    type Link = BtleLink;

    /// There is no interactive chooser on the desktop: the first peripheral advertising the
    /// service within the scan timeout is chosen.
    async fn request_device(&self, service: Uuid) -> Result<BtleLink, DeviceError> {
        let adapters = start_scanning(&self.manager, service).await?;
        let deadline = Instant::now() + self.scan_timeout;

        let found = loop {
            if let Some(found) = find_peripheral(&adapters, service).await {
                break Some(found);
            }
            if Instant::now() >= deadline {
                break None;
            }
            debug!("No peripherals matched");
            sleep(Duration::from_millis(SCAN_POLL_DELAY)).await;
        };

        stop_scanning(&adapters).await;

        match found {
            Some(link) => Ok(link),
            None => {
                info!("No peripheral found within {:?}", self.scan_timeout);
                Err(DeviceError::NoDeviceChosen)
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct BtleLink {
    name: String,
    adapter: Adapter,
    peripheral: Peripheral,
}

#[async_trait]
impl Link for BtleLink {
    type Service = GattService;
    type Endpoint = Characteristic;

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        info!("Connecting to peripheral...");
        self.peripheral.connect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match self.peripheral.is_connected().await {
            Ok(connected) => connected,
            Err(err) => {
                warn!("Error checking for connection state: {:?}", err);
                false
            },
        }
    }

    async fn events(&self) -> Result<LinkEvents, DeviceError> {
        let notifications = self.peripheral
            .notifications()
            .await?
            .map(|data| LinkEvent::ValueChanged { uuid: data.uuid, value: data.value });

        let peripheral_id = self.peripheral.id();
        let disconnections = self.adapter
            .events()
            .await?
            .filter_map(move |event| {
                let result = match event {
                    CentralEvent::DeviceDisconnected(id) if id == peripheral_id => Some(LinkEvent::Disconnected),
                    _ => None,
                };
                async move { result }
            });

        Ok(stream::select(notifications, disconnections).boxed())
    }

    async fn get_service(&self, uuid: Uuid) -> Result<GattService, DeviceError> {
        info!("Discovering services...");
        self.peripheral.discover_services().await?;

        self.peripheral
            .services()
            .into_iter()
            .find(|service| service.uuid.eq(&uuid))
            .ok_or(DeviceError::MissingService)
    }

    async fn get_endpoint(&self, service: &GattService, uuid: Uuid) -> Result<Characteristic, DeviceError> {
        service.characteristics
            .iter()
            .find(|characteristic| characteristic.uuid.eq(&uuid))
            .cloned()
            .ok_or(DeviceError::MissingCharacteristic { uuid })
    }

    async fn read_value(&self, endpoint: &Characteristic) -> Result<Vec<u8>, DeviceError> {
        Ok(self.peripheral.read(endpoint).await?)
    }

    async fn start_notifications(&self, endpoint: &Characteristic) -> Result<(), DeviceError> {
        info!("Subscribing to characteristic {:?} {:?}", endpoint.service_uuid, endpoint.uuid);
        self.peripheral.subscribe(endpoint).await?;
        Ok(())
    }
}
