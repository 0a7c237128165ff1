//! In-memory transport for tests.
//!
//! A [`MockLink`] serves scripted payloads per characteristic, can be told to fail, and counts the
//! calls made on it. Link events are injected with [`MockLink::push`] and
//! [`MockLink::disconnect`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::future::pending;
use futures::StreamExt;
use uuid::Uuid;

use crate::device::constants::BATTERY_MONITOR_SERVICE;
use crate::device::transport::{Link, LinkEvents, Transport};
use crate::device::types::LinkEvent;
use crate::error::DeviceError;

#[derive(Debug, Default)]
struct MockLinkInner {
    connected: bool,
    fail_connect: bool,
    services: Vec<Uuid>,
    payloads: HashMap<Uuid, Vec<u8>>,
    failing_reads: HashSet<Uuid>,
    hanging_reads: HashSet<Uuid>,
    event_senders: Vec<UnboundedSender<LinkEvent>>,
    connect_count: u32,
    read_count: u32,
    notifying: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct MockLink {
    name: String,
    inner: Arc<Mutex<MockLinkInner>>,
}

impl MockLink {
    pub fn new(name: &str) -> Self {
        let inner = MockLinkInner {
            services: vec![BATTERY_MONITOR_SERVICE],
            ..Default::default()
        };

        MockLink {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockLinkInner> {
        self.inner.lock().expect("Failed to lock MockLink inner")
    }

    pub fn set_payload(&self, uuid: Uuid, value: &[u8]) {
        self.lock().payloads.insert(uuid, value.to_vec());
    }

    pub fn fail_reads(&self, uuid: Uuid, fail: bool) {
        let mut inner = self.lock();
        if fail {
            inner.failing_reads.insert(uuid);
        } else {
            inner.failing_reads.remove(&uuid);
        }
    }

    /// Reads of `uuid` never complete while `hang` is set.
    pub fn hang_reads(&self, uuid: Uuid, hang: bool) {
        let mut inner = self.lock();
        if hang {
            inner.hanging_reads.insert(uuid);
        } else {
            inner.hanging_reads.remove(&uuid);
        }
    }

    pub fn fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn remove_services(&self) {
        self.lock().services.clear();
    }

    pub fn connect_count(&self) -> u32 {
        self.lock().connect_count
    }

    pub fn read_count(&self) -> u32 {
        self.lock().read_count
    }

    pub fn notifying(&self) -> Vec<Uuid> {
        self.lock().notifying.clone()
    }

    /// Emit a value notification, as if the peripheral pushed it.
    pub fn push(&self, uuid: Uuid, value: &[u8]) {
        self.emit(LinkEvent::ValueChanged { uuid, value: value.to_vec() });
    }

    /// Drop the connection, as if the peripheral went out of range.
    pub fn disconnect(&self) {
        self.lock().connected = false;
        self.emit(LinkEvent::Disconnected);
    }

    fn emit(&self, event: LinkEvent) {
        let mut inner = self.lock();
        inner.event_senders.retain(|sender| sender.unbounded_send(event.clone()).is_ok());
    }
}

#[async_trait]
impl Link for MockLink {
    type Service = Uuid;
    type Endpoint = Uuid;

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        inner.connect_count += 1;
        if inner.fail_connect {
            return Err(DeviceError::Mock("connect failed".to_string()));
        }
        inner.connected = true;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn events(&self) -> Result<LinkEvents, DeviceError> {
        let (tx, rx) = unbounded();
        self.lock().event_senders.push(tx);
        Ok(rx.boxed())
    }

    async fn get_service(&self, uuid: Uuid) -> Result<Uuid, DeviceError> {
        if self.lock().services.contains(&uuid) {
            Ok(uuid)
        } else {
            Err(DeviceError::MissingService)
        }
    }

    async fn get_endpoint(&self, _service: &Uuid, uuid: Uuid) -> Result<Uuid, DeviceError> {
        Ok(uuid)
    }

    async fn read_value(&self, endpoint: &Uuid) -> Result<Vec<u8>, DeviceError> {
        let hang = {
            let mut inner = self.lock();
            inner.read_count += 1;
            if !inner.connected {
                return Err(DeviceError::Mock("not connected".to_string()));
            }
            if inner.failing_reads.contains(endpoint) {
                return Err(DeviceError::Mock(format!("read of {} failed", endpoint)));
            }
            inner.hanging_reads.contains(endpoint)
        };

        if hang {
            pending::<()>().await;
        }

        self.lock()
            .payloads
            .get(endpoint)
            .cloned()
            .ok_or(DeviceError::MissingCharacteristic { uuid: *endpoint })
    }

    async fn start_notifications(&self, endpoint: &Uuid) -> Result<(), DeviceError> {
        self.lock().notifying.push(*endpoint);
        Ok(())
    }
}

/// Offers a single [`MockLink`] from its chooser, or none to simulate a cancelled chooser.
#[derive(Debug, Clone)]
pub struct MockTransport {
    link: Option<MockLink>,
    request_count: Arc<Mutex<u32>>,
}

impl MockTransport {
    pub fn new(link: MockLink) -> Self {
        MockTransport { link: Some(link), request_count: Arc::new(Mutex::new(0)) }
    }

    pub fn cancelled() -> Self {
        MockTransport { link: None, request_count: Arc::new(Mutex::new(0)) }
    }

    pub fn request_count(&self) -> u32 {
        *self.request_count.lock().expect("Failed to lock request count")
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Link = MockLink;

    async fn request_device(&self, _service: Uuid) -> Result<MockLink, DeviceError> {
        *self.request_count.lock().expect("Failed to lock request count") += 1;

        match &self.link {
            Some(link) => Ok(link.clone()),
            None => Err(DeviceError::NoDeviceChosen),
        }
    }
}
