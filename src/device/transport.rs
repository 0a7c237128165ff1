//! The capabilities the session client needs from a bluetooth stack.
//!
//! [`crate::device::btle`] implements these on top of btleplug, [`crate::device::mock`] implements
//! them in memory for tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::device::types::LinkEvent;
use crate::error::DeviceError;

pub type LinkEvents = BoxStream<'static, LinkEvent>;

#[async_trait]
pub trait Transport: Send + Sync {
    type Link: Link;

    /// Choose a peripheral that advertises `service`.
    ///
    /// Returns [`DeviceError::NoDeviceChosen`] if no peripheral was chosen.
    async fn request_device(&self, service: Uuid) -> Result<Self::Link, DeviceError>;
}

/// A single peripheral.
#[async_trait]
pub trait Link: Clone + Send + Sync + 'static {
    type Service: Send + Sync;
    type Endpoint: Clone + Send + Sync + 'static;

    fn name(&self) -> String;

    async fn connect(&self) -> Result<(), DeviceError>;

    async fn is_connected(&self) -> bool;

    /// Value changes of subscribed endpoints and the loss of the connection.
    async fn events(&self) -> Result<LinkEvents, DeviceError>;

    async fn get_service(&self, uuid: Uuid) -> Result<Self::Service, DeviceError>;

    async fn get_endpoint(&self, service: &Self::Service, uuid: Uuid) -> Result<Self::Endpoint, DeviceError>;

    async fn read_value(&self, endpoint: &Self::Endpoint) -> Result<Vec<u8>, DeviceError>;

    async fn start_notifications(&self, endpoint: &Self::Endpoint) -> Result<(), DeviceError>;
}
