use std::io;
use thiserror::Error;
use msgbox::IconType;
use std::fmt::Display;
use std::str::Utf8Error;
use btleplug;
use iced;
use serde_json;
use uuid::Uuid;

use crate::device::descriptor::DataPointKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (iced): {source}")]
    Iced { #[from] source: iced::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start async runtime: {source}")]
    Runtime { #[from] source: io::Error },

    #[error("Failed to monitor device: {source}")]
    Device { #[from] source: DeviceError },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("No device was chosen")]
    NoDeviceChosen,

    #[error("Not connected to a device")]
    NotConnected,

    #[error("The battery monitor service is not available")]
    MissingService,

    #[error("A required bluetooth characteristic is not available: {uuid}")]
    MissingCharacteristic { uuid: Uuid },

    #[error("Payload of {kind} is {actual} bytes, expected {expected}")]
    MalformedPayload { kind: DataPointKind, expected: usize, actual: usize },

    #[error("Mock device failure: {0}")]
    Mock(String),
}

impl DeviceError {
    /// The user (or the scan timeout) declined to pick a device; not worth reporting.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeviceError::NoDeviceChosen)
    }
}

pub fn error_msgbox<T: Display>(message: &'static str, error: &T) {
    let message = format!("{}: {}", message, error);
    eprintln!("{}", &message);
    if let Err(err) = msgbox::create(concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")), &message, IconType::Error) {
        eprintln!("Failed to create msgbox: {:?}", err);
    }
}
