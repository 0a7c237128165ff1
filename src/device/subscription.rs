use std::convert::Infallible;
use futures::channel::mpsc::{channel, Sender};
use futures::future::pending;
use futures::SinkExt;
use iced::subscription::{self, Subscription};
use log::{error, warn};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::device::btle::BtleTransport;
use crate::device::client::{ClientOptions, SessionClient};
use crate::device::types::{ClientCommand, ConnectState, DeviceEvent};

async fn run_session_client(cancel: CancellationToken, config: Config, mut output: Sender<DeviceEvent>) -> Infallible {
    let (command_sender, command_receiver) = channel::<ClientCommand>(8);

    if let Err(err) = output.send(DeviceEvent::Ready(command_sender)).await {
        warn!("Failed to send DeviceEvent: {}", err);
    }

    match BtleTransport::new(Duration::from_millis(config.scan_timeout_ms)).await {
        Ok(transport) => {
            let client = SessionClient::new(transport, ClientOptions::from(&config), vec![output]);
            client.run(command_receiver, cancel).await;
        },
        Err(err) => {
            error!("Failed to initialize bluetooth: {}", err);
            if let Err(err) = output.send(DeviceEvent::StateChange(ConnectState::Failed)).await {
                warn!("Failed to send DeviceEvent: {}", err);
            }
        },
    }

    // note: subscription::channel expects the future to never resolve
    pending().await
}

pub fn connect_device_subscription(cancel: CancellationToken, config: Config) -> Subscription<DeviceEvent> {
    struct Connect;

    subscription::channel(
        std::any::TypeId::of::<Connect>(),
        64,
        move |output| run_session_client(cancel, config, output),
    )
}
