use futures::channel::mpsc::channel;
use futures::StreamExt;
use log::{info, warn};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::{Config, ConfigOverrides};
use crate::device::btle::BtleTransport;
use crate::device::client::{ClientOptions, SessionClient};
use crate::device::types::{ClientCommand, ConnectState, DeviceEvent};
use crate::error::AppRunError;

async fn load_config(config_io: &ConfigIO, overrides: &ConfigOverrides) -> Config {
    let config = match config_io.read_or_init().await {
        Ok(config) => config,
        Err(err) => {
            warn!("Failed to load config, using defaults: {}", err);
            Config::default()
        },
    };

    overrides.apply(config)
}

/// Connect once and print the gauge label on every update, until the device disconnects or the
/// process is interrupted.
async fn monitor(config: Config) -> Result<(), AppRunError> {
    let transport = BtleTransport::new(Duration::from_millis(config.scan_timeout_ms)).await?;
    let (event_sender, mut event_receiver) = channel::<DeviceEvent>(64);
    // kept alive so that the client does not stop
    let (_command_sender, command_receiver) = channel::<ClientCommand>(1);
    let cancel = CancellationToken::new();

    let mut client = SessionClient::new(transport, ClientOptions::from(&config), vec![event_sender]);

    match client.connect().await {
        Ok(_) => {},
        Err(err) if err.is_cancelled() => {
            info!("No battery monitor found");
            return Ok(());
        },
        Err(err) => return Err(err.into()),
    }

    let print_labels = async {
        while let Some(event) = event_receiver.next().await {
            match event {
                DeviceEvent::Gauge(view) if !view.is_empty() => println!("{}", view.label),
                DeviceEvent::StateChange(ConnectState::Idle) => break,
                _ => {},
            }
        }
    };

    tokio::select! {
        _ = client.run(command_receiver, cancel.clone()) => {},
        _ = print_labels => {
            info!("Device disconnected");
        },
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!("Failed to listen for ctrl-c: {}", err);
            }
            info!("Interrupted");
        },
    }

    cancel.cancel();
    Ok(())
}

pub fn run_headless(overrides: ConfigOverrides) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let config = load_config(&config_io, &overrides).await;
        monitor(config).await
    })
}
