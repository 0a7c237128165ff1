//! Drives the session client event loop end to end against the mock transport.

use std::time::Duration;

use battery_monitor::device::client::{ClientOptions, SessionClient};
use battery_monitor::device::constants::{
    BATTERY_CHARGE_LEVEL_CHARACTERISTIC, BATTERY_PERCENTAGE_CHARACTERISTIC, BATTERY_VOLTAGE_CHARACTERISTIC,
};
use battery_monitor::device::descriptor::ChargeColor;
use battery_monitor::device::gauge::GaugeView;
use battery_monitor::device::mock::{MockLink, MockTransport};
use battery_monitor::device::types::{ClientCommand, ConnectState, DeviceEvent};
use futures::channel::mpsc::{channel, Receiver};
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;

fn scripted_link() -> MockLink {
    let link = MockLink::new("Nicla");
    link.set_payload(BATTERY_PERCENTAGE_CHARACTERISTIC, &[50]);
    link.set_payload(BATTERY_VOLTAGE_CHARACTERISTIC, &1.85_f32.to_le_bytes());
    link.set_payload(BATTERY_CHARGE_LEVEL_CHARACTERISTIC, &[3]);
    link
}

async fn next_gauge(events: &mut Receiver<DeviceEvent>) -> GaugeView {
    match events.next().await {
        Some(DeviceEvent::Gauge(view)) => view,
        other => panic!("expected a gauge update, got {:?}", other),
    }
}

async fn next_state(events: &mut Receiver<DeviceEvent>) -> ConnectState {
    match events.next().await {
        Some(DeviceEvent::StateChange(state)) => state,
        other => panic!("expected a state change, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn polling_session_lifecycle() {
    let link = scripted_link();
    let options = ClientOptions { use_polling: true, poll_interval: Duration::from_millis(5000) };
    let (event_sender, mut events) = channel(64);
    let (mut commands, command_receiver) = channel(8);
    let cancel = CancellationToken::new();

    let client = SessionClient::new(MockTransport::new(link.clone()), options, vec![event_sender]);
    let handle = tokio::spawn(client.run(command_receiver, cancel.clone()));

    commands.send(ClientCommand::Connect).await.unwrap();

    let first = next_gauge(&mut events).await;
    assert_eq!(first.label, "1.85V (50% of 3.70V)");
    assert_eq!(first.color, Some(ChargeColor::Yellow));
    assert_eq!(next_state(&mut events).await, ConnectState::Connected);

    link.set_payload(BATTERY_PERCENTAGE_CHARACTERISTIC, &[37]);
    link.set_payload(BATTERY_CHARGE_LEVEL_CHARACTERISTIC, &[1]);
    let second = next_gauge(&mut events).await;
    assert_eq!(second.label, "1.85V (37% of 5.00V)");
    assert_eq!(second.color, Some(ChargeColor::Red));
    assert!((second.width - 11.2).abs() < 1e-9);

    link.disconnect();
    assert_eq!(next_state(&mut events).await, ConnectState::Idle);
    assert_eq!(next_gauge(&mut events).await, GaugeView::empty());

    // the poll timer is gone
    let reads = link.read_count();
    tokio::time::sleep(Duration::from_millis(30000)).await;
    assert_eq!(link.read_count(), reads);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn notification_session_lifecycle() {
    let link = scripted_link();
    let options = ClientOptions { use_polling: false, poll_interval: Duration::from_millis(5000) };
    let (event_sender, mut events) = channel(64);
    let (mut commands, command_receiver) = channel(8);
    let cancel = CancellationToken::new();

    let client = SessionClient::new(MockTransport::new(link.clone()), options, vec![event_sender]);
    let handle = tokio::spawn(client.run(command_receiver, cancel.clone()));

    commands.send(ClientCommand::Connect).await.unwrap();
    assert_eq!(next_state(&mut events).await, ConnectState::Connected);

    // one initial read per data point
    let mut view = GaugeView::empty();
    for _ in 0..3 {
        view = next_gauge(&mut events).await;
    }
    assert_eq!(view.label, "1.85V (50% of 3.70V)");
    assert_eq!(link.notifying().len(), 3);

    link.push(BATTERY_VOLTAGE_CHARACTERISTIC, &2.0_f32.to_le_bytes());
    assert_eq!(next_gauge(&mut events).await.label, "2.00V (50% of 4.00V)");

    // a second connect while connected changes nothing
    commands.send(ClientCommand::Connect).await.unwrap();
    link.push(BATTERY_CHARGE_LEVEL_CHARACTERISTIC, &[0]);
    let view = next_gauge(&mut events).await;
    assert_eq!(view.width, 0.0);
    assert_eq!(view.color, Some(ChargeColor::White));
    assert_eq!(link.connect_count(), 1);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn hung_read_still_reports_disconnect() {
    let link = scripted_link();
    let options = ClientOptions { use_polling: true, poll_interval: Duration::from_millis(5000) };
    let (event_sender, mut events) = channel(64);
    let (mut commands, command_receiver) = channel(8);
    let cancel = CancellationToken::new();

    let client = SessionClient::new(MockTransport::new(link.clone()), options, vec![event_sender]);
    let handle = tokio::spawn(client.run(command_receiver, cancel.clone()));

    commands.send(ClientCommand::Connect).await.unwrap();
    next_gauge(&mut events).await;
    assert_eq!(next_state(&mut events).await, ConnectState::Connected);

    // the read started by the first tick never completes
    link.hang_reads(BATTERY_VOLTAGE_CHARACTERISTIC, true);
    tokio::time::sleep(Duration::from_millis(12000)).await;

    link.disconnect();
    assert_eq!(next_state(&mut events).await, ConnectState::Idle);
    assert_eq!(next_gauge(&mut events).await, GaugeView::empty());

    // the client still takes commands
    link.hang_reads(BATTERY_VOLTAGE_CHARACTERISTIC, false);
    commands.send(ClientCommand::Connect).await.unwrap();
    assert_eq!(next_gauge(&mut events).await.label, "1.85V (50% of 3.70V)");
    assert_eq!(next_state(&mut events).await, ConnectState::Connected);
    assert_eq!(link.connect_count(), 2);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_chooser_leaves_state_untouched() {
    let options = ClientOptions { use_polling: true, poll_interval: Duration::from_millis(5000) };
    let transport = MockTransport::cancelled();
    let (event_sender, mut events) = channel(64);
    let (mut commands, command_receiver) = channel(8);
    let cancel = CancellationToken::new();

    let client = SessionClient::new(transport.clone(), options, vec![event_sender]);
    let handle = tokio::spawn(client.run(command_receiver, cancel.clone()));

    commands.send(ClientCommand::Connect).await.unwrap();
    commands.send(ClientCommand::Connect).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.request_count(), 2);

    cancel.cancel();
    handle.await.unwrap();

    // the client is gone, so the channel is closed without any event in it
    assert!(events.next().await.is_none());
}
