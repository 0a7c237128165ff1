use futures::channel::mpsc::Sender;
use uuid::Uuid;

use crate::device::gauge::GaugeView;

/// State of the connect affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    Idle, // clickable
    Connected, // disabled
    Failed, // clickable, marked red
}

#[derive(Debug, Clone)]
pub enum ClientCommand {
    Connect,
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    // the first event; commands for the session client are sent here
    Ready(Sender<ClientCommand>),
    StateChange(ConnectState),
    Gauge(GaugeView),
}

/// Events emitted by a connected link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    ValueChanged { uuid: Uuid, value: Vec<u8> },
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    AlreadyConnected,
}
