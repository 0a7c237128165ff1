use iced::Event;

use crate::config::types::Config;
use crate::device::types::DeviceEvent;

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ConfigLoadComplete((Config, Option<String>)), // config and an error message for the user
    DeviceEvent(DeviceEvent),
    ConnectPressed,
    ConnectRequested(bool), // true if the command reached the session client
    NoticeConfirmed,
}
