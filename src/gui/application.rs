use futures::channel::mpsc::Sender;
use futures::SinkExt;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::theme::{self, Theme};
use iced::widget::{Space, button, column, container, text};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::{Config, ConfigOverrides};
use crate::device::gauge::GaugeView;
use crate::device::constants::GAUGE_UNITS_PER_PERCENT;
use crate::device::subscription::connect_device_subscription;
use crate::device::types::{ClientCommand, ConnectState, DeviceEvent};
use crate::error::AppRunError;
use crate::gui::style::{GAUGE_HEIGHT, GAUGE_SCALE, GaugeBodyStyleSheet, GaugeFillStyleSheet};
use crate::gui::types::Message;

pub struct ApplicationFlags {
    config_io: ConfigIO,
    overrides: ConfigOverrides,
}

pub struct BatteryMonitorApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,

    config_io: ConfigIO,
    overrides: ConfigOverrides,
    // the device subscription starts once the config is loaded
    config: Option<Config>,

    // commands for the session client, available after DeviceEvent::Ready
    command_sender: Option<Sender<ClientCommand>>,

    // latest state from the device
    connect_state: ConnectState,
    gauge: GaugeView,
}

impl BatteryMonitorApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();
        let overrides = self.overrides.clone();

        let fut = async move {
            let (config, error_message) = match config_io.read_or_init().await {
                Ok(config) => (config, None),
                Err(err) => {
                    error!("Failed to load config: {:?}", &err);
                    (Config::default(), Some(format!("Failed to load config: {}", &err)))
                }
            };

            (overrides.apply(config), error_message)
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn request_connect(&self) -> Command<Message> {
        let Some(mut sender) = self.command_sender.clone() else {
            return Command::none();
        };

        let fut = async move {
            match sender.send(ClientCommand::Connect).await {
                Ok(_) => true,
                Err(err) => {
                    error!("Failed to send connect command: {:?}", &err);
                    false
                },
            }
        };

        Command::perform(fut, Message::ConnectRequested)
    }

    fn gauge_view(&self) -> Element<Message> {
        let fill_width = (self.gauge.width as f32) * GAUGE_SCALE;
        let body_width = (100.0 * GAUGE_UNITS_PER_PERCENT as f32) * GAUGE_SCALE;

        let fill = container(Space::new(Length::Fixed(fill_width), Length::Fill))
            .height(Length::Fill)
            .style(theme::Container::Custom(Box::new(GaugeFillStyleSheet { color: self.gauge.color })));

        container(fill)
            .width(Length::Fixed(body_width + 12.0))
            .height(Length::Fixed(GAUGE_HEIGHT))
            .padding(6)
            .style(theme::Container::Custom(Box::new(GaugeBodyStyleSheet)))
            .into()
    }
}

impl Application for BatteryMonitorApplication {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (BatteryMonitorApplication, Command<Self::Message>) {
        let app = BatteryMonitorApplication {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            config_io: flags.config_io,
            overrides: flags.overrides,
            config: None,
            command_sender: None,
            connect_state: ConnectState::Idle,
            gauge: GaugeView::empty(),
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("Battery Monitor ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete: {:?}", config);
                self.config = Some(config);
                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();
                return window::close(id);
            },
            Message::ConnectPressed => {
                return self.request_connect();
            },
            Message::ConnectRequested(sent) => {
                if !sent {
                    self.connect_state = ConnectState::Failed;
                }
            },
            Message::DeviceEvent(DeviceEvent::Ready(sender)) => {
                self.command_sender = Some(sender);
            },
            Message::DeviceEvent(DeviceEvent::StateChange(state)) => {
                self.connect_state = state;
            },
            Message::DeviceEvent(DeviceEvent::Gauge(gauge)) => {
                self.gauge = gauge;
            },

            _ => {}
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let events = event::listen().map(Message::EventOccurred);

        match &self.config {
            None => events,
            Some(config) => Subscription::batch([
                events,
                connect_device_subscription(self.app_cancel.clone(), config.clone())
                    .map(Message::DeviceEvent),
            ]),
        }
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let mut connect_button = button(text("Connect")).padding([10, 30]);

        // disabled while connected, or until the session client is ready
        if self.command_sender.is_some() {
            connect_button = match self.connect_state {
                ConnectState::Idle => connect_button.on_press(Message::ConnectPressed),
                ConnectState::Failed => connect_button
                    .style(theme::Button::Destructive)
                    .on_press(Message::ConnectPressed),
                ConnectState::Connected => connect_button,
            };
        }

        container(
            column![
                connect_button,
                self.gauge_view(),
                text(&self.gauge.label),
            ]
                .align_items(Alignment::Center)
                .spacing(20),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x()
        .center_y()
        .padding(20)
        .into()
    }
}

pub fn run_application(overrides: ConfigOverrides) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io, overrides };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("battery-monitor".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(400.0, 320.0);
    settings.window.resizable = false;

    // this function will call process::exit() unless there was a startup error
    BatteryMonitorApplication::run(settings)?;
    Ok(())
}
