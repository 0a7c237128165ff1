use futures::channel::mpsc::{channel, Receiver, Sender};
use futures::future::{pending, try_join_all};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::spawn;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::types::Config;
use crate::device::constants::{BATTERY_MONITOR_SERVICE, MIN_POLL_INTERVAL};
use crate::device::descriptor::{DataPointKind, DataPoints, DATA_POINT_KINDS};
use crate::device::gauge::{render_gauge, GaugeView};
use crate::device::transport::{Link, LinkEvents, Transport};
use crate::device::types::{ClientCommand, ConnectOutcome, ConnectState, DeviceEvent, LinkEvent};
use crate::error::DeviceError;

type Readings = Vec<(DataPointKind, f64)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    // pull values on a timer instead of subscribing to notifications
    pub use_polling: bool,
    pub poll_interval: Duration,
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        ClientOptions {
            use_polling: config.use_polling,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(MIN_POLL_INTERVAL)),
        }
    }
}

struct Session<L: Link> {
    // link events and read results are tagged with this, so that those of an earlier session are ignored
    generation: u64,
    link: L,
    endpoints: Vec<(DataPointKind, L::Endpoint)>,
    // stops the link event forwarder
    cancel: CancellationToken,
    // child of `cancel`, also cancelled by the forwarder as soon as the link reports a disconnect;
    // pending reads give up when it fires
    lost: CancellationToken,
}

enum Input {
    Command(ClientCommand),
    Link(u64, LinkEvent),
    PullRead(u64, Result<Readings, DeviceError>),
    PollTick,
    Stop,
}

/// Connects to a battery monitor and turns its readings into [`DeviceEvent`]s.
///
/// All state is owned by a single task (see [`SessionClient::run`]). The link event forwarder,
/// the initial reads in notification mode and the reads started by the poll timer run as separate
/// tasks which report back through internal channels, so a read that never completes does not
/// hold up disconnects or commands.
pub struct SessionClient<T: Transport> {
    transport: T,
    options: ClientOptions,
    data_points: DataPoints,
    session: Option<Session<T::Link>>,
    generation: u64,
    poll_timer: Option<Interval>,
    pull_in_flight: bool,
    link_events_tx: Sender<(u64, LinkEvent)>,
    link_events_rx: Receiver<(u64, LinkEvent)>,
    pull_results_tx: Sender<(u64, Result<Readings, DeviceError>)>,
    pull_results_rx: Receiver<(u64, Result<Readings, DeviceError>)>,
    senders: Vec<Sender<DeviceEvent>>,
    cancel: CancellationToken,
}

async fn poll_tick(poll_timer: &mut Option<Interval>) {
    match poll_timer {
        Some(timer) => {
            timer.tick().await;
        },
        None => pending::<()>().await,
    }
}

fn forward_link_events(
    cancel: CancellationToken,
    lost: CancellationToken,
    generation: u64,
    mut events: LinkEvents,
    mut tx: Sender<(u64, LinkEvent)>,
) {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = events.next() => {
                    let Some(event) = event else {
                        debug!("Link event stream ended");
                        break 'mainloop;
                    };

                    if event == LinkEvent::Disconnected {
                        lost.cancel();
                    }

                    if tx.send((generation, event)).await.is_err() {
                        break 'mainloop;
                    }
                },
            }
        }
    });
}

/// Read all data points at once. Fails as soon as one read or decode fails, or when the link is
/// lost before all reads completed.
async fn read_data_points<L: Link>(
    link: &L,
    endpoints: &[(DataPointKind, L::Endpoint)],
    lost: &CancellationToken,
) -> Result<Readings, DeviceError> {
    let reads = endpoints.iter().map(|(kind, endpoint)| async move {
        info!("Requesting {}...", kind);
        let raw = link.read_value(endpoint).await?;
        let value = kind.decode(&raw)?;
        Ok::<_, DeviceError>((*kind, value))
    });

    tokio::select! {
        _ = lost.cancelled() => Err(DeviceError::NotConnected),
        values = try_join_all(reads) => values,
    }
}

impl<T: Transport> SessionClient<T> {
    pub fn new(transport: T, options: ClientOptions, senders: Vec<Sender<DeviceEvent>>) -> Self {
        let (link_events_tx, link_events_rx) = channel(64);
        let (pull_results_tx, pull_results_rx) = channel(8);

        SessionClient {
            transport,
            options,
            data_points: DataPoints::new(),
            session: None,
            generation: 0,
            poll_timer: None,
            pull_in_flight: false,
            link_events_tx,
            link_events_rx,
            pull_results_tx,
            pull_results_rx,
            senders,
            cancel: CancellationToken::new(),
        }
    }

    pub fn data_points(&self) -> &DataPoints {
        &self.data_points
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.poll_timer.is_some()
    }

    fn current_generation(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.generation)
    }

    async fn emit(&mut self, event: DeviceEvent) {
        for sender in &mut self.senders {
            if let Err(err) = sender.send(event.clone()).await {
                warn!("Failed to send DeviceEvent: {}", err);
            }
        }
    }

    async fn display(&mut self) {
        let view = self.render_gauge();
        self.emit(DeviceEvent::Gauge(view)).await;
    }

    pub fn render_gauge(&self) -> GaugeView {
        render_gauge(&self.data_points)
    }

    /// Choose a device, connect to it and start reading the battery data points.
    ///
    /// A no-op if the current session is still connected. In polling mode the first pull-read
    /// happens before this returns, and its error is returned; the session stays in place.
    pub async fn connect(&mut self) -> Result<ConnectOutcome, DeviceError> {
        if let Some(session) = &self.session {
            if session.link.is_connected().await {
                info!("Already connected");
                return Ok(ConnectOutcome::AlreadyConnected);
            }
        }

        let link = self.transport.request_device(BATTERY_MONITOR_SERVICE).await?;
        link.connect().await?;
        info!("Connected to: {}", link.name());

        let events = link.events().await?;
        let service = link.get_service(BATTERY_MONITOR_SERVICE).await?;

        let mut endpoints = Vec::with_capacity(DATA_POINT_KINDS.len());
        for kind in DATA_POINT_KINDS {
            let endpoint = link.get_endpoint(&service, kind.uuid()).await?;
            endpoints.push((kind, endpoint));
        }

        if let Some(stale) = self.session.take() {
            stale.cancel.cancel();
        }
        self.poll_timer = None;
        self.pull_in_flight = false;

        self.generation += 1;
        let generation = self.generation;
        let cancel = self.cancel.child_token();
        let lost = cancel.child_token();
        forward_link_events(cancel.clone(), lost.clone(), generation, events, self.link_events_tx.clone());

        self.session = Some(Session {
            generation,
            link: link.clone(),
            endpoints: endpoints.clone(),
            cancel,
            lost,
        });

        if self.options.use_polling {
            let period = self.options.poll_interval;
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.poll_timer = Some(timer);

            self.pull_read().await?;
        } else {
            for (kind, endpoint) in endpoints {
                self.spawn_initial_read(generation, link.clone(), kind, endpoint.clone());
                link.start_notifications(&endpoint).await?;
            }
        }

        Ok(ConnectOutcome::Connected)
    }

    // the result arrives through the link event channel, like a notification would
    fn spawn_initial_read(&self, generation: u64, link: T::Link, kind: DataPointKind, endpoint: <T::Link as Link>::Endpoint) {
        let mut tx = self.link_events_tx.clone();

        spawn(async move {
            match link.read_value(&endpoint).await {
                Ok(value) => {
                    let event = LinkEvent::ValueChanged { uuid: kind.uuid(), value };
                    if tx.send((generation, event)).await.is_err() {
                        debug!("Session client is gone, dropping initial read of {}", kind);
                    }
                },
                Err(err) => warn!("Initial read of {} failed: {}", kind, err),
            }
        });
    }

    // the result arrives through the pull result channel and is applied by `process_next`
    fn spawn_pull_read(&mut self) {
        let Some(session) = &self.session else {
            return;
        };

        if self.pull_in_flight {
            debug!("Previous read of the battery data is still pending, skipping this tick");
            return;
        }
        self.pull_in_flight = true;

        let generation = session.generation;
        let link = session.link.clone();
        let endpoints = session.endpoints.clone();
        let lost = session.lost.clone();
        let mut tx = self.pull_results_tx.clone();

        spawn(async move {
            let result = read_data_points(&link, &endpoints, &lost).await;
            if tx.send((generation, result)).await.is_err() {
                debug!("Session client is gone, dropping read of the battery data");
            }
        });
    }

    async fn apply_readings(&mut self, readings: Readings) {
        for (kind, value) in readings {
            self.data_points.set(kind, value);
            info!("{}: {}{}", kind, value, kind.unit());
        }

        self.display().await;
    }

    /// Read all data points at once, then update the display.
    ///
    /// All reads must succeed: if any of them fails (or returns a malformed payload) no value
    /// is stored and the display is not updated for this cycle. Gives up with
    /// [`DeviceError::NotConnected`] if the link reports a disconnect first.
    pub async fn pull_read(&mut self) -> Result<(), DeviceError> {
        let session = self.session.as_ref().ok_or(DeviceError::NotConnected)?;
        let readings = read_data_points(&session.link, &session.endpoints, &session.lost).await?;
        self.apply_readings(readings).await;
        Ok(())
    }

    pub async fn on_push_notify(&mut self, uuid: Uuid, raw: &[u8]) {
        let Some(kind) = self.data_points.find_by_uuid(&uuid).map(|point| point.kind) else {
            warn!("Notification from unknown characteristic {}", uuid);
            return;
        };

        match kind.decode(raw) {
            Ok(value) => {
                self.data_points.set(kind, value);
                info!("{} changed: {}{}", kind, value, kind.unit());
                self.display().await;
            },
            Err(err) => warn!("Failed to decode notification: {}", err),
        }
    }

    /// The link dropped. Values are kept until the next connect replaces them.
    pub async fn on_disconnected(&mut self) {
        let name = self.session
            .as_ref()
            .map(|session| session.link.name())
            .unwrap_or(String::from("NONE"));

        self.emit(DeviceEvent::StateChange(ConnectState::Idle)).await;
        self.poll_timer = None;
        self.pull_in_flight = false;
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
        }
        info!("Device {} is disconnected.", name);

        self.emit(DeviceEvent::Gauge(GaugeView::empty())).await;
    }

    /// Handler of the connect affordance.
    pub async fn on_connect_pressed(&mut self) {
        match self.connect().await {
            Ok(ConnectOutcome::Connected) => {
                self.emit(DeviceEvent::StateChange(ConnectState::Connected)).await;
            },
            Ok(ConnectOutcome::AlreadyConnected) => {},
            Err(err) if err.is_cancelled() => {
                info!("Device chooser cancelled");
            },
            Err(err) => {
                error!("Error: {}", err);
                self.emit(DeviceEvent::StateChange(ConnectState::Failed)).await;
            },
        }
    }

    async fn next_input(&mut self, commands: &mut Receiver<ClientCommand>, cancel: &CancellationToken) -> Input {
        let poll_timer = &mut self.poll_timer;
        let link_events = &mut self.link_events_rx;
        let pull_results = &mut self.pull_results_rx;

        tokio::select! {
            _ = cancel.cancelled() => Input::Stop,
            command = commands.next() => match command {
                Some(command) => Input::Command(command),
                None => Input::Stop,
            },
            Some((generation, event)) = link_events.next() => Input::Link(generation, event),
            Some((generation, result)) = pull_results.next() => Input::PullRead(generation, result),
            _ = poll_tick(poll_timer) => Input::PollTick,
        }
    }

    /// Wait for and handle a single command, link event, read result or poll tick.
    /// Returns false once `cancel` fires or the command channel is closed.
    pub async fn process_next(&mut self, commands: &mut Receiver<ClientCommand>, cancel: &CancellationToken) -> bool {
        match self.next_input(commands, cancel).await {
            Input::Stop => return false,
            Input::Command(ClientCommand::Connect) => {
                self.on_connect_pressed().await;
            },
            Input::Link(generation, event) => {
                if self.current_generation() != Some(generation) {
                    debug!("Ignoring {:?} from an earlier session", event);
                    return true;
                }

                match event {
                    LinkEvent::ValueChanged { uuid, value } => self.on_push_notify(uuid, &value).await,
                    LinkEvent::Disconnected => self.on_disconnected().await,
                }
            },
            Input::PullRead(generation, result) => {
                if self.current_generation() != Some(generation) {
                    debug!("Ignoring battery data read by an earlier session");
                    return true;
                }

                self.pull_in_flight = false;
                match result {
                    Ok(readings) => self.apply_readings(readings).await,
                    // the timer keeps running, the next tick will try again
                    Err(err) => warn!("Failed to read battery data: {}", err),
                }
            },
            Input::PollTick => self.spawn_pull_read(),
        }

        true
    }

    pub async fn run(mut self, mut commands: Receiver<ClientCommand>, cancel: CancellationToken) {
        while self.process_next(&mut commands, &cancel).await {}

        if let Some(session) = self.session.take() {
            session.cancel.cancel();
        }
        self.cancel.cancel();
        info!("Session client stopped");
    }
}
