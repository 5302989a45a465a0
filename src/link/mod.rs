//! # Telemetry Link Module
//!
//! Owns the connection to the vehicle and produces one telemetry record per
//! poll interval, live or simulated.
//!
//! This module handles:
//! - Opening the transport with a bounded timeout
//! - Reading and decoding one frame per tick
//! - Demoting to DISCONNECTED on any link fault and retrying next tick
//! - Falling back to the trajectory simulator so consumers never go silent
//! - Runtime endpoint / auto-reconnect / flight mode changes
//!
//! ## State machine
//!
//! ```text
//!                 open ok                    read fault
//! DISCONNECTED ───────────▶ CONNECTED ───────────────────▶ DISCONNECTED
//!     │  ▲ open failed: simulate this tick, retry next
//!     │  └────────────────────────────────────────────
//!     │ auto_reconnect off
//!     ▼
//! SIMULATING
//! ```
//!
//! `set_endpoint` and `set_auto_reconnect` drop any open transport and go
//! back to DISCONNECTED from every state. Stopping is terminal.

pub mod transport;
pub mod simulator;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{GroundStationError, Result};
use crate::frame::decoder::decode_position_frame;
use crate::frame::protocol::Position;
use crate::telemetry::publisher::TelemetryPublisher;
use crate::telemetry::{ConnectivityEvent, FlightMode, LinkState, TelemetryEvent, TelemetryRecord};
use simulator::{battery_at, speed_at, TrajectorySimulator};
use transport::{read_frame, Endpoint, LinkConnector, LinkTransport};

/// Externally visible connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connected,
    Simulating,
}

/// Connection state. A transport exists only while connected.
enum ConnectionState {
    Disconnected,
    Connected(Box<dyn LinkTransport>),
    Simulating,
}

impl ConnectionState {
    fn status(&self) -> LinkStatus {
        match self {
            ConnectionState::Disconnected => LinkStatus::Disconnected,
            ConnectionState::Connected(_) => LinkStatus::Connected,
            ConnectionState::Simulating => LinkStatus::Simulating,
        }
    }
}

/// Mutable link state, owned by the manager alone
struct LinkSession {
    endpoint: Endpoint,
    state: ConnectionState,
    auto_reconnect: bool,
    mode: FlightMode,
    tick: u64,
}

/// Timing knobs for the acquisition loop
#[derive(Debug, Clone, Copy)]
pub struct LinkTiming {
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Runtime requests accepted by a running manager
#[derive(Debug, Clone)]
pub enum LinkCommand {
    SetEndpoint(Endpoint),
    SetAutoReconnect(bool),
    SetMode(FlightMode),
}

/// Telemetry Link Manager
///
/// Drive it manually with [`LinkManager::tick`] or hand it to a background
/// task with [`LinkManager::spawn`].
pub struct LinkManager {
    session: LinkSession,
    simulator: TrajectorySimulator,
    io: LinkIo,
}

/// Shared, read-only collaborators used while a tick is awaiting I/O
struct LinkIo {
    connector: Arc<dyn LinkConnector>,
    publisher: TelemetryPublisher,
    timing: LinkTiming,
}

impl LinkManager {
    pub fn new(
        endpoint: Endpoint,
        auto_reconnect: bool,
        simulator: TrajectorySimulator,
        timing: LinkTiming,
        connector: Arc<dyn LinkConnector>,
        publisher: TelemetryPublisher,
    ) -> Self {
        Self {
            session: LinkSession {
                endpoint,
                state: ConnectionState::Disconnected,
                auto_reconnect,
                mode: FlightMode::default(),
                tick: 0,
            },
            simulator,
            io: LinkIo {
                connector,
                publisher,
                timing,
            },
        }
    }

    /// Build a manager from the `[serial]` and `[simulation]` sections
    pub fn from_config(
        config: &Config,
        connector: Arc<dyn LinkConnector>,
        publisher: TelemetryPublisher,
    ) -> Self {
        let timing = LinkTiming {
            poll_interval: config.serial.poll_interval(),
            connect_timeout: config.serial.timeout(),
            read_timeout: config.serial.timeout(),
        };

        Self::new(
            Endpoint::new(config.serial.port.clone(), config.serial.baud_rate),
            config.serial.auto_reconnect,
            TrajectorySimulator::new(config.simulation.clone()),
            timing,
            connector,
            publisher,
        )
    }

    pub fn status(&self) -> LinkStatus {
        self.session.state.status()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.session.endpoint
    }

    /// Replace the endpoint, dropping any open transport
    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        info!("Link endpoint changed to {}", endpoint);
        self.session.endpoint = endpoint;
        self.release("endpoint changed");
    }

    /// Toggle auto-reconnect, dropping any open transport
    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        info!("Auto-reconnect {}", if enabled { "enabled" } else { "disabled" });
        self.session.auto_reconnect = enabled;
        self.release("auto-reconnect changed");
    }

    /// Flight mode reported by subsequent records
    pub fn set_mode(&mut self, mode: FlightMode) {
        info!("Flight mode set to {}", mode);
        self.session.mode = mode;
    }

    fn apply(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::SetEndpoint(endpoint) => self.set_endpoint(endpoint),
            LinkCommand::SetAutoReconnect(enabled) => self.set_auto_reconnect(enabled),
            LinkCommand::SetMode(mode) => self.set_mode(mode),
        }
    }

    /// Force DISCONNECTED, closing the transport if one is open
    fn release(&mut self, reason: &str) {
        let previous = std::mem::replace(&mut self.session.state, ConnectionState::Disconnected);
        if let ConnectionState::Connected(transport) = previous {
            drop(transport);
            info!("Closed link to {} ({})", self.session.endpoint, reason);
            self.io.publish_connectivity(ConnectivityEvent::disconnected(format!(
                "Disconnected from {}: {}",
                self.session.endpoint.port, reason
            )));
        }
    }

    /// Run one acquisition cycle and return the record it emitted
    pub async fn tick(&mut self) -> TelemetryRecord {
        let tick = self.session.tick;
        self.session.tick = tick.wrapping_add(1);

        let state = std::mem::replace(&mut self.session.state, ConnectionState::Disconnected);
        let (next, position) = match state {
            ConnectionState::Disconnected if self.session.auto_reconnect => {
                match self.io.connect(&self.session.endpoint).await {
                    Some(transport) => self.io.read_linked(&self.session.endpoint, transport).await,
                    None => (ConnectionState::Disconnected, None),
                }
            }
            ConnectionState::Disconnected | ConnectionState::Simulating => {
                (ConnectionState::Simulating, None)
            }
            ConnectionState::Connected(transport) => {
                self.io.read_linked(&self.session.endpoint, transport).await
            }
        };
        self.session.state = next;

        let record = match position {
            Some(position) => self.build_record(tick, position, LinkState::Linked),
            None => {
                let position = self.simulator.position_at(tick);
                self.build_record(tick, position, LinkState::Simulated)
            }
        };

        self.io.publisher.publish(TelemetryEvent::Record(record.clone()));
        record
    }

    fn build_record(&self, tick: u64, position: Position, link_state: LinkState) -> TelemetryRecord {
        TelemetryRecord::new(
            position,
            speed_at(tick),
            battery_at(tick),
            self.session.mode,
            link_state,
        )
    }

    /// Move the manager onto a background task
    pub fn spawn(self) -> LinkHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(self.status());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(self.run(commands_rx, status_tx, cancel.clone()));

        LinkHandle {
            commands: commands_tx,
            status: status_rx,
            cancel,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<LinkCommand>,
        status: watch::Sender<LinkStatus>,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(self.io.timing.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Telemetry link started on {} (poll every {:?})",
            self.session.endpoint, self.io.timing.poll_interval
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },

                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.tick() => {}
                    }
                }
            }

            status.send_replace(self.status());
        }

        self.release("stopped");
        status.send_replace(self.status());
        info!("Telemetry link stopped");
    }
}

impl LinkIo {
    /// Open the transport, treating a slow open as a failure
    async fn connect(&self, endpoint: &Endpoint) -> Option<Box<dyn LinkTransport>> {
        let result = match timeout(self.timing.connect_timeout, self.connector.open(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(GroundStationError::TransportOpen {
                port: endpoint.port.clone(),
                reason: format!("timed out after {:?}", self.timing.connect_timeout),
            }),
        };

        match result {
            Ok(transport) => {
                info!("Link connected to {}", endpoint);
                self.publish_connectivity(ConnectivityEvent::connected(format!(
                    "Connected to {}",
                    endpoint.port
                )));
                Some(transport)
            }
            Err(e) => {
                warn!("Could not open {}: {}, using simulated telemetry", endpoint, e);
                self.publish_connectivity(ConnectivityEvent::disconnected(format!(
                    "Failed to connect to {}: {}",
                    endpoint.port, e
                )));
                None
            }
        }
    }

    async fn read_linked(
        &self,
        endpoint: &Endpoint,
        mut transport: Box<dyn LinkTransport>,
    ) -> (ConnectionState, Option<Position>) {
        let frame = read_frame(transport.as_mut(), self.timing.read_timeout).await;

        match frame.and_then(|frame| decode_position_frame(&frame)) {
            Ok(position) => {
                debug!(
                    "Frame: lat={}, lon={}, alt={}",
                    position.latitude, position.longitude, position.altitude
                );
                (ConnectionState::Connected(transport), Some(position))
            }
            Err(e) => {
                drop(transport);
                warn!("Link to {} lost: {}", endpoint, e);
                self.publish_connectivity(ConnectivityEvent::disconnected(format!(
                    "Serial read error: {}",
                    e
                )));
                (ConnectionState::Disconnected, None)
            }
        }
    }

    fn publish_connectivity(&self, event: ConnectivityEvent) {
        self.publisher.publish(TelemetryEvent::Connectivity(event));
    }
}

/// Control handle for a running link manager
pub struct LinkHandle {
    commands: mpsc::UnboundedSender<LinkCommand>,
    status: watch::Receiver<LinkStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LinkHandle {
    pub fn set_endpoint(&self, endpoint: Endpoint) -> Result<()> {
        self.send(LinkCommand::SetEndpoint(endpoint))
    }

    pub fn set_auto_reconnect(&self, enabled: bool) -> Result<()> {
        self.send(LinkCommand::SetAutoReconnect(enabled))
    }

    pub fn set_mode(&self, mode: FlightMode) -> Result<()> {
        self.send(LinkCommand::SetMode(mode))
    }

    /// Most recent state reported by the acquisition loop
    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    /// Watch for state changes
    pub fn status_watch(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Stop the acquisition loop and wait until the transport is released
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Telemetry link task ended abnormally: {}", e);
        }
    }

    fn send(&self, command: LinkCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| GroundStationError::LinkStopped)
    }
}
