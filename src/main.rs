//! # Ground Station
//!
//! Telemetry acquisition and offline map tiles for an unmanned vehicle.
//!
//! # Commands
//!
//! - `run` (default): poll the vehicle link once per interval, publish every
//!   record to the console and the CSV log, and serve map tiles over HTTP
//! - `ports`: list serial devices
//! - `tiles <ARCHIVE>`: print the metadata and tile inventory of an archive
//! - `emit`: act as a vehicle and send a fixed position frame every second
//!
//! # Control Flow of `run`
//!
//! 1. **Initialization**
//!    - Load `config/station.toml` (defaults if absent) and apply CLI overrides
//!    - Set up logging (stdout plus optional daily file)
//!    - Attach subscribers, open the tile archive, spawn the link task
//!
//! 2. **Main Loop**
//!    - Runs in the link task; `main` waits for Ctrl+C
//!
//! 3. **Graceful Shutdown**
//!    - Stop the link and release the serial port
//!    - Shut the tile server down independently
//!    - Let subscribers drain and flush
//!
//! # Examples
//!
//! ```bash
//! ground-station run --port /dev/ttyACM0 --baud 115200
//! ground-station emit --port /dev/pts/3 --lat 39.92 --lon 32.85 --alt 950
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use ground_station::config::Config;
use ground_station::frame::encoder::encode_position_frame;
use ground_station::frame::protocol::Position;
use ground_station::link::transport::{available_ports, send_frame, Endpoint, LinkConnector, SerialConnector};
use ground_station::link::LinkManager;
use ground_station::logging;
use ground_station::telemetry::csv_logger::CsvLogger;
use ground_station::telemetry::publisher::{TelemetryPublisher, TelemetrySubscriber, DEFAULT_CHANNEL_CAPACITY};
use ground_station::telemetry::{FlightMode, TelemetryEvent};
use ground_station::tiles::{MbTilesArchive, TileServerBuilder, TileServerHandle};

const DEFAULT_CONFIG_PATH: &str = "config/station.toml";

/// Interval between frames sent by `emit`
const EMIT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "ground-station", version, about = "UAV ground station core")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "GROUND_STATION_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Command to execute. Defaults to `run`.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Acquire telemetry and serve map tiles
    Run(RunArgs),
    /// List available serial ports
    Ports,
    /// Print the contents of an MBTiles archive
    Tiles {
        /// Archive to inspect
        archive: PathBuf,
    },
    /// Send a fixed position frame once per second
    Emit(EmitArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Run(RunArgs::default())
    }
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Serial device of the telemetry radio
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Address for the tile server
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Flight mode reported with each record
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

#[derive(Args, Debug, Clone)]
struct EmitArgs {
    /// Serial device to write frames to
    #[arg(long)]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = 57600)]
    baud: u32,

    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    #[arg(long, allow_hyphen_values = true)]
    alt: f64,

    /// Stop after this many frames
    #[arg(long)]
    count: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Autonomous,
    Rc,
}

impl From<ModeArg> for FlightMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Autonomous => FlightMode::Autonomous,
            ModeArg::Rc => FlightMode::Rc,
        }
    }
}

/// Logs every record and link change to the console
#[derive(Debug, Default)]
struct ConsoleReporter;

impl TelemetrySubscriber for ConsoleReporter {
    fn name(&self) -> &str {
        "console"
    }

    fn on_event(&mut self, event: &TelemetryEvent) -> ground_station::error::Result<()> {
        match event {
            TelemetryEvent::Record(record) => {
                let pos = record.position();
                info!(
                    "{} lat={:.6} lon={:.6} alt={:.1}m speed={:.1}m/s battery={}% mode={}",
                    record.link_state(),
                    pos.latitude,
                    pos.longitude,
                    pos.altitude,
                    record.speed(),
                    record.battery_percent(),
                    record.mode()
                );
            }
            TelemetryEvent::Connectivity(change) if change.connected => {
                info!("Link up: {}", change.message);
            }
            TelemetryEvent::Connectivity(change) => {
                warn!("Link down: {}", change.message);
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_default();

    let mut config = load_config(&cli.config)?;
    if let Command::Run(args) = &command {
        apply_overrides(&mut config, args)?;
    }

    let _guard = logging::init(&config.logging)?;
    info!("Ground Station v{} starting...", env!("CARGO_PKG_VERSION"));

    match command {
        Command::Run(args) => run(config, args.mode.map(FlightMode::from)).await,
        Command::Ports => list_ports(),
        Command::Tiles { archive } => describe_archive(&archive),
        Command::Emit(args) => emit(args).await,
    }
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("loading configuration from {}", path.display()))
}

fn apply_overrides(config: &mut Config, args: &RunArgs) -> Result<()> {
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(bind) = args.bind {
        config.tiles.bind = bind;
    }
    config.validate().context("invalid command line override")?;
    Ok(())
}

async fn run(config: Config, mode: Option<FlightMode>) -> Result<()> {
    let publisher = TelemetryPublisher::new(DEFAULT_CHANNEL_CAPACITY);
    let mut subscribers = vec![publisher.attach(ConsoleReporter)];

    if config.csv.enabled {
        match CsvLogger::new(&config.csv.log_dir) {
            Ok(logger) => {
                info!("Logging telemetry to {}", config.csv.log_dir);
                subscribers.push(publisher.attach(logger));
            }
            Err(e) => error!("CSV logging disabled: {}", e),
        }
    }

    let tile_server = if config.tiles.enabled {
        start_tile_server(&config).await
    } else {
        info!("Tile server disabled");
        None
    };

    let link = LinkManager::from_config(&config, Arc::new(SerialConnector), publisher.clone()).spawn();
    if let Some(mode) = mode {
        link.set_mode(mode)?;
    }

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");

    link.stop().await;
    if let Some(server) = tile_server {
        if let Err(e) = server.shutdown().await {
            warn!("Tile server shutdown failed: {}", e);
        }
    }

    // Subscribers exit once every publisher clone is gone
    drop(publisher);
    for subscriber in subscribers {
        let _ = subscriber.await;
    }

    info!("Ground station stopped");
    Ok(())
}

/// Open the archive and start serving. Failures are logged and the station
/// keeps running without maps.
async fn start_tile_server(config: &Config) -> Option<TileServerHandle> {
    let archive = match MbTilesArchive::open(&config.tiles.archive) {
        Ok(archive) => archive,
        Err(e) => {
            error!("Map tiles unavailable: {}", e);
            return None;
        }
    };

    match TileServerBuilder::new(config.tiles.bind, Arc::new(archive)).spawn().await {
        Ok(handle) => {
            info!("Serving tiles at http://{}/tiles/{{z}}/{{x}}/{{y}}.png", handle.local_addr());
            Some(handle)
        }
        Err(e) => {
            error!("Tile server failed to start on {}: {}", config.tiles.bind, e);
            None
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

fn describe_archive(path: &Path) -> Result<()> {
    let archive = MbTilesArchive::open(path)?;

    println!("Archive: {}", archive.path().display());
    for (name, value) in archive.metadata()? {
        println!("  {:<12} {}", name, value);
    }

    let inventory = archive.inventory()?;
    println!("{} tiles", inventory.len());
    println!("{:>4} {:>8} {:>8} {:>8} {:>10}", "zoom", "column", "xyz_row", "tms_row", "bytes");
    for tile in inventory {
        let xyz_row = tile.xyz_row.map_or_else(|| "-".to_string(), |row| row.to_string());
        println!(
            "{:>4} {:>8} {:>8} {:>8} {:>10}",
            tile.zoom, tile.column, xyz_row, tile.tms_row, tile.size_bytes
        );
    }
    Ok(())
}

async fn emit(args: EmitArgs) -> Result<()> {
    let endpoint = Endpoint::new(args.port, args.baud);
    let mut transport = SerialConnector.open(&endpoint).await?;

    let position = Position::new(args.lat, args.lon, args.alt);
    let frame = encode_position_frame(&position);
    info!(
        "Emitting lat={} lon={} alt={} on {} every {:?}",
        position.latitude, position.longitude, position.altitude, endpoint, EMIT_INTERVAL
    );

    let mut ticker = interval(EMIT_INTERVAL);
    let mut sent: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = send_frame(transport.as_mut(), &frame).await {
                    warn!("Failed to send frame: {}", e);
                    continue;
                }
                sent += 1;
                if args.count.is_some_and(|count| sent >= count) {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Total frames sent: {}", sent);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_run() {
        let cli = Cli::try_parse_from(["ground-station"]).unwrap();
        assert!(matches!(cli.command.unwrap_or_default(), Command::Run(_)));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_run_overrides_are_applied() {
        let cli = Cli::try_parse_from([
            "ground-station", "run", "--port", "/dev/ttyACM3", "--baud", "115200",
            "--bind", "0.0.0.0:9000", "--mode", "rc",
        ])
        .unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run command");
        };

        let mut config = Config::default();
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM3");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.tiles.bind.port(), 9000);
        assert_eq!(args.mode.map(FlightMode::from), Some(FlightMode::Rc));
    }

    #[test]
    fn test_unsupported_baud_override_is_rejected() {
        let args = RunArgs {
            baud: Some(420000),
            ..RunArgs::default()
        };
        assert!(apply_overrides(&mut Config::default(), &args).is_err());
    }

    #[test]
    fn test_emit_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "ground-station", "emit", "--port", "/dev/pts/4", "--lat", "-33.86", "--lon", "-70.65",
            "--alt", "12.5", "--count", "3",
        ])
        .unwrap();
        let Some(Command::Emit(args)) = cli.command else {
            panic!("expected emit command");
        };
        assert_eq!(args.lat, -33.86);
        assert_eq!(args.lon, -70.65);
        assert_eq!(args.baud, 57600);
        assert_eq!(args.count, Some(3));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/station.toml")).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_console_reporter_never_fails() {
        use ground_station::telemetry::{ConnectivityEvent, LinkState, TelemetryRecord};

        let mut reporter = ConsoleReporter;
        let record = TelemetryRecord::new(
            Position::new(39.9, 32.8, 100.0),
            25.0,
            90,
            FlightMode::Autonomous,
            LinkState::Simulated,
        );
        assert!(reporter.on_event(&TelemetryEvent::Record(record)).is_ok());
        assert!(reporter
            .on_event(&TelemetryEvent::Connectivity(ConnectivityEvent::disconnected("read timeout")))
            .is_ok());
    }
}
