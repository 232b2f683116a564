use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use mspv2_frame::Value;
use mspv2_link::{Connection, ConnectionConfig};
use mspv2_transport::{DevicePort, ReconnectPolicy, TcpPort};

use crate::exit::{link_error, transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod gps;
pub mod info;
pub mod listen;
pub mod reboot;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print flight controller identity (API, firmware, board, build).
    Info(InfoArgs),
    /// Poll GPS position.
    Gps(GpsArgs),
    /// Send one command with typed arguments.
    Send(SendArgs),
    /// Print every frame received from the flight controller.
    Listen(ListenArgs),
    /// Reboot the flight controller.
    Reboot(RebootArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Connection settings shared by every command that opens a port.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub tick: Duration,
    pub reconnect_timeout: Option<Duration>,
}

pub fn run(command: Command, format: OutputFormat, options: &ConnectOptions) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format, options),
        Command::Gps(args) => gps::run(args, format, options),
        Command::Send(args) => send::run(args, format, options),
        Command::Listen(args) => listen::run(args, format, options),
        Command::Reboot(args) => reboot::run(args, options),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Serial device path or tcp://host:port.
    pub port: String,
    /// How long to wait for all replies (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct GpsArgs {
    /// Serial device path or tcp://host:port.
    pub port: String,
    /// Polling interval (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms")]
    pub interval: String,
    /// Exit after printing N fixes.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial device path or tcp://host:port.
    pub port: String,
    /// Command code.
    #[arg(long, short = 'c')]
    pub code: u16,
    /// Typed argument, repeatable, encoded in order: u8:N, u16:N or u32:N.
    #[arg(long = "arg", short = 'a', value_name = "TYPE:VALUE", value_parser = parse_arg)]
    pub args: Vec<Value>,
    /// Raw payload as hex; replaces --arg.
    #[arg(long, conflicts_with = "args")]
    pub hex: Option<String>,
    /// Wait for the reply with the same code and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Serial device path or tcp://host:port.
    pub port: String,
    /// Only print these codes (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub codes: Option<Vec<u16>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Request these codes once after connecting (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub request: Option<Vec<u16>>,
}

#[derive(Args, Debug)]
pub struct RebootArgs {
    /// Serial device path or tcp://host:port.
    pub port: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Where a port argument points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    Device(PathBuf),
    Tcp(String),
}

impl PortSpec {
    pub fn parse(port: &str) -> CliResult<Self> {
        if let Some(addr) = port.strip_prefix("tcp://") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(CliError::new(
                    USAGE,
                    format!("tcp port must be tcp://host:port, got {port}"),
                ));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }
        if port.trim().is_empty() {
            return Err(CliError::new(USAGE, "port must not be empty"));
        }
        Ok(Self::Device(PathBuf::from(port)))
    }
}

/// Open `port` and start a connection on it.
pub fn open_connection(port: &str, options: &ConnectOptions) -> CliResult<Connection> {
    let policy = ReconnectPolicy {
        max_wait: options.reconnect_timeout,
        ..ReconnectPolicy::default()
    };
    let config = ConnectionConfig::default().with_tick_interval(options.tick);
    let result = match PortSpec::parse(port)? {
        PortSpec::Device(path) => {
            let device = DevicePort::open(&path)
                .map_err(|err| transport_error("open failed", err))?
                .with_policy(policy);
            Connection::open(device, config)
        }
        PortSpec::Tcp(addr) => {
            let tcp = TcpPort::connect(addr)
                .map_err(|err| transport_error("connect failed", err))?
                .with_policy(policy);
            Connection::open(tcp, config)
        }
    };
    result.map_err(|err| link_error("connection failed", err))
}

/// Parse a typed argument such as `u16:1500` or `u8:0x2a`.
pub fn parse_arg(input: &str) -> Result<Value, String> {
    let (kind, number) = input
        .split_once(':')
        .ok_or_else(|| format!("expected TYPE:VALUE, got {input}"))?;
    let number = number.trim();
    let value = match number.strip_prefix("0x").or_else(|| number.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => number.parse::<u64>(),
    }
    .map_err(|_| format!("invalid number: {number}"))?;

    let out_of_range = || format!("{value} does not fit in {kind}");
    match kind.trim() {
        "u8" => u8::try_from(value).map(Value::U8).map_err(|_| out_of_range()),
        "u16" => u16::try_from(value).map(Value::U16).map_err(|_| out_of_range()),
        "u32" => u32::try_from(value).map(Value::U32).map_err(|_| out_of_range()),
        other => Err(format!("unknown type {other}, expected u8, u16 or u32")),
    }
}

pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            "hex payload must be an even number of hex digits",
        ));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
