mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{parse_duration, Command, ConnectOptions};
use crate::exit::CliResult;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "mspv2",
    version,
    about = "Talk MSPv2 to INAV and Betaflight flight controllers"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Receive loop tick; at most one frame is read per tick.
    #[arg(long, value_name = "DURATION", default_value = "10ms", global = true)]
    tick: String,

    /// Give up reconnecting after this long.
    #[arg(long, value_name = "DURATION", default_value = "30s", global = true)]
    reconnect_timeout: String,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn connect_options(&self) -> CliResult<ConnectOptions> {
        Ok(ConnectOptions {
            tick: parse_duration(&self.tick)?,
            reconnect_timeout: Some(parse_duration(&self.reconnect_timeout)?),
        })
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cli
        .connect_options()
        .and_then(|options| cmd::run(cli.command, format, &options));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
