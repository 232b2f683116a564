use mspv2_link::ConnectionState;
use tracing::info;

use crate::cmd::{open_connection, ConnectOptions, RebootArgs};
use crate::exit::{link_error, CliError, CliResult, FAILURE, SUCCESS};

pub fn run(args: RebootArgs, options: &ConnectOptions) -> CliResult<i32> {
    let conn = open_connection(&args.port, options)?;

    let written = conn
        .reboot()
        .map_err(|err| link_error("reboot failed", err))?;
    let state = conn.state();
    conn.close().map_err(|err| link_error("connection lost", err))?;

    if written == 0 || state != ConnectionState::Rebooting {
        return Err(CliError::new(
            FAILURE,
            format!("reboot not sent to {}: connection {state}", args.port),
        ));
    }

    info!(port = %args.port, "reboot requested");
    Ok(SUCCESS)
}
