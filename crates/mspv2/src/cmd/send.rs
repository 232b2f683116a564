use std::sync::mpsc;

use mspv2_frame::codes::is_setter;
use mspv2_frame::{code_name, Frame};
use mspv2_link::LinkError;
use tracing::{debug, info};

use crate::cmd::{open_connection, parse_duration, parse_hex, ConnectOptions, SendArgs};
use crate::exit::{link_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat, options: &ConnectOptions) -> CliResult<i32> {
    let raw = args.hex.as_deref().map(parse_hex).transpose()?;
    let wait = if args.wait {
        Some(parse_duration(&args.wait_timeout)?)
    } else {
        None
    };

    let conn = open_connection(&args.port, options)?;

    let (tx, rx) = mpsc::channel::<Frame>();
    if wait.is_some() {
        conn.register(args.code, move |frame, _| {
            tx.send(frame.clone()).map_err(LinkError::handler)
        })
        .map_err(|err| link_error("register failed", err))?;
    }

    let written = match &raw {
        Some(payload) => conn.write_raw(args.code, payload),
        None => conn.write(args.code, &args.args),
    }
    .map_err(|err| link_error("send failed", err))?;
    if written == 0 {
        return Err(CliError::new(
            FAILURE,
            format!("connection to {} is not active", args.port),
        ));
    }
    info!(
        code = args.code,
        name = code_name(args.code),
        bytes = written,
        kind = if is_setter(args.code) { "set" } else { "request" },
        "sent"
    );

    let reply = match wait {
        Some(timeout) => match rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(_) => {
                debug!(code = args.code, "no reply");
                let _ = conn.close();
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no reply to code {} within {timeout:?}", args.code),
                ));
            }
        },
        None => None,
    };

    conn.close().map_err(|err| link_error("connection lost", err))?;
    if let Some(frame) = reply {
        print_frame(&frame, format);
    }
    Ok(SUCCESS)
}
