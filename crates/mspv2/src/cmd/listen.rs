use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mspv2_frame::Frame;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, open_connection, ConnectOptions, ListenArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const POLL: Duration = Duration::from_millis(50);

struct Filter {
    codes: Option<Vec<u16>>,
}

impl Filter {
    fn accepts(&self, frame: &Frame) -> bool {
        self.codes
            .as_ref()
            .map_or(true, |codes| codes.contains(&frame.code))
    }
}

pub fn run(args: ListenArgs, format: OutputFormat, options: &ConnectOptions) -> CliResult<i32> {
    let conn = open_connection(&args.port, options)?;
    info!(transport = conn.transport(), "listening");

    let filter = Filter {
        codes: args.codes.clone(),
    };
    let limit = args.count;
    let printed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&printed);
    conn.register_default(move |frame, _| {
        if !filter.accepts(frame) {
            return Ok(());
        }
        let seen = counter.fetch_add(1, Ordering::SeqCst);
        if limit.map_or(true, |limit| seen < limit) {
            print_frame(frame, format);
        }
        Ok(())
    })
    .map_err(|err| link_error("register failed", err))?;

    for code in args.request.iter().flatten() {
        conn.write(*code, &[])
            .map_err(|err| link_error("request failed", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    while running.load(Ordering::SeqCst) && conn.is_running() {
        if limit.is_some_and(|limit| printed.load(Ordering::SeqCst) >= limit) {
            break;
        }
        thread::sleep(POLL);
    }

    conn.close().map_err(|err| link_error("connection lost", err))?;
    Ok(SUCCESS)
}
