use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;

use mspv2_frame::codes::RAW_GPS;
use mspv2_frame::RawGps;
use mspv2_link::{ConnectionState, LinkError};
use serde::Serialize;
use tracing::warn;

use crate::cmd::{install_ctrlc_handler, open_connection, parse_duration, ConnectOptions, GpsArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct GpsOutput {
    fix: &'static str,
    satellites: u8,
    latitude: f64,
    longitude: f64,
    altitude_m: u16,
    ground_speed_cms: u16,
    ground_course_deg: f64,
    hdop: f64,
}

impl From<RawGps> for GpsOutput {
    fn from(gps: RawGps) -> Self {
        Self {
            fix: fix_name(gps.fix_type),
            satellites: gps.num_sat,
            latitude: gps.latitude_degrees(),
            longitude: gps.longitude_degrees(),
            altitude_m: gps.altitude,
            ground_speed_cms: gps.ground_speed,
            ground_course_deg: f64::from(gps.ground_course) / 10.0,
            hdop: f64::from(gps.hdop) / 100.0,
        }
    }
}

impl GpsOutput {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("fix", self.fix.to_string()),
            ("sats", self.satellites.to_string()),
            ("lat", format!("{:.7}", self.latitude)),
            ("lon", format!("{:.7}", self.longitude)),
            ("alt", format!("{}m", self.altitude_m)),
            ("hdop", format!("{:.2}", self.hdop)),
        ]
    }
}

fn fix_name(fix_type: u8) -> &'static str {
    match fix_type {
        0 => "none",
        1 => "2d",
        2 => "3d",
        _ => "unknown",
    }
}

pub fn run(args: GpsArgs, format: OutputFormat, options: &ConnectOptions) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let conn = open_connection(&args.port, options)?;

    let (tx, rx) = mpsc::channel();
    conn.register(RAW_GPS, move |frame, _| {
        let gps: RawGps = frame.read()?;
        tx.send(gps).map_err(LinkError::handler)
    })
    .map_err(|err| link_error("register failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) && conn.is_running() {
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
        // Requests are only dropped while reconnecting; the next interval retries.
        if conn.state() == ConnectionState::Active {
            conn.write(RAW_GPS, &[])
                .map_err(|err| link_error("request failed", err))?;
        }
        match rx.recv_timeout(interval) {
            Ok(gps) => {
                let out = GpsOutput::from(gps);
                print_record(&out, &out.rows(), format);
                printed += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(port = %args.port, "no GPS reply within {interval:?}");
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    conn.close().map_err(|err| link_error("connection lost", err))?;
    Ok(SUCCESS)
}
