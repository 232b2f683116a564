use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Instant;

use mspv2_frame::codes::{API_VERSION, BOARD_INFO, BUILD_INFO, FC_VARIANT, FC_VERSION};
use mspv2_frame::{read_text, ApiVersion, BoardInfo, BuildInfo, FcVersion, Frame};
use mspv2_link::LinkError;
use serde::Serialize;
use tracing::debug;

use crate::cmd::{open_connection, parse_duration, ConnectOptions, InfoArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_record, OutputFormat};

const REQUESTS: [u16; 5] = [API_VERSION, FC_VARIANT, FC_VERSION, BOARD_INFO, BUILD_INFO];

enum Reply {
    Api(ApiVersion),
    Variant(String),
    Version(FcVersion),
    Board(BoardInfo),
    Build(BuildInfo),
}

#[derive(Serialize, Default)]
struct InfoOutput {
    api_version: Option<String>,
    protocol: Option<u8>,
    variant: Option<String>,
    firmware_version: Option<String>,
    board_id: Option<String>,
    hardware_revision: Option<u16>,
    target: Option<String>,
    build_date: Option<String>,
    build_time: Option<String>,
    revision: Option<String>,
    complete: bool,
}

impl InfoOutput {
    fn apply(&mut self, reply: Reply) {
        match reply {
            Reply::Api(api) => {
                self.api_version = Some(format!("{}.{}", api.major, api.minor));
                self.protocol = Some(api.protocol);
            }
            Reply::Variant(variant) => self.variant = Some(variant),
            Reply::Version(v) => {
                self.firmware_version = Some(format!("{}.{}.{}", v.major, v.minor, v.patch));
            }
            Reply::Board(board) => {
                self.board_id = Some(board.board_id);
                self.hardware_revision = Some(board.hardware_revision);
                self.target = board.target_name;
            }
            Reply::Build(build) => {
                self.build_date = Some(build.date);
                self.build_time = Some(build.time);
                self.revision = Some(build.revision);
            }
        }
    }

    /// One line in the usual `INAV 7.1.2 (board SPRO, target SPRACINGF7)` form.
    fn summary(&self) -> Option<String> {
        let variant = self.variant.as_deref()?;
        let version = self.firmware_version.as_deref()?;
        let board = self.board_id.as_deref()?;
        Some(match &self.target {
            Some(target) => format!("{variant} {version} (board {board}, target {target})"),
            None => format!("{variant} {version} (board {board})"),
        })
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
        vec![
            ("firmware", show(self.summary())),
            (
                "api",
                show(
                    self.api_version
                        .as_ref()
                        .zip(self.protocol)
                        .map(|(api, protocol)| format!("{api} (protocol {protocol})")),
                ),
            ),
            (
                "build",
                show(
                    self.revision
                        .as_ref()
                        .zip(self.build_date.as_ref().zip(self.build_time.as_ref()))
                        .map(|(rev, (date, time))| format!("{rev} (built on {date} @ {time})")),
                ),
            ),
            ("complete", self.complete.to_string()),
        ]
    }
}

fn decode(frame: &mut Frame) -> Result<Reply, LinkError> {
    Ok(match frame.code {
        API_VERSION => Reply::Api(frame.read()?),
        FC_VARIANT => Reply::Variant(read_text(frame)),
        FC_VERSION => Reply::Version(frame.read()?),
        BOARD_INFO => Reply::Board(BoardInfo::parse(frame)?),
        BUILD_INFO => Reply::Build(BuildInfo::parse(frame)?),
        other => return Err(LinkError::handler(format!("unexpected code {other}"))),
    })
}

pub fn run(args: InfoArgs, format: OutputFormat, options: &ConnectOptions) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let conn = open_connection(&args.port, options)?;

    let (tx, rx) = mpsc::channel();
    for code in REQUESTS {
        let tx = tx.clone();
        conn.register(code, move |frame, _| {
            let reply = decode(frame)?;
            tx.send((frame.code, reply)).map_err(LinkError::handler)
        })
        .map_err(|err| link_error("register failed", err))?;
    }
    drop(tx);

    for code in REQUESTS {
        conn.write(code, &[])
            .map_err(|err| link_error("request failed", err))?;
    }

    let mut out = InfoOutput::default();
    let mut pending: Vec<u16> = REQUESTS.to_vec();
    let deadline = Instant::now() + timeout;
    while !pending.is_empty() {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok((code, reply)) => {
                pending.retain(|&c| c != code);
                out.apply(reply);
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    out.complete = pending.is_empty();
    debug!(?pending, "identity requests without reply");

    let answered = pending.len() < REQUESTS.len();
    conn.close().map_err(|err| link_error("connection lost", err))?;

    if !answered {
        return Err(CliError::new(
            TIMEOUT,
            format!("no reply from {} within {timeout:?}", args.port),
        ));
    }

    print_record(&out, &out.rows(), format);
    Ok(SUCCESS)
}
