//! End-to-end tests against a fake flight controller on a TCP loopback.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use mspv2_frame::{
    codes, encode_frame_with_direction, Direction, FrameError, FrameReader, Marshal, RawGps,
    Value, Waypoint,
};
use mspv2_link::{Connection, ConnectionConfig, ConnectionState, LinkError};
use mspv2_transport::{ReconnectPolicy, TcpPort};

const TIMEOUT: Duration = Duration::from_secs(5);

fn sample_gps() -> RawGps {
    RawGps {
        fix_type: 2,
        num_sat: 11,
        latitude: 473_977_419,
        longitude: 85_455_939,
        altitude: 488,
        ground_speed: 0,
        ground_course: 0,
        hdop: 110,
    }
}

fn encode_reply<M: Marshal>(code: u16, message: &M) -> Vec<u8> {
    let mut payload = BytesMut::new();
    mspv2_frame::encode_value(&mut payload, message).expect("payload should encode");
    let mut buf = BytesMut::new();
    encode_frame_with_direction(Direction::FromDevice, code, &payload, &mut buf)
        .expect("frame should encode");
    buf.to_vec()
}

/// Answer `requests` commands on `stream`, then hand the stream back.
fn serve(stream: TcpStream, requests: usize) -> TcpStream {
    let mut writer = stream.try_clone().expect("stream should clone");
    let mut reader = FrameReader::new(stream);
    for _ in 0..requests {
        let mut request = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => panic!("fake device failed to read request: {err}"),
        };
        let reply = match request.code {
            codes::RAW_GPS => encode_reply(codes::RAW_GPS, &sample_gps()),
            codes::SET_WP => {
                let wp: Waypoint = request.read().expect("waypoint should decode");
                encode_reply(codes::WP, &wp)
            }
            other => encode_reply(other, &0u8),
        };
        writer.write_all(&reply).expect("reply should be written");
    }
    writer
}

fn open(addr: &str) -> Connection {
    let port = TcpPort::connect(addr)
        .expect("client should connect")
        .with_policy(ReconnectPolicy {
            poll_interval: Duration::from_millis(5),
            max_wait: Some(Duration::from_secs(5)),
        });
    Connection::open(
        port,
        ConnectionConfig::default().with_tick_interval(Duration::from_millis(2)),
    )
    .expect("connection should open")
}

#[test]
fn request_reply_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener has address").to_string();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let device = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("device should accept");
        let _stream = serve(stream, 2);
        let _ = done_rx.recv();
    });

    let conn = open(&addr);
    let (tx, rx) = mpsc::channel();
    let gps_tx = tx.clone();
    conn.register(codes::RAW_GPS, move |frame, _| {
        let gps: RawGps = frame.read()?;
        gps_tx.send(gps.num_sat as u32).map_err(LinkError::handler)
    })
    .expect("register should succeed");
    conn.register(codes::WP, move |frame, _| {
        let wp: Waypoint = frame.read()?;
        tx.send(wp.altitude).map_err(LinkError::handler)
    })
    .expect("register should succeed");

    assert!(conn.write(codes::RAW_GPS, &[]).expect("write should succeed") > 0);
    assert_eq!(rx.recv_timeout(TIMEOUT).expect("gps reply"), 11);

    let wp = Waypoint {
        number: 1,
        altitude: 2500,
        flag: 0xA5,
        ..Waypoint::default()
    };
    conn.send(codes::SET_WP, &wp).expect("send should succeed");
    assert_eq!(rx.recv_timeout(TIMEOUT).expect("waypoint echo"), 2500);

    conn.close().expect("close should succeed");
    done_tx.send(()).expect("device thread should be waiting");
    device.join().expect("device thread should complete");
}

#[test]
fn reconnects_after_device_restart() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener has address").to_string();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let device = thread::spawn(move || {
        let (first, _) = listener.accept().expect("device should accept");
        // Dropping the first stream simulates the board resetting.
        drop(serve(first, 1));
        let (second, _) = listener.accept().expect("device should accept again");
        let _stream = serve(second, 1);
        let _ = done_rx.recv();
    });

    let conn = open(&addr);
    let (tx, rx) = mpsc::channel();
    conn.register(codes::API_VERSION, move |frame, conn| {
        tx.send((frame.read::<u8>()?, conn.state()))
            .map_err(LinkError::handler)
    })
    .expect("register should succeed");

    conn.write(codes::API_VERSION, &[])
        .expect("first write should succeed");
    let (_, state) = rx.recv_timeout(TIMEOUT).expect("first reply");
    assert_eq!(state, ConnectionState::Active);

    // Wait for the loop to see the reset and come back.
    let deadline = std::time::Instant::now() + TIMEOUT;
    loop {
        assert!(std::time::Instant::now() < deadline, "no reconnect");
        if conn.state() == ConnectionState::Active
            && conn
                .write(codes::API_VERSION, &[Value::U8(0)])
                .map(|n| n > 0)
                .unwrap_or(false)
        {
            if let Ok((value, _)) = rx.recv_timeout(Duration::from_millis(200)) {
                assert_eq!(value, 0);
                break;
            }
        }
        thread::sleep(Duration::from_millis(5));
    }

    conn.close().expect("close should succeed");
    done_tx.send(()).expect("device thread should be waiting");
    device.join().expect("device thread should complete");
}
