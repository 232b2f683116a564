use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mspv2_frame::codes::REBOOT;
use mspv2_frame::{code_name, Frame, FrameConfig, FrameReader, FrameWriter, Marshal, Value};
use mspv2_transport::Transport;
use tracing::{debug, error, info, warn};

use crate::error::{LinkError, Result};
use crate::handler::{Handler, HandlerTable};
use crate::state::{AtomicState, ConnectionState};

/// Default receive loop period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Connection behavior configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How often the receive loop polls for a frame. Also bounds how long a
    /// close request waits to be noticed.
    pub tick_interval: Duration,
    /// Frame limits applied to both directions.
    pub frame: FrameConfig,
    /// Name of the receive loop thread.
    pub thread_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            frame: FrameConfig::default(),
            thread_name: "mspv2-recv".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Override the tick interval.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }
}

type WriteHalf = Box<dyn Write + Send>;

struct Shared {
    writer: Mutex<FrameWriter<WriteHalf>>,
    state: AtomicState,
    handlers: HandlerTable,
    transport: String,
    stopped: AtomicBool,
}

/// Cloneable access to a running connection.
///
/// Every clone talks to the same transport and handler table. Handlers get
/// a handle as their second argument, so they can reply from inside the
/// receive loop.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    fn new(write_half: WriteHalf, frame: FrameConfig, transport: String) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(FrameWriter::with_config(write_half, frame)),
                state: AtomicState::new(ConnectionState::Active),
                handlers: HandlerTable::new(),
                transport,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(
            Box::new(std::io::sink()),
            FrameConfig::default(),
            "detached".to_string(),
        )
    }

    /// Encode `args` and send them as command `code`.
    ///
    /// Returns the number of bytes written, or `Ok(0)` without touching the
    /// transport while the connection is reconnecting or rebooting. Once the
    /// receive loop has stopped, whether closed or after a failed reconnect,
    /// every write fails with [`LinkError::Closed`].
    pub fn write(&self, code: u16, args: &[Value]) -> Result<usize> {
        self.with_writer(|writer| writer.send_args(code, args))
    }

    /// Send an already encoded payload as command `code`.
    ///
    /// Gated like [`ConnectionHandle::write`].
    pub fn write_raw(&self, code: u16, payload: &[u8]) -> Result<usize> {
        self.with_writer(|writer| writer.send(code, payload))
    }

    /// Send a typed message as command `code`.
    pub fn send<M: Marshal>(&self, code: u16, message: &M) -> Result<usize> {
        self.write(code, &[message.to_value()])
    }

    fn with_writer<F>(&self, send: F) -> Result<usize>
    where
        F: FnOnce(&mut FrameWriter<WriteHalf>) -> mspv2_frame::Result<usize>,
    {
        let mut writer = self
            .shared
            .writer
            .lock()
            .map_err(|_| LinkError::Poisoned("writer"))?;
        if self.is_stopped() {
            return Err(LinkError::Closed);
        }
        let state = self.state();
        if state != ConnectionState::Active {
            debug!(%state, "write suppressed");
            return Ok(0);
        }
        Ok(send(&mut *writer)?)
    }

    /// Handle frames with `code` using `handler`, replacing any previous one.
    pub fn register<F>(&self, code: u16, handler: F) -> Result<()>
    where
        F: Fn(&mut Frame, &ConnectionHandle) -> Result<()> + Send + Sync + 'static,
    {
        let previous = self.shared.handlers.insert(code, Arc::new(handler))?;
        if previous.is_some() {
            debug!(code, name = code_name(code), "replaced handler");
        }
        Ok(())
    }

    /// Remove the handler for `code`; its frames go to the default handler again.
    pub fn unregister(&self, code: u16) -> Result<bool> {
        Ok(self.shared.handlers.remove(code)?.is_some())
    }

    /// Handle every frame whose code has no registered handler.
    ///
    /// The initial default logs the code at `warn` level.
    pub fn register_default<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&mut Frame, &ConnectionHandle) -> Result<()> + Send + Sync + 'static,
    {
        self.shared.handlers.set_fallback(Arc::new(handler))
    }

    /// Whether a handler is registered for `code`.
    pub fn is_registered(&self, code: u16) -> bool {
        self.shared.handlers.contains(code)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    /// Ask the flight controller to reboot.
    ///
    /// Once the request is written the connection enters
    /// [`ConnectionState::Rebooting`] and stops reading and writing for
    /// good. Returns `Ok(0)` if the request could not be sent because the
    /// connection was not active.
    pub fn reboot(&self) -> Result<usize> {
        let written = self.write_raw(REBOOT, &[])?;
        if written > 0
            && self
                .shared
                .state
                .transition(ConnectionState::Active, ConnectionState::Rebooting)
        {
            info!(transport = %self.shared.transport, "reboot requested");
        }
        Ok(written)
    }

    /// Whether the receive loop has stopped for good.
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Description of the underlying transport.
    pub fn transport(&self) -> &str {
        &self.shared.transport
    }

    fn dispatch(&self, frame: &mut Frame) {
        let code = frame.code;
        let handler: Handler = match self.shared.handlers.lookup(code) {
            Ok(handler) => handler,
            Err(err) => {
                error!(code, error = %err, "handler lookup failed");
                return;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(frame, self))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(code, name = code_name(code), error = %err, "error in handler");
            }
            Err(payload) => {
                error!(
                    code,
                    name = code_name(code),
                    panic = panic_message(payload.as_ref()),
                    "handler panicked"
                );
            }
        }
    }

    fn replace_write_half(&self, write_half: WriteHalf) -> Result<()> {
        let mut writer = self
            .shared
            .writer
            .lock()
            .map_err(|_| LinkError::Poisoned("writer"))?;
        writer.replace_inner(write_half);
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("transport", &self.shared.transport)
            .field("state", &self.state())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// An open connection and its receive loop.
///
/// The loop runs on its own thread from [`Connection::open`] until
/// [`Connection::close`] or drop. Closing is cooperative: the request is
/// seen at the next tick, after any read or handler already in progress.
pub struct Connection {
    handle: ConnectionHandle,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl Connection {
    /// Take ownership of `transport` and start the receive loop.
    pub fn open<T: Transport>(mut transport: T, config: ConnectionConfig) -> Result<Self> {
        transport.set_read_timeout(Some(config.tick_interval))?;
        let write_half = transport.try_clone()?;
        let handle = ConnectionHandle::new(
            Box::new(write_half),
            config.frame.clone(),
            transport.describe(),
        );

        let reader = FrameReader::with_config(transport, config.frame);
        let (stop_tx, stop_rx) = mpsc::channel();
        let loop_handle = handle.clone();
        let tick = config.tick_interval;
        let thread = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || receive_loop(reader, loop_handle, stop_rx, tick))
            .map_err(LinkError::Spawn)?;

        info!(transport = %handle.transport(), ?tick, "connection open");
        Ok(Self {
            handle,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// A new handle to this connection.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Whether the receive loop is still running.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stop the receive loop and wait for it.
    ///
    /// Returns the loop's own failure if it had already ended, e.g.
    /// [`LinkError::ReconnectFailed`].
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            // The loop may already be gone; its result is collected below.
            let _ = stop.send(());
        }
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| LinkError::LoopPanicked)?,
            None => Ok(()),
        }
    }
}

impl std::ops::Deref for Connection {
    type Target = ConnectionHandle;

    fn deref(&self) -> &ConnectionHandle {
        &self.handle
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "receive loop ended with error");
        }
    }
}

fn receive_loop<T: Transport>(
    reader: FrameReader<T>,
    handle: ConnectionHandle,
    stop: Receiver<()>,
    tick: Duration,
) -> Result<()> {
    let result = run_loop(reader, &handle, stop, tick);
    handle.shared.stopped.store(true, Ordering::Release);
    result
}

fn run_loop<T: Transport>(
    mut reader: FrameReader<T>,
    handle: &ConnectionHandle,
    stop: Receiver<()>,
    tick: Duration,
) -> Result<()> {
    loop {
        match stop.recv_timeout(tick) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if handle.state() != ConnectionState::Active {
            continue;
        }

        match reader.poll_frame() {
            Ok(Some(mut frame)) => handle.dispatch(&mut frame),
            Ok(None) => {}
            Err(err) if err.is_invalid_packet() => {
                warn!(error = %err, "invalid packet");
            }
            Err(err) => {
                warn!(error = %err, transport = %handle.transport(), "attempting to reconnect");
                if let Err(err) = reconnect(&mut reader, handle) {
                    error!(error = %err, transport = %handle.transport(), "giving up on connection");
                    return Err(err);
                }
            }
        }
    }
    info!(transport = %handle.transport(), "receive loop ended");
    Ok(())
}

fn reconnect<T: Transport>(reader: &mut FrameReader<T>, handle: &ConnectionHandle) -> Result<()> {
    if !handle
        .shared
        .state
        .transition(ConnectionState::Active, ConnectionState::Reconnecting)
    {
        return Ok(());
    }

    let transport = reader.get_mut();
    transport.reconnect().map_err(LinkError::ReconnectFailed)?;
    let write_half = transport.try_clone().map_err(LinkError::ReconnectFailed)?;
    handle.replace_write_half(Box::new(write_half))?;

    handle
        .shared
        .state
        .transition(ConnectionState::Reconnecting, ConnectionState::Active);
    info!(transport = %handle.transport(), "reconnected to the flight controller");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{ErrorKind, Read};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use bytes::BytesMut;
    use mspv2_frame::{encode_frame_with_direction, Direction, FrameError, RawGps};
    use mspv2_transport::TransportError;

    use super::*;

    enum Chunk {
        Bytes(Vec<u8>),
        Eof,
    }

    #[derive(Default)]
    struct MockState {
        incoming: VecDeque<Chunk>,
        written: Vec<u8>,
        reconnects: usize,
        fail_reconnect: bool,
    }

    /// In-memory transport; every clone shares the same state.
    #[derive(Clone, Default)]
    struct MockTransport {
        state: Arc<Mutex<MockState>>,
        hold_reconnect: Arc<AtomicBool>,
        clones: Arc<AtomicUsize>,
    }

    impl MockTransport {
        fn push(&self, bytes: Vec<u8>) {
            self.state
                .lock()
                .unwrap()
                .incoming
                .push_back(Chunk::Bytes(bytes));
        }

        fn push_eof(&self) {
            self.state.lock().unwrap().incoming.push_back(Chunk::Eof);
        }

        fn written(&self) -> Vec<u8> {
            self.state.lock().unwrap().written.clone()
        }

        fn reconnects(&self) -> usize {
            self.state.lock().unwrap().reconnects
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut state = self.state.lock().unwrap();
            match state.incoming.pop_front() {
                None => Err(ErrorKind::WouldBlock.into()),
                Some(Chunk::Eof) => Ok(0),
                Some(Chunk::Bytes(mut bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        state.incoming.push_front(Chunk::Bytes(bytes.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.state.lock().unwrap().written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockTransport {
        fn try_clone(&self) -> mspv2_transport::Result<Self> {
            self.clones.fetch_add(1, Ordering::SeqCst);
            Ok(self.clone())
        }

        fn reconnect(&mut self) -> mspv2_transport::Result<()> {
            while self.hold_reconnect.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            let mut state = self.state.lock().unwrap();
            state.reconnects += 1;
            if state.fail_reconnect {
                return Err(TransportError::ReconnectTimeout {
                    target: "mock".to_string(),
                    waited: Duration::ZERO,
                });
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }

    fn reply(code: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame_with_direction(Direction::FromDevice, code, payload, &mut buf)
            .expect("frame should encode");
        buf.to_vec()
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::default().with_tick_interval(Duration::from_millis(1))
    }

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn write_builds_frame() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");

        let n = conn.write(1, &[]).expect("write should succeed");
        assert_eq!(n, 9);
        assert_eq!(
            mock.written(),
            vec![0x24, 0x58, 0x3C, 0x00, 0x01, 0x00, 0x00, 0x00, 0x45]
        );
        conn.close().expect("close should succeed");
    }

    #[test]
    fn write_surfaces_marshal_errors() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");

        let err = conn
            .write(1, &[Value::Sequence(vec![Value::U8(1), Value::U16(2)])])
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Frame(FrameError::UnsupportedType(_))
        ));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn dispatches_to_specific_and_default_handlers() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");
        let (tx, rx) = mpsc::channel();

        let specific = tx.clone();
        conn.register(106, move |frame, _| {
            let gps: RawGps = frame.read()?;
            specific
                .send(("gps", gps.num_sat))
                .map_err(LinkError::handler)
        })
        .unwrap();
        conn.register_default(move |frame, _| {
            tx.send(("default", frame.code as u8))
                .map_err(LinkError::handler)
        })
        .unwrap();

        let mut gps = vec![2, 9];
        gps.extend_from_slice(&[0u8; 16]);
        mock.push(reply(106, &gps));
        mock.push(reply(101, &[]));

        let timeout = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), ("gps", 9));
        assert_eq!(rx.recv_timeout(timeout).unwrap(), ("default", 101));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        conn.close().unwrap();
    }

    #[test]
    fn failing_and_panicking_handlers_do_not_stop_the_loop() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");
        let (tx, rx) = mpsc::channel();

        conn.register(5, |_, _| panic!("handler blew up")).unwrap();
        conn.register(6, |_, _| Err(LinkError::handler("bad payload")))
            .unwrap();
        conn.register(7, move |frame, _| {
            tx.send(frame.code).map_err(LinkError::handler)
        })
        .unwrap();

        mock.push(reply(5, &[]));
        mock.push(reply(6, &[]));
        mock.push(reply(7, &[]));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        assert!(conn.is_running());
        conn.close().unwrap();
    }

    #[test]
    fn invalid_packets_are_skipped() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");
        let (tx, rx) = mpsc::channel();
        conn.register(2, move |frame, _| {
            tx.send(frame.payload.to_vec()).map_err(LinkError::handler)
        })
        .unwrap();

        let mut corrupt = reply(2, b"bad");
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        mock.push(b"abc".to_vec());
        mock.push(corrupt);
        mock.push(reply(2, b"ok"));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), b"ok");
        assert_eq!(mock.reconnects(), 0);
        assert_eq!(conn.state(), ConnectionState::Active);
        conn.close().unwrap();
    }

    #[test]
    fn writes_are_suppressed_while_reconnecting() {
        let mock = MockTransport::default();
        mock.hold_reconnect.store(true, Ordering::SeqCst);
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");

        mock.push_eof();
        wait_until("reconnecting state", || {
            conn.state() == ConnectionState::Reconnecting
        });

        assert_eq!(conn.write(1, &[]).unwrap(), 0);
        assert_eq!(conn.write_raw(2, b"x").unwrap(), 0);
        assert!(mock.written().is_empty());

        mock.hold_reconnect.store(false, Ordering::SeqCst);
        wait_until("active state", || conn.state() == ConnectionState::Active);

        assert_eq!(conn.write(1, &[]).unwrap(), 9);
        assert_eq!(mock.written().len(), 9);
        assert_eq!(mock.reconnects(), 1);
        // One clone at open, one after the reconnect.
        assert_eq!(mock.clones.load(Ordering::SeqCst), 2);
        conn.close().unwrap();
    }

    #[test]
    fn frames_flow_after_reconnect() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");
        let (tx, rx) = mpsc::channel();
        conn.register(3, move |frame, _| {
            tx.send(frame.read::<u8>()?).map_err(LinkError::handler)
        })
        .unwrap();

        mock.push_eof();
        mock.push(reply(3, &[42]));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        assert_eq!(mock.reconnects(), 1);
        conn.close().unwrap();
    }

    #[test]
    fn failed_reconnect_ends_the_loop() {
        let mock = MockTransport::default();
        mock.state.lock().unwrap().fail_reconnect = true;
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");

        mock.push_eof();
        wait_until("loop exit", || !conn.is_running());
        assert_eq!(conn.state(), ConnectionState::Reconnecting);
        assert!(conn.is_stopped());
        assert!(matches!(conn.write(1, &[]), Err(LinkError::Closed)));
        assert!(matches!(conn.write_raw(1, b"x"), Err(LinkError::Closed)));
        assert!(matches!(conn.reboot(), Err(LinkError::Closed)));
        assert!(mock.written().is_empty());

        let err = conn.close().unwrap_err();
        assert!(matches!(
            err,
            LinkError::ReconnectFailed(TransportError::ReconnectTimeout { .. })
        ));
    }

    #[test]
    fn reboot_suppresses_further_writes() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");

        assert_eq!(conn.reboot().unwrap(), 9);
        assert_eq!(conn.state(), ConnectionState::Rebooting);
        assert_eq!(conn.write(1, &[]).unwrap(), 0);
        assert_eq!(conn.reboot().unwrap(), 0);

        let written = mock.written();
        assert_eq!(written.len(), 9);
        assert_eq!(u16::from_le_bytes([written[4], written[5]]), REBOOT);
        conn.close().unwrap();
    }

    #[test]
    fn handlers_can_reply_through_the_handle() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");
        let (tx, rx) = mpsc::channel();
        conn.register(1, move |_, conn| {
            let n = conn.write(2, &[])?;
            tx.send(n).map_err(LinkError::handler)
        })
        .unwrap();

        mock.push(reply(1, &[0, 2, 5]));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 9);
        assert_eq!(mock.written()[4], 2);
        conn.close().unwrap();
    }

    #[test]
    fn unregister_falls_back_to_default() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");
        conn.register(9, |_, _| Ok(())).unwrap();
        assert!(conn.is_registered(9));
        assert!(conn.unregister(9).unwrap());
        assert!(!conn.is_registered(9));
        assert!(!conn.unregister(9).unwrap());
    }

    #[test]
    fn close_is_observed_within_a_few_ticks() {
        let mock = MockTransport::default();
        let conn = Connection::open(
            mock,
            ConnectionConfig::default().with_tick_interval(Duration::from_millis(20)),
        )
        .expect("open should succeed");
        let handle = conn.handle();

        let start = Instant::now();
        conn.close().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(handle.state(), ConnectionState::Active);
        assert!(handle.is_stopped());
        assert!(matches!(handle.write(1, &[]), Err(LinkError::Closed)));
    }

    #[test]
    fn drop_stops_the_loop() {
        let mock = MockTransport::default();
        let conn = Connection::open(mock.clone(), config()).expect("open should succeed");
        let handle = conn.handle();
        drop(conn);

        // The loop no longer reads; the pushed frame stays queued.
        mock.push(reply(1, &[]));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(mock.state.lock().unwrap().incoming.len(), 1);
        assert_eq!(handle.transport(), "mock");
    }
}
