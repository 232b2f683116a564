use std::io::{ErrorKind, Read};
use std::time::Duration;

use tracing::debug;

use crate::checksum::{checksum, crc8_dvb_s2};
use crate::codec::{
    Direction, Frame, FrameConfig, Hex, CHECKSUM_START, HEADER_SIZE, START, VERSION_V1, VERSION_V2,
};
use crate::error::{FrameError, InvalidPacket, Result};

/// Pause between reads while a frame is under way but the stream is idle.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// What to do when the stream has no data right now.
#[derive(Clone, Copy)]
enum Idle {
    /// Report "no frame" to the caller.
    Yield,
    /// Surface the `WouldBlock`/`TimedOut` error.
    Fail,
    /// Keep reading; a frame is already under way.
    Retry,
}

/// Reads MSPv2 frames from any `Read` stream.
///
/// Parsing is incremental and reads exactly the bytes each step needs, so
/// a malformed header costs three bytes and nothing more.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends, and
    /// `Err(FrameError::InvalidPacket(_))` for a malformed frame, after which
    /// the stream can still be read.
    pub fn read_frame(&mut self) -> Result<Frame> {
        match self.parse(Idle::Fail)? {
            Some(frame) => Ok(frame),
            None => Err(FrameError::Io(ErrorKind::WouldBlock.into())),
        }
    }

    /// Read the next frame if one has started arriving.
    ///
    /// A stream with a read timeout that has nothing pending yields
    /// `Ok(None)`. Once the first byte of a frame is in, the rest is waited
    /// for.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        self.parse(Idle::Yield)
    }

    fn parse(&mut self, idle: Idle) -> Result<Option<Frame>> {
        let mut header = [0u8; HEADER_SIZE];
        if !self.read_full(&mut header[..3], idle)? {
            return Ok(None);
        }

        if header[0] != START {
            return Err(InvalidPacket::BadStart { found: header[0] }.into());
        }
        if Direction::from_byte(header[2]).is_none() {
            return Err(InvalidPacket::BadDirection { found: header[2] }.into());
        }
        match header[1] {
            VERSION_V2 => {}
            VERSION_V1 => return Err(InvalidPacket::LegacyVersion.into()),
            found => return Err(InvalidPacket::UnknownVersion { found }.into()),
        }

        self.read_full(&mut header[3..], Idle::Retry)?;
        let code = u16::from_le_bytes([header[4], header[5]]);
        let len = u16::from_le_bytes([header[6], header[7]]) as usize;
        if len > self.config.max_payload_size {
            return Err(InvalidPacket::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            }
            .into());
        }

        let mut payload = vec![0u8; len];
        self.read_full(&mut payload, Idle::Retry)?;

        let mut crc = [0u8; 1];
        self.read_full(&mut crc, Idle::Retry)?;

        debug!("> {}{}{}", Hex(&header), Hex(&payload), Hex(&crc));

        let expected = payload
            .iter()
            .fold(checksum(&header[CHECKSUM_START..]), |acc, &b| {
                crc8_dvb_s2(acc, b)
            });
        if expected != crc[0] {
            return Err(InvalidPacket::ChecksumMismatch {
                code,
                expected,
                actual: crc[0],
            }
            .into());
        }

        Ok(Some(Frame::new(code, payload)))
    }

    /// Fill `buf` completely. Returns `Ok(false)` only for [`Idle::Yield`]
    /// when nothing at all was available. An idle stream in the middle of
    /// `buf` is polled again every [`IDLE_BACKOFF`].
    fn read_full(&mut self, buf: &mut [u8], idle: Idle) -> Result<bool> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_idle(&err) => match idle {
                    Idle::Yield if filled == 0 => return Ok(false),
                    Idle::Fail if filled == 0 => return Err(FrameError::Io(err)),
                    _ => std::thread::sleep(IDLE_BACKOFF),
                },
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(true)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn is_idle(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use proptest::prelude::*;

    use super::*;
    use crate::codec::{build_frame, encode_frame_with_direction};

    fn reply(code: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame_with_direction(Direction::FromDevice, code, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    fn parse(bytes: Vec<u8>) -> Result<Frame> {
        FrameReader::new(Cursor::new(bytes)).read_frame()
    }

    #[test]
    fn read_single_frame() {
        let frame = parse(reply(1, &[0, 2, 5])).unwrap();
        assert_eq!(frame.code, 1);
        assert_eq!(frame.payload.as_ref(), &[0, 2, 5]);
        assert_eq!(frame.cursor(), 0);
    }

    #[test]
    fn accepts_both_directions() {
        let frame = parse(build_frame(101, b"x").unwrap()).unwrap();
        assert_eq!(frame.code, 101);
    }

    #[test]
    fn read_multiple_frames() {
        let mut wire = reply(2, b"INAV");
        wire.extend(reply(3, &[7, 1, 0]));
        wire.extend(reply(106, &[]));

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"INAV");
        assert_eq!(reader.read_frame().unwrap().code, 3);
        assert!(reader.read_frame().unwrap().payload.is_empty());
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: reply(4, b"slow"),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.code, 4);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let err = parse(Vec::new()).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_payload_is_not_invalid_packet() {
        let mut wire = reply(5, b"0123456789");
        wire.truncate(HEADER_SIZE + 4);
        let err = parse(wire).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(!err.is_invalid_packet());
    }

    #[test]
    fn bad_start_consumes_only_header() {
        let mut wire = b"#X>".to_vec();
        wire.extend(reply(1, &[]));
        let mut reader = FrameReader::new(Cursor::new(wire));

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidPacket(InvalidPacket::BadStart { found: b'#' })
        ));
        assert_eq!(reader.get_ref().position(), 3);

        assert_eq!(reader.read_frame().unwrap().code, 1);
    }

    #[test]
    fn bad_direction_rejected() {
        let mut wire = reply(1, &[]);
        wire[2] = b'!';
        let mut reader = FrameReader::new(Cursor::new(wire));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidPacket(InvalidPacket::BadDirection { found: b'!' })
        ));
        assert_eq!(reader.get_ref().position(), 3);
    }

    #[test]
    fn legacy_v1_rejected() {
        let wire = vec![b'$', b'M', b'>', 0, 1, 1];
        let err = parse(wire).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidPacket(InvalidPacket::LegacyVersion)
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut wire = reply(1, &[]);
        wire[1] = b'Y';
        let err = parse(wire).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidPacket(InvalidPacket::UnknownVersion { found: b'Y' })
        ));
    }

    #[test]
    fn checksum_mismatch_reports_values() {
        let mut wire = reply(106, &[1, 2, 3]);
        let last = wire.len() - 1;
        let good = wire[last];
        wire[last] ^= 0xFF;
        match parse(wire).unwrap_err() {
            FrameError::InvalidPacket(InvalidPacket::ChecksumMismatch {
                code,
                expected,
                actual,
            }) => {
                assert_eq!(code, 106);
                assert_eq!(expected, good);
                assert_eq!(actual, good ^ 0xFF);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stream_continues_after_corrupt_frame() {
        let mut wire = reply(7, b"bad");
        wire[9] ^= 0x01;
        wire.extend(reply(8, b"good"));

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert!(reader.read_frame().unwrap_err().is_invalid_packet());
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.code, 8);
        assert_eq!(frame.payload.as_ref(), b"good");
    }

    #[test]
    fn every_single_bit_flip_outside_length_is_detected() {
        let wire = reply(0x1234, &[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x7F]);
        let positions = (3..6).chain(8..wire.len());
        for pos in positions {
            for bit in 0..8 {
                let mut corrupt = wire.clone();
                corrupt[pos] ^= 1 << bit;
                let err = parse(corrupt).unwrap_err();
                assert!(
                    err.is_invalid_packet(),
                    "flip at byte {pos} bit {bit} gave {err:?}"
                );
            }
        }
    }

    #[test]
    fn oversized_declared_length_rejected() {
        let wire = reply(1, &[0u8; 64]);
        let cfg = FrameConfig {
            max_payload_size: 16,
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidPacket(InvalidPacket::PayloadTooLarge { size: 64, max: 16 })
        ));
    }

    #[test]
    fn poll_yields_when_idle() {
        let reader = ScriptedReader::new(vec![Step::Err(ErrorKind::TimedOut)], reply(9, b"ok"));
        let mut framed = FrameReader::new(reader);
        assert!(framed.poll_frame().unwrap().is_none());
        let frame = framed.poll_frame().unwrap().unwrap();
        assert_eq!(frame.code, 9);
    }

    #[test]
    fn read_frame_propagates_would_block_at_start() {
        let reader = ScriptedReader::new(vec![Step::Err(ErrorKind::WouldBlock)], reply(9, b"ok"));
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn idle_mid_frame_is_retried() {
        let reader = ScriptedReader::new(
            vec![
                Step::Data(4),
                Step::Err(ErrorKind::WouldBlock),
                Step::Err(ErrorKind::TimedOut),
            ],
            reply(10, b"split"),
        );
        let mut framed = FrameReader::new(reader);
        let frame = framed.poll_frame().unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"split");
    }

    #[test]
    fn idle_mid_frame_sleeps_between_retries() {
        let stalls = 5;
        let mut steps = vec![Step::Data(3)];
        steps.extend((0..stalls).map(|_| Step::Err(ErrorKind::WouldBlock)));
        let reader = ScriptedReader::new(steps, reply(10, b"stalled"));
        let mut framed = FrameReader::new(reader);

        let start = std::time::Instant::now();
        let frame = framed.poll_frame().unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"stalled");
        assert!(start.elapsed() >= IDLE_BACKOFF * stalls);
        assert!(framed.get_ref().steps.is_empty());
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = ScriptedReader::new(vec![Step::Err(ErrorKind::Interrupted)], reply(8, b"ok"));
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().code, 8);
    }

    #[test]
    fn other_io_errors_surface() {
        let reader =
            ScriptedReader::new(vec![Step::Err(ErrorKind::BrokenPipe)], reply(8, b"ok"));
        let mut framed = FrameReader::new(reader);
        let err = framed.poll_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        reader.set_max_payload_size(8);
        assert_eq!(reader.config().max_payload_size, 8);
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    proptest! {
        /// Single-bit corruption of flag, code, payload or checksum never
        /// yields a frame or a transport-level error.
        #[test]
        fn prop_bit_flip_is_invalid_packet(
            code in any::<u16>(),
            payload in prop::collection::vec(any::<u8>(), 0..64),
            pick in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let wire = reply(code, &payload);
            let positions: Vec<usize> = (3..6).chain(8..wire.len()).collect();
            let pos = positions[pick.index(positions.len())];
            let mut corrupt = wire;
            corrupt[pos] ^= 1 << bit;
            let err = parse(corrupt).unwrap_err();
            prop_assert!(err.is_invalid_packet());
        }
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    enum Step {
        Err(ErrorKind),
        Data(usize),
    }

    /// Plays `steps` first, then serves the remaining bytes freely.
    struct ScriptedReader {
        steps: std::collections::VecDeque<Step>,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl ScriptedReader {
        fn new(steps: Vec<Step>, bytes: Vec<u8>) -> Self {
            Self {
                steps: steps.into(),
                bytes,
                pos: 0,
            }
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let limit = match self.steps.pop_front() {
                Some(Step::Err(kind)) => return Err(std::io::Error::from(kind)),
                Some(Step::Data(n)) => n,
                None => usize::MAX,
            };
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len()).min(limit);
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
