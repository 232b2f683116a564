use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::checksum;
use crate::error::{FrameError, Result};

/// Fixed header: `'$'`, version, direction, flag, code (2), length (2).
pub const HEADER_SIZE: usize = 8;

/// Frame start marker.
pub const START: u8 = b'$';

/// MSPv2 version marker.
pub const VERSION_V2: u8 = b'X';

/// MSPv1 version marker (rejected).
pub const VERSION_V1: u8 = b'M';

/// The checksum covers everything after the `'$'`, version and direction bytes.
pub const CHECKSUM_START: usize = 3;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Which way a frame travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to flight controller (`'<'`).
    ToDevice,
    /// Flight controller to host (`'>'`).
    FromDevice,
}

impl Direction {
    /// The wire byte for this direction.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::ToDevice => b'<',
            Self::FromDevice => b'>',
        }
    }

    /// Parse a direction byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'<' => Some(Self::ToDevice),
            b'>' => Some(Self::FromDevice),
            _ => None,
        }
    }
}

/// One decoded MSP message: a code plus its raw payload.
///
/// Typed reads consume the payload front to back; the cursor never moves
/// past the end of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command / message code.
    pub code: u16,
    /// Raw payload bytes.
    pub payload: Bytes,
    cursor: usize,
}

impl Frame {
    /// Create a new frame with the cursor at the start of the payload.
    pub fn new(code: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
            cursor: 0,
        }
    }

    /// Current read offset into the payload.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Payload bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.cursor
    }

    /// The unconsumed tail of the payload.
    pub fn remaining_payload(&self) -> &[u8] {
        &self.payload[self.cursor..]
    }

    /// Move the cursor back to the start of the payload.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&[u8]> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(FrameError::TruncatedPayload {
                needed: n,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.payload[start..self.cursor])
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// The total wire size of this frame (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + 1
    }
}

/// Encode a host→device frame into `dst`.
///
/// Wire format:
/// ```text
/// ┌─────┬─────┬─────┬──────┬──────────┬──────────┬─────────┬─────┐
/// │ '$' │ 'X' │ dir │ flag │ code     │ length   │ payload │ crc │
/// │     │     │ '<' │ 0    │ (2B LE)  │ (2B LE)  │         │     │
/// └─────┴─────┴─────┴──────┴──────────┴──────────┴─────────┴─────┘
///                    └──────────── CRC-8/DVB-S2 ───────────┘
/// ```
pub fn encode_frame(code: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_frame_with_direction(Direction::ToDevice, code, payload, dst)
}

/// Encode a frame travelling in `direction` into `dst`.
pub fn encode_frame_with_direction(
    direction: Direction,
    code: u16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let start = dst.len();
    dst.reserve(HEADER_SIZE + payload.len() + 1);
    dst.put_u8(START);
    dst.put_u8(VERSION_V2);
    dst.put_u8(direction.as_byte());
    dst.put_u8(0);
    dst.put_u16_le(code);
    dst.put_u16_le(payload.len() as u16);
    dst.put_slice(payload);
    let crc = checksum(&dst[start + CHECKSUM_START..]);
    dst.put_u8(crc);
    Ok(())
}

/// Build a complete host→device frame as a byte vector.
pub fn build_frame(code: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len() + 1);
    encode_frame(code, payload, &mut buf)?;
    Ok(buf.to_vec())
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 65535 (no extra limit).
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
        }
    }
}

/// Lowercase hex rendering for frame dumps in logs.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
