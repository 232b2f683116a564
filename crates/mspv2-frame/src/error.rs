use std::fmt;

/// Why a frame was rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidPacket {
    /// First header byte was not `'$'`.
    BadStart { found: u8 },
    /// Direction byte was neither `'<'` nor `'>'`.
    BadDirection { found: u8 },
    /// An MSPv1 frame (`'M'` version marker); only MSPv2 is accepted.
    LegacyVersion,
    /// Unrecognized version marker.
    UnknownVersion { found: u8 },
    /// Declared payload length exceeds the configured limit.
    PayloadTooLarge { size: usize, max: usize },
    /// Checksum byte does not match the recomputed CRC.
    ChecksumMismatch { code: u16, expected: u8, actual: u8 },
}

impl fmt::Display for InvalidPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadStart { found } => write!(f, "invalid header char 0x{found:02x}"),
            Self::BadDirection { found } => write!(f, "invalid direction char 0x{found:02x}"),
            Self::LegacyVersion => write!(f, "MSPv1 frame ignored"),
            Self::UnknownVersion { found } => write!(f, "unknown version marker 0x{found:02x}"),
            Self::PayloadTooLarge { size, max } => {
                write!(f, "declared payload of {size} bytes exceeds limit {max}")
            }
            Self::ChecksumMismatch {
                code,
                expected,
                actual,
            } => write!(
                f,
                "invalid CRC 0x{actual:02x}, expecting 0x{expected:02x} in code {code}"
            ),
        }
    }
}

/// Errors that can occur during frame encoding/decoding and payload marshaling.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Malformed or corrupt frame. The stream is still usable.
    #[error("invalid packet: {0}")]
    InvalidPacket(InvalidPacket),

    /// Decoding needed more payload bytes than remain in the frame.
    #[error("truncated payload (needed {needed} bytes, {remaining} remaining)")]
    TruncatedPayload { needed: usize, remaining: usize },

    /// The value shape cannot be expressed on the wire.
    #[error("unsupported value shape: {0}")]
    UnsupportedType(String),

    /// The payload does not fit the 16-bit length field or the configured limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received or written.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether this error only condemns the current frame, not the connection.
    pub fn is_invalid_packet(&self) -> bool {
        matches!(self, Self::InvalidPacket(_))
    }
}

impl From<InvalidPacket> for FrameError {
    fn from(reason: InvalidPacket) -> Self {
        Self::InvalidPacket(reason)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
