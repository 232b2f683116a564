//! MSPv2 framing, checksum and payload marshaling.
//!
//! Every message on the wire is framed as:
//! - a 3-byte header: `'$'`, version `'X'`, direction `'<'` or `'>'`
//! - a flag byte, a little-endian `u16` code and a little-endian `u16` length
//! - the payload, then a CRC-8/DVB-S2 checksum over flag through payload
//!
//! [`FrameReader`] validates each step and returns whole frames; payloads are
//! encoded and decoded structurally through [`Value`] and [`Marshal`].

pub mod checksum;
pub mod codec;
pub mod codes;
pub mod error;
pub mod messages;
pub mod reader;
pub mod value;
pub mod writer;

pub use checksum::{checksum, crc8_dvb_s2};
pub use codec::{
    build_frame, encode_frame, encode_frame_with_direction, Direction, Frame, FrameConfig, Hex,
    HEADER_SIZE, MAX_PAYLOAD,
};
pub use codes::code_name;
pub use error::{FrameError, InvalidPacket, Result};
pub use messages::{
    read_text, ApiVersion, BoardInfo, BuildInfo, FcVersion, NavStatus, RawGps, SerialPortConfig,
    Waypoint,
};
pub use reader::FrameReader;
pub use value::{decode_into, encode, encode_args, encode_value, Field, Marshal, RecordFields, Value};
pub use writer::{frame_len, FrameWriter};
