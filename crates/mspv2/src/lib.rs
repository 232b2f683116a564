//! Host-side client for the MSPv2 flight controller protocol.
//!
//! # Crate Structure
//!
//! - [`transport`] — Byte-stream transports (serial device node, TCP) with reconnect
//! - [`frame`] — Frame codec, CRC-8/DVB-S2 checksum, payload marshaling, message codes
//! - [`link`] — Connection manager with receive loop and handler dispatch (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use mspv2_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mspv2_frame::*;
}

/// Re-export connection types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use mspv2_link::*;
}
