//! Byte-stream transports for talking MSPv2 to a flight controller.
//!
//! The protocol layers above only need three things from a transport:
//! read bytes, write bytes, and a blocking [`Transport::reconnect`] that
//! retries until the device is back. Two implementations are provided:
//! - [`DevicePort`] — a serial device node (`/dev/ttyACM0`, `/dev/ttyUSB0`)
//! - [`TcpPort`] — an MSP-over-TCP endpoint such as an SITL simulator
//!
//! Line settings (baud rate, parity) are left to the OS.

pub mod device;
pub mod error;
pub mod tcp;
pub mod traits;

pub use device::DevicePort;
pub use error::{Result, TransportError};
pub use tcp::TcpPort;
pub use traits::{ReconnectPolicy, Transport};
