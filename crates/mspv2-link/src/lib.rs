//! Connection management for MSPv2 flight controller links.
//!
//! A [`Connection`] owns a transport and runs a receive loop on its own
//! thread. Every tick the loop reads at most one frame and hands it to the
//! handler registered for its code, or to the default handler. Malformed
//! frames are logged and skipped; any other read failure puts the
//! connection in [`ConnectionState::Reconnecting`] until the transport's
//! blocking reconnect returns. Writes made while not active are dropped and
//! report zero bytes.
//!
//! ```no_run
//! use mspv2_frame::{codes, RawGps};
//! use mspv2_link::{Connection, ConnectionConfig};
//! use mspv2_transport::DevicePort;
//!
//! # fn main() -> mspv2_link::Result<()> {
//! let port = DevicePort::open("/dev/ttyACM0")?;
//! let conn = Connection::open(port, ConnectionConfig::default())?;
//! conn.register(codes::RAW_GPS, |frame, _| {
//!     let gps: RawGps = frame.read()?;
//!     println!("{} satellites", gps.num_sat);
//!     Ok(())
//! })?;
//! conn.write(codes::RAW_GPS, &[])?;
//! # conn.close()
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod handler;
pub mod state;

pub use connection::{Connection, ConnectionConfig, ConnectionHandle, DEFAULT_TICK_INTERVAL};
pub use error::{LinkError, Result};
pub use handler::Handler;
pub use state::ConnectionState;
