use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a connection as seen by writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Frames are read and writes reach the transport.
    Active = 0,
    /// The transport is being re-established; writes are dropped.
    Reconnecting = 1,
    /// A reboot was requested; writes are dropped until the process restarts.
    Rebooting = 2,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Active,
            1 => Self::Reconnecting,
            _ => Self::Rebooting,
        }
    }

    /// Lowercase name for logs and output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Reconnecting => "reconnecting",
            Self::Rebooting => "rebooting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic cell holding a [`ConnectionState`].
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Returns false if the state was not `from`.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
