use std::io::{Read, Write};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Result, TransportError};

/// A byte-stream connection to a flight controller.
///
/// The connection layer reads from one handle and writes through a second
/// one obtained with [`Transport::try_clone`], so both halves must refer to
/// the same open connection.
pub trait Transport: Read + Write + Send + Sized + 'static {
    /// Create another handle to the same open connection.
    fn try_clone(&self) -> Result<Self>;

    /// Re-establish the connection after an I/O failure (blocking).
    ///
    /// Implementations retry internally according to their own policy and
    /// only return an error once they have given up. Handles previously
    /// obtained with [`Transport::try_clone`] are stale afterwards.
    fn reconnect(&mut self) -> Result<()>;

    /// Human-readable description for logs, e.g. the device path.
    fn describe(&self) -> String;

    /// Bound how long a read may block with no data before it fails with
    /// `WouldBlock` or `TimedOut`.
    ///
    /// The receive loop relies on this to notice a close request. Transports
    /// whose reads never block may ignore it.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let _ = timeout;
        Ok(())
    }
}

/// How long and how often a transport retries while reconnecting.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay between attempts.
    pub poll_interval: Duration,
    /// Give up after this long. `None` retries forever.
    pub max_wait: Option<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            max_wait: None,
        }
    }
}

impl ReconnectPolicy {
    /// Run `attempt` until it yields a value, fails hard, or the policy expires.
    ///
    /// `Ok(None)` from `attempt` means "not yet, try again".
    pub fn run<T, F>(&self, target: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Result<Option<T>>,
    {
        let start = Instant::now();
        loop {
            if let Some(value) = attempt()? {
                return Ok(value);
            }

            let waited = start.elapsed();
            if let Some(max_wait) = self.max_wait {
                if waited >= max_wait {
                    return Err(TransportError::ReconnectTimeout {
                        target: target.to_string(),
                        waited,
                    });
                }
            }

            trace!(target_name = target, ?waited, "reconnect attempt pending");
            std::thread::sleep(self.poll_interval);
        }
    }
}
