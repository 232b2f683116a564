use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{ReconnectPolicy, Transport};

/// MSP over TCP, as exposed by SITL simulators and serial-to-network bridges.
pub struct TcpPort {
    stream: TcpStream,
    addr: String,
    policy: ReconnectPolicy,
    read_timeout: Option<Duration>,
}

impl TcpPort {
    /// Connect to `addr` (`host:port`).
    pub fn connect(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let stream = connect_stream(&addr)?;
        info!(%addr, "connected to tcp endpoint");
        Ok(Self {
            stream,
            addr,
            policy: ReconnectPolicy::default(),
            read_timeout: None,
        })
    }

    /// Override the reconnect policy.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The remote address this port connects to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Transport for TcpPort {
    fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            stream: self.stream.try_clone()?,
            addr: self.addr.clone(),
            policy: self.policy.clone(),
            read_timeout: self.read_timeout,
        })
    }

    fn reconnect(&mut self) -> Result<()> {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        let stream = self.policy.run(&self.addr, || match connect_stream(&self.addr) {
            Ok(stream) => Ok(Some(stream)),
            Err(TransportError::Connect { source, .. })
                if source.kind() != ErrorKind::InvalidInput =>
            {
                debug!(addr = %self.addr, error = %source, "endpoint not reachable yet");
                Ok(None)
            }
            Err(err) => Err(err),
        })?;
        stream.set_read_timeout(self.read_timeout)?;
        self.stream = stream;
        info!(addr = %self.addr, "reconnected to tcp endpoint");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        self.read_timeout = timeout;
        Ok(())
    }
}

fn connect_stream(addr: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl Read for TcpPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for TcpPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpPort")
            .field("addr", &self.addr)
            .field("policy", &self.policy)
            .finish()
    }
}
