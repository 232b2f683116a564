use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{ReconnectPolicy, Transport};

/// Serial device node transport (`/dev/ttyACM0`, `/dev/tty.usbmodem1`, ...).
///
/// The node is opened non-blocking, so a read with nothing pending fails
/// with `WouldBlock`. A terminal node is switched to raw mode on every open,
/// so no byte is translated, echoed or turned into a signal. The baud rate
/// is left alone; USB CDC flight controllers ignore it. When the board reboots or is
/// unplugged the node disappears; [`DevicePort::reconnect`] waits for it to
/// come back before reopening, since opening a missing node on macOS can
/// reset the USB hub.
pub struct DevicePort {
    file: File,
    path: PathBuf,
    policy: ReconnectPolicy,
}

impl DevicePort {
    /// Open the device at `path` for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_rw(&path)?;
        info!(?path, "opened serial device");
        Ok(Self {
            file,
            path,
            policy: ReconnectPolicy::default(),
        })
    }

    /// Override the reconnect policy.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the device node currently exists.
    pub fn is_present(&self) -> bool {
        if cfg!(windows) {
            // COM ports have no filesystem node to probe.
            return true;
        }
        std::fs::metadata(&self.path).is_ok()
    }
}

impl Transport for DevicePort {
    fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            policy: self.policy.clone(),
        })
    }

    fn reconnect(&mut self) -> Result<()> {
        let target = self.path.display().to_string();
        let file = self.policy.run(&target, || {
            if !self.is_present() {
                return Ok(None);
            }
            open_rw(&self.path).map(Some)
        })?;
        self.file = file;
        info!(path = ?self.path, "reopened serial device");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn open_rw(path: &Path) -> Result<File> {
    debug!(?path, "opening device");
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        // Reads return WouldBlock instead of parking the receive loop, and
        // the board must not become our controlling terminal.
        options.custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY);
    }
    let open_err = |source| TransportError::Open {
        path: path.to_path_buf(),
        source,
    };
    let file = options.open(path).map_err(open_err)?;
    #[cfg(unix)]
    make_raw(&file).map_err(open_err)?;
    Ok(file)
}

/// Put a terminal into raw mode: 8-bit clean, no echo, no line editing.
/// Anything that is not a terminal is left untouched.
#[cfg(unix)]
fn make_raw(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` stays open for the duration of the call since `file` is
    // borrowed, and `tio` is a valid termios for tcgetattr to fill.
    unsafe {
        if libc::isatty(fd) != 1 {
            return Ok(());
        }
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    debug!(fd, "terminal set to raw mode");
    Ok(())
}

impl Read for DevicePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for DevicePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl std::fmt::Debug for DevicePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePort")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish()
    }
}
