use mspv2_transport::TransportError;

/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame or marshaling error.
    #[error("frame error: {0}")]
    Frame(#[from] mspv2_frame::FrameError),

    /// The transport gave up reconnecting; the receive loop has stopped.
    #[error("reconnect failed: {0}")]
    ReconnectFailed(TransportError),

    /// A handler reported a failure of its own.
    #[error("handler failed: {0}")]
    Handler(String),

    /// The receive loop thread could not be started.
    #[error("failed to spawn receive loop: {0}")]
    Spawn(std::io::Error),

    /// The receive loop thread panicked.
    #[error("receive loop panicked")]
    LoopPanicked,

    /// The receive loop has stopped; the connection takes no more writes.
    #[error("connection closed")]
    Closed,

    /// A shared lock was poisoned by a panicking thread.
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

impl LinkError {
    /// Build a [`LinkError::Handler`] from any displayable message.
    pub fn handler(message: impl std::fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
