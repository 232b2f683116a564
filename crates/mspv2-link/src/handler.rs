use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use mspv2_frame::{code_name, Frame};
use tracing::warn;

use crate::connection::ConnectionHandle;
use crate::error::{LinkError, Result};

/// A frame handler.
///
/// Handlers run on the receive loop thread, one frame at a time. An `Err`
/// or a panic is logged and the loop moves on to the next frame.
pub type Handler = Arc<dyn Fn(&mut Frame, &ConnectionHandle) -> Result<()> + Send + Sync>;

/// Code → handler map plus the fallback for unregistered codes.
pub(crate) struct HandlerTable {
    inner: RwLock<Handlers>,
}

struct Handlers {
    by_code: HashMap<u16, Handler>,
    fallback: Handler,
}

fn log_unhandled(frame: &mut Frame, _conn: &ConnectionHandle) -> Result<()> {
    warn!(
        code = frame.code,
        name = code_name(frame.code),
        len = frame.payload.len(),
        "no handler for message code"
    );
    Ok(())
}

impl HandlerTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(Handlers {
                by_code: HashMap::new(),
                fallback: Arc::new(log_unhandled),
            }),
        }
    }

    /// Install `handler` for `code`, returning the one it replaces.
    pub(crate) fn insert(&self, code: u16, handler: Handler) -> Result<Option<Handler>> {
        let mut guard = self.write()?;
        Ok(guard.by_code.insert(code, handler))
    }

    pub(crate) fn remove(&self, code: u16) -> Result<Option<Handler>> {
        let mut guard = self.write()?;
        Ok(guard.by_code.remove(&code))
    }

    pub(crate) fn set_fallback(&self, handler: Handler) -> Result<()> {
        self.write()?.fallback = handler;
        Ok(())
    }

    /// The handler for `code`, or the fallback. The lock is released on return.
    pub(crate) fn lookup(&self, code: u16) -> Result<Handler> {
        let guard = self
            .inner
            .read()
            .map_err(|_| LinkError::Poisoned("handler table"))?;
        Ok(guard
            .by_code
            .get(&code)
            .unwrap_or(&guard.fallback)
            .clone())
    }

    pub(crate) fn contains(&self, code: u16) -> bool {
        self.inner
            .read()
            .map(|guard| guard.by_code.contains_key(&code))
            .unwrap_or(false)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Handlers>> {
        self.inner
            .write()
            .map_err(|_| LinkError::Poisoned("handler table"))
    }
}
