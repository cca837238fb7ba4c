//! [`OutputLog`]: append-only diagnostic trace shared by the session's tasks.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Concurrency-safe text buffer recording internal events (read errors,
/// timeouts, resize failures, cleanup failures).
///
/// Cloning yields another handle to the same buffer. Every entry is also
/// forwarded to the `log` facade at debug level.
#[derive(Clone, Default)]
pub struct OutputLog {
    inner: Arc<Mutex<String>>,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub fn record(&self, entry: fmt::Arguments<'_>) {
        log::debug!("{entry}");
        let mut buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        fmt::write(&mut *buf, entry).ok();
        buf.push('\n');
    }

    /// The entire contents as one string.
    pub fn snapshot(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl fmt::Debug for OutputLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputLog")
            .field("len", &self.snapshot().len())
            .finish()
    }
}
