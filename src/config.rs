//! Session configuration.

use std::ffi::OsString;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Timeout used by [`Session::expect`](crate::Session::expect) and
/// [`Session::expect_any`](crate::Session::expect_any).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback tick for re-evaluating patterns when no new output arrives.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How often the interactive bridge checks whether the child has exited.
pub const DEFAULT_EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default expect timeout.
    pub timeout: Duration,

    /// Upper bound between two pattern evaluations while expecting.
    pub poll_interval: Duration,

    /// Process-exit watcher tick during interact.
    pub exit_poll_interval: Duration,

    /// Pty rows when the controlling terminal size is not used.
    pub rows: u16,

    /// Pty columns when the controlling terminal size is not used.
    pub cols: u16,

    /// Start the pty with the controlling terminal's size when available.
    pub inherit_size: bool,

    /// Put the controlling terminal into raw mode between start and close.
    pub raw_mode: bool,

    /// Terminal to put into raw mode instead of stdin.
    pub terminal: Option<Arc<OwnedFd>>,

    /// Working directory for the child.
    pub cwd: Option<PathBuf>,

    /// Extra environment variables for the child.
    pub env: Vec<(OsString, OsString)>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            exit_poll_interval: DEFAULT_EXIT_POLL_INTERVAL,
            rows: 24,
            cols: 80,
            inherit_size: true,
            raw_mode: true,
            terminal: None,
            cwd: None,
            env: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Zero is clamped to one microsecond so the evaluation loop never spins.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_micros(1));
        self
    }

    pub fn with_exit_poll_interval(mut self, interval: Duration) -> Self {
        self.exit_poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Fixed pty size; disables inheriting the controlling terminal's size.
    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self.inherit_size = false;
        self
    }

    pub fn with_raw_mode(mut self, raw_mode: bool) -> Self {
        self.raw_mode = raw_mode;
        self
    }

    /// Use `fd` as the controlling terminal. Unlike stdin, it must be a tty
    /// when raw mode is on, or [`Session::start`](crate::Session::start) fails.
    pub fn with_terminal(mut self, fd: OwnedFd) -> Self {
        self.terminal = Some(Arc::new(fd));
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}
