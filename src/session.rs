//! [`Session`] owns the child process, its pty and the terminal-mode snapshot.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::output_log::OutputLog;
use crate::pty::{PtyHandle, pty_size};
use crate::pty_reader::OutputReceiver;
use crate::terminal::TerminalSession;
use portable_pty::{Child, PtySize};
use std::io::IsTerminal;
use std::os::fd::AsFd;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An interactive child process driven through a pseudo-terminal.
///
/// Lifecycle: [`new`](Self::new) → [`start`](Self::start) → any number of
/// `send`/`expect`/`interact` calls → [`close`](Self::close). The pty is only
/// open between a successful start and close (or the end of an interact);
/// operations outside that window fail with [`Error::NotRunning`].
///
/// Dropping a session closes it.
pub struct Session {
    command: String,
    args: Vec<String>,
    config: SessionConfig,
    pty: Option<PtyHandle>,
    child: Option<Box<dyn Child + Send + Sync>>,
    terminal: Option<TerminalSession>,
    log: OutputLog,
    closed: bool,
}

impl Session {
    /// Prepare a session for `command`. Nothing is launched yet.
    pub fn new<S: AsRef<str>>(command: &str, args: &[S]) -> Self {
        Self::with_config(command, args, SessionConfig::default())
    }

    pub fn with_config<S: AsRef<str>>(command: &str, args: &[S], config: SessionConfig) -> Self {
        Session {
            command: command.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            config,
            pty: None,
            child: None,
            terminal: None,
            log: OutputLog::new(),
            closed: false,
        }
    }

    /// Open the pty, launch the child on it and put the controlling terminal
    /// into raw mode.
    ///
    /// If raw mode cannot be acquired the child is killed again, so a failed
    /// start leaves nothing behind.
    pub fn start(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.child.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let (pty, mut child) =
            PtyHandle::spawn(&self.command, &self.args, &self.config, self.initial_size())?;
        log::debug!(
            "session: spawned '{}' (pid {:?})",
            self.command,
            child.process_id()
        );

        if self.config.raw_mode {
            match self.acquire_terminal() {
                Ok(terminal) => self.terminal = terminal,
                Err(e) => {
                    self.log.record(format_args!("failed to enter raw mode: {e}"));
                    let pid = child.process_id();
                    match child.kill() {
                        Ok(()) => {
                            let _ = child.wait();
                            if let Some(pid) = pid {
                                self.log.record(format_args!("killed child {pid}"));
                            }
                        }
                        Err(kill_err) => log::warn!("session: {kill_err}"),
                    }
                    return Err(e);
                }
            }
        }

        self.pty = Some(pty);
        self.child = Some(child);
        Ok(())
    }

    /// Write `data` verbatim to the pty.
    pub fn send(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        let pty = self.pty.as_mut().ok_or(Error::NotRunning)?;
        pty.write(data.as_ref())
    }

    /// Write `line` followed by `\r\n`.
    pub fn send_line(&mut self, line: impl AsRef<[u8]>) -> Result<()> {
        let line = line.as_ref();
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line);
        data.extend_from_slice(b"\r\n");
        self.send(data)
    }

    /// Restore the terminal, close the pty and kill the child if it is still
    /// running.
    ///
    /// Cleanup always runs to completion; restore failures are only logged.
    /// Returns the error from killing the child, if any. Calling it again is
    /// a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut terminal) = self.terminal.take() {
            if let Err(e) = terminal.restore() {
                log::warn!("session: {e}");
                self.log.record(format_args!("failed to restore terminal: {e}"));
            }
        }
        self.pty = None;
        self.closed = true;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("session: child already exited with {status:?}");
                Ok(())
            }
            Ok(None) => match child.kill() {
                Ok(()) => {
                    let _ = child.wait();
                    log::debug!("session: child killed");
                    Ok(())
                }
                Err(e) => {
                    self.log.record(format_args!("failed to kill child: {e}"));
                    Err(Error::Kill(e))
                }
            },
            Err(e) => {
                self.log.record(format_args!("failed to query child status: {e}"));
                Err(Error::Wait(e))
            }
        }
    }

    /// Everything recorded in the diagnostic log so far.
    pub fn log_output(&self) -> String {
        self.log.snapshot()
    }

    /// True while the child has been started and has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Process id of the child, once started.
    pub fn process_id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.process_id())
    }

    /// True when [`start`](Self::start) put the controlling terminal into raw mode.
    pub fn is_raw(&self) -> bool {
        self.terminal.as_ref().is_some_and(TerminalSession::is_raw)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn log(&self) -> &OutputLog {
        &self.log
    }

    /// Fails with [`Error::NotRunning`] unless the pty is open.
    pub(crate) fn ensure_running(&self) -> Result<()> {
        match self.pty {
            Some(_) => Ok(()),
            None => Err(Error::NotRunning),
        }
    }

    pub(crate) fn output(&self) -> Result<Arc<Mutex<OutputReceiver>>> {
        self.pty
            .as_ref()
            .map(|pty| pty.output.clone())
            .ok_or(Error::NotRunning)
    }

    /// Move the pty out of the session; dropping it closes the master.
    pub(crate) fn take_pty(&mut self) -> Result<(PtyHandle, &mut Box<dyn Child + Send + Sync>)> {
        match (self.pty.take(), self.child.as_mut()) {
            (Some(pty), Some(child)) => Ok((pty, child)),
            (pty, _) => {
                self.pty = pty;
                Err(Error::NotRunning)
            }
        }
    }

    /// Raw mode on the configured terminal, or on stdin when it is a tty.
    fn acquire_terminal(&self) -> Result<Option<TerminalSession>> {
        if let Some(fd) = &self.config.terminal {
            return TerminalSession::acquire(fd.as_fd()).map(Some);
        }
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            log::debug!("session: stdin is not a tty, leaving its mode unchanged");
            return Ok(None);
        }
        TerminalSession::acquire(stdin.as_fd()).map(Some)
    }

    fn initial_size(&self) -> PtySize {
        if self.config.inherit_size && std::io::stdin().is_terminal() {
            if let Ok((cols, rows)) = crossterm::terminal::size() {
                return pty_size(rows, cols);
            }
        }
        pty_size(self.config.rows, self.config.cols)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("session: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SessionConfig {
        SessionConfig::default().with_raw_mode(false)
    }

    #[test]
    fn test_new_does_not_launch() {
        let session = Session::new("cat", &[] as &[&str]);
        assert!(session.process_id().is_none());
    }

    #[test]
    fn test_send_before_start_fails() {
        let mut session = Session::with_config("cat", &[] as &[&str], quiet());
        assert!(matches!(session.send("x"), Err(Error::NotRunning)));
        assert!(matches!(session.send_line("x"), Err(Error::NotRunning)));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut session = Session::with_config("cat", &[] as &[&str], quiet());
        session.start().unwrap();
        assert!(session.is_running());
        assert!(matches!(session.start(), Err(Error::AlreadyStarted)));
        session.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = Session::with_config("cat", &[] as &[&str], quiet());
        session.start().unwrap();
        session.close().unwrap();
        session.close().unwrap();
        assert!(!session.is_running());
        assert!(matches!(session.send("x"), Err(Error::NotRunning)));
        assert!(matches!(session.start(), Err(Error::Closed)));
    }

    #[test]
    fn test_close_without_start() {
        let mut session = Session::new("cat", &[] as &[&str]);
        session.close().unwrap();
    }

    #[test]
    fn test_take_pty_requires_start() {
        let mut session = Session::with_config("cat", &[] as &[&str], quiet());
        assert!(matches!(session.take_pty(), Err(Error::NotRunning)));
    }
}
