//! Raw mode on the controlling terminal.
//!
//! [`TerminalSession`] snapshots the terminal's mode, switches it to raw and
//! puts the snapshot back exactly once, either explicitly through
//! [`TerminalSession::restore`] or when dropped.

use crate::error::{Error, Result};
use nix::errno::Errno;
use nix::sys::termios::{self, SetArg, Termios};
use std::io::{self, IsTerminal};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

pub struct TerminalSession {
    fd: OwnedFd,
    saved: Option<Termios>,
}

impl TerminalSession {
    /// Put `fd` into raw mode (no echo, no line buffering, no signal keys).
    ///
    /// Fails with [`Error::TerminalMode`] when `fd` is not a terminal.
    pub fn acquire(fd: BorrowedFd<'_>) -> Result<Self> {
        let fd = fd.try_clone_to_owned().map_err(Error::TerminalMode)?;
        if !fd.is_terminal() {
            return Err(Error::TerminalMode(io::Error::from(Errno::ENOTTY)));
        }

        let saved = termios::tcgetattr(&fd).map_err(|e| Error::TerminalMode(e.into()))?;
        let mut raw = saved.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&fd, SetArg::TCSANOW, &raw)
            .map_err(|e| Error::TerminalMode(e.into()))?;
        log::debug!("terminal: raw mode enabled");

        Ok(Self {
            fd,
            saved: Some(saved),
        })
    }

    /// True while a raw-mode snapshot is held.
    pub fn is_raw(&self) -> bool {
        self.saved.is_some()
    }

    /// Restore the mode captured by [`acquire`](Self::acquire).
    ///
    /// The snapshot is consumed even if restoring fails, so later calls and
    /// the drop are no-ops.
    pub fn restore(&mut self) -> Result<()> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        termios::tcsetattr(self.fd.as_fd(), SetArg::TCSANOW, &saved)
            .map_err(|e| Error::TerminalMode(e.into()))?;
        log::debug!("terminal: mode restored");
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            log::warn!("{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::pty::{Winsize, openpty};
    use nix::sys::termios::LocalFlags;

    fn open_tty() -> nix::pty::OpenptyResult {
        openpty(None::<&Winsize>, None::<&Termios>).expect("openpty")
    }

    fn local_flags(fd: &OwnedFd) -> LocalFlags {
        termios::tcgetattr(fd).unwrap().local_flags
    }

    #[test]
    fn test_acquire_and_restore_tty() {
        let pty = open_tty();
        assert!(local_flags(&pty.slave).contains(LocalFlags::ICANON));

        let mut session = TerminalSession::acquire(pty.slave.as_fd()).unwrap();
        assert!(session.is_raw());
        let flags = local_flags(&pty.slave);
        assert!(!flags.contains(LocalFlags::ICANON));
        assert!(!flags.contains(LocalFlags::ECHO));

        session.restore().unwrap();
        assert!(!session.is_raw());
        assert!(local_flags(&pty.slave).contains(LocalFlags::ICANON));

        // Second restore is a no-op.
        session.restore().unwrap();
    }

    #[test]
    fn test_drop_restores() {
        let pty = open_tty();
        {
            let _session = TerminalSession::acquire(pty.slave.as_fd()).unwrap();
            assert!(!local_flags(&pty.slave).contains(LocalFlags::ECHO));
        }
        assert!(local_flags(&pty.slave).contains(LocalFlags::ECHO));
    }

    #[test]
    fn test_non_tty_is_rejected() {
        let (read_end, _write_end) = nix::unistd::pipe().unwrap();
        let err = TerminalSession::acquire(read_end.as_fd()).err().unwrap();
        assert!(matches!(err, Error::TerminalMode(_)), "unexpected error: {err}");
    }
}
