use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::pty_reader::{OutputReceiver, spawn_reader};
use portable_pty::{Child, CommandBuilder, MasterPty, PtyPair, PtySize};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The master side of a pty with a child attached to its slave.
///
/// Dropping the handle closes the master.
pub(crate) struct PtyHandle {
    pub(crate) master: Box<dyn MasterPty + Send>,
    pub(crate) writer: Box<dyn Write + Send>,
    pub(crate) output: Arc<Mutex<OutputReceiver>>,
}

impl PtyHandle {
    /// Open a pty and launch `command` with the slave as its controlling
    /// terminal and stdio.
    pub(crate) fn spawn(
        command: &str,
        args: &[String],
        config: &SessionConfig,
        size: PtySize,
    ) -> Result<(Self, Box<dyn Child + Send + Sync>)> {
        let pty_system = portable_pty::native_pty_system();
        let PtyPair { master, slave } = pty_system.openpty(size).map_err(Error::pty)?;

        let mut cmd = CommandBuilder::new(command);
        cmd.args(args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = slave
            .spawn_command(cmd)
            .map_err(|e| Error::launch(command, e))?;
        // Only the child keeps the slave open, so the master sees end of
        // stream once the child is gone.
        drop(slave);

        let writer = master.take_writer().map_err(Error::pty)?;
        let reader = master.try_clone_reader().map_err(Error::pty)?;

        let handle = PtyHandle {
            master,
            writer,
            output: Arc::new(Mutex::new(spawn_reader(reader))),
        };
        Ok((handle, child))
    }

    /// Write data to the program's stdin
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }
}

pub(crate) fn pty_size(rows: u16, cols: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Resize the PTY
pub(crate) fn resize(master: &dyn MasterPty, rows: u16, cols: u16) -> Result<()> {
    master.resize(pty_size(rows, cols)).map_err(Error::pty)
}
