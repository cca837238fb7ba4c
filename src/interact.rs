//! Transparent forwarding between a terminal and the child.
//!
//! Input bytes are copied to the pty on a blocking thread that polls the
//! input descriptor, so it can be stopped at teardown. Output is copied from
//! the pty reader as it arrives. Alongside those, the bridge handles control
//! events and watches for the child to exit. The first of child exit, a
//! terminate event or a pty read error ends the session.

use crate::error::{Error, Result};
use crate::event::ControlEvent;
use crate::output_log::OutputLog;
use crate::pty::{self, PtyHandle};
use crate::pty_reader::{OutputReceiver, ReadEvent};
use crate::session::Session;
use crate::signals;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use portable_pty::{Child, ExitStatus, MasterPty};
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver};

/// How often the input thread checks whether it should stop.
const INPUT_POLL: Duration = Duration::from_millis(50);

/// How long to keep copying output after the child has exited.
const FLUSH_GRACE: Duration = Duration::from_millis(100);

/// Why an interactive session ended.
#[derive(Debug)]
pub enum InteractExit {
    /// The child exited.
    Exited(ExitStatus),

    /// A terminate event (interrupt or suspend) ended the session; the child
    /// may still be running.
    Terminated,
}

impl Session {
    /// Connect the controlling terminal to the child until the child exits or
    /// an interrupt/suspend signal arrives.
    ///
    /// Window-size changes are propagated to the pty. The pty is closed when
    /// this returns; [`close`](Session::close) still has to be called to
    /// terminate the child and restore the terminal.
    pub async fn interact(&mut self) -> Result<InteractExit> {
        // Tokio keeps signal handlers installed, so only install them for a
        // session that can actually interact.
        self.ensure_running()?;
        let (tx, rx) = mpsc::channel(8);
        let listener = signals::listen(tx)?;
        let result = self.interact_with(io::stdin(), io::stdout(), rx).await;
        listener.abort();
        let _ = listener.await;
        result
    }

    /// Like [`interact`](Self::interact), with explicit input, output and
    /// control events instead of stdin, stdout and OS signals.
    pub async fn interact_with<I, O>(
        &mut self,
        input: I,
        mut output: O,
        mut controls: Receiver<ControlEvent>,
    ) -> Result<InteractExit>
    where
        I: AsFd + Send + 'static,
        O: Write + Send,
    {
        let exit_poll = self.config().exit_poll_interval;
        let log = self.log().clone();
        let (pty, child) = self.take_pty()?;
        let PtyHandle {
            master,
            writer,
            output: pty_output,
        } = pty;
        let master = Mutex::new(master);
        let mut rx = pty_output.lock().await;

        let stop = Arc::new(AtomicBool::new(false));
        let input_task = {
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || forward_input(input, writer, &stop))
        };

        log::debug!("interact: started");
        let result = tokio::select! {
            res = forward_output(&mut rx, &mut output, &log) => res,
            res = wait_for_exit(child, exit_poll) => res.map(InteractExit::Exited),
            _ = handle_controls(&mut controls, &master, &log) => Ok(InteractExit::Terminated),
        };

        if matches!(result, Ok(InteractExit::Exited(_))) {
            let flush = forward_output(&mut rx, &mut output, &log);
            let _ = tokio::time::timeout(FLUSH_GRACE, flush).await;
        }

        stop.store(true, Ordering::Relaxed);
        match input_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log.record(format_args!("error forwarding input: {e}")),
            Err(e) => log.record(format_args!("input task failed: {e}")),
        }
        // The writer went down with the input task; dropping the master
        // closes the pty.
        drop(rx);
        drop(master);
        log::debug!("interact: finished with {result:?}");
        result
    }
}

/// Copy bytes from `input` to the pty until end of input, an error, or `stop`.
fn forward_input<I: AsFd>(
    input: I,
    mut writer: Box<dyn Write + Send>,
    stop: &AtomicBool,
) -> io::Result<()> {
    let timeout = PollTimeout::from(INPUT_POLL.as_millis() as u16);
    let mut buf = [0u8; 4096];
    while !stop.load(Ordering::Relaxed) {
        let mut fds = [PollFd::new(input.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) | Err(Errno::EINTR) => continue,
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        match nix::unistd::read(input.as_fd(), &mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                writer.write_all(&buf[..n])?;
                writer.flush()?;
            }
            Err(Errno::EINTR | Errno::EAGAIN) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Copy pty output to `output`. Only a pty read error ends this; once the
/// stream closes it waits for the exit watcher.
async fn forward_output<O: Write>(
    rx: &mut OutputReceiver,
    output: &mut O,
    log: &OutputLog,
) -> Result<InteractExit> {
    while let Some(event) = rx.recv().await {
        match event {
            ReadEvent::Data(bytes) => {
                if let Err(e) = output.write_all(&bytes).and_then(|()| output.flush()) {
                    log.record(format_args!("error writing output: {e}"));
                }
            }
            ReadEvent::Error(e) => {
                log.record(format_args!("error reading from pty: {e}"));
                return Err(Error::Read(e));
            }
        }
    }
    std::future::pending().await
}

async fn wait_for_exit(
    child: &mut Box<dyn Child + Send + Sync>,
    every: Duration,
) -> Result<ExitStatus> {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if let Some(status) = child.try_wait().map_err(Error::Wait)? {
            return Ok(status);
        }
    }
}

/// Apply resize events until a terminate event arrives.
async fn handle_controls(
    controls: &mut Receiver<ControlEvent>,
    master: &Mutex<Box<dyn MasterPty + Send>>,
    log: &OutputLog,
) {
    while let Some(event) = controls.recv().await {
        match event {
            ControlEvent::Resize { rows, cols } => {
                let master = master.lock().unwrap_or_else(PoisonError::into_inner);
                match pty::resize(&**master, rows, cols) {
                    Ok(()) => log::debug!("interact: resized pty to {rows}x{cols}"),
                    Err(e) => {
                        log::warn!("interact: {e}");
                        log.record(format_args!("error resizing pty: {e}"));
                    }
                }
            }
            ControlEvent::Terminate => return,
        }
    }
    // No more control events can arrive.
    std::future::pending().await
}
