//! Translation of OS signals into [`ControlEvent`]s.
//!
//! SIGWINCH becomes [`ControlEvent::Resize`] carrying the controlling
//! terminal's new size; SIGINT and SIGTSTP become [`ControlEvent::Terminate`].
//!
//! Once installed, tokio keeps its handlers for the rest of the process, so
//! these signals no longer interrupt or stop the process by default.

use crate::error::{Error, Result};
use crate::event::ControlEvent;
use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

/// Subscribe to window-change, interrupt and suspend notifications and
/// forward them to `events` until a terminate event has been sent or the
/// receiver is dropped.
///
/// The handlers are installed before this returns.
pub fn listen(events: Sender<ControlEvent>) -> Result<JoinHandle<()>> {
    let mut winch = signal(SignalKind::window_change()).map_err(Error::Signal)?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(Error::Signal)?;
    let mut suspend =
        signal(SignalKind::from_raw(Signal::SIGTSTP as i32)).map_err(Error::Signal)?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = winch.recv() => match crossterm::terminal::size() {
                    Ok((cols, rows)) => ControlEvent::resize(rows, cols),
                    Err(e) => {
                        log::warn!("signals: cannot read terminal size: {e}");
                        continue;
                    }
                },
                _ = interrupt.recv() => ControlEvent::Terminate,
                _ = suspend.recv() => ControlEvent::Terminate,
            };
            log::debug!("signals: {event:?}");
            if events.send(event).await.is_err() || event.is_terminate() {
                break;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_interrupt_becomes_terminate() {
        let (tx, mut rx) = mpsc::channel(4);
        let task = listen(tx).unwrap();

        nix::sys::signal::raise(Signal::SIGINT).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no control event")
            .expect("channel closed");
        assert_eq!(event, ControlEvent::Terminate);

        // The listener stops after a terminate.
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
