//! Waiting for patterns to appear in the child's output.
//!
//! Each expect call owns a fresh accumulator. A scoped drain task moves
//! output from the session's pty reader into that accumulator under a write
//! lock while the calling task evaluates the patterns against it, in order,
//! whenever bytes are appended (and at least once per poll interval). The
//! drain task is stopped and joined before the call returns, whatever the
//! outcome; if the expect future is dropped instead, the task is aborted.
//!
//! Bytes drained during one call are discarded with its accumulator. Output
//! the reader thread has not handed over yet stays queued for the next call,
//! so how much of it is visible to that call depends on timing.

use crate::error::{Error, Result};
use crate::output_log::OutputLog;
use crate::patterns::{Pattern, first_match};
use crate::pty_reader::{OutputReceiver, ReadEvent};
use crate::session::Session;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock, oneshot};
use tokio::task::JoinHandle;

impl Session {
    /// Wait until one of `patterns` matches output produced after this call
    /// started, or `timeout` elapses.
    ///
    /// Returns the index of the first pattern, in the order given, that
    /// matches anywhere in the output. Fails with [`Error::Timeout`] when
    /// nothing matched in time and [`Error::Read`] when reading the pty
    /// failed. An empty pattern list can only time out.
    pub async fn expect_any_timeout<P: Pattern>(
        &mut self,
        patterns: &[P],
        timeout: Duration,
    ) -> Result<usize> {
        let output = self.output()?;
        let poll_interval = self.config().poll_interval;
        expect_patterns(output, patterns, timeout, poll_interval, self.log()).await
    }

    /// [`expect_any_timeout`](Self::expect_any_timeout) with the configured
    /// default timeout.
    pub async fn expect_any<P: Pattern>(&mut self, patterns: &[P]) -> Result<usize> {
        let timeout = self.config().timeout;
        self.expect_any_timeout(patterns, timeout).await
    }

    /// Wait for a single pattern. Returns `true` once it matched.
    pub async fn expect_timeout<P: Pattern>(
        &mut self,
        pattern: P,
        timeout: Duration,
    ) -> Result<bool> {
        let index = self
            .expect_any_timeout(std::slice::from_ref(&pattern), timeout)
            .await?;
        Ok(index == 0)
    }

    /// [`expect_timeout`](Self::expect_timeout) with the configured default
    /// timeout.
    pub async fn expect<P: Pattern>(&mut self, pattern: P) -> Result<bool> {
        let timeout = self.config().timeout;
        self.expect_timeout(pattern, timeout).await
    }
}

/// Output collected during one expect call.
#[derive(Default)]
struct Accumulator {
    bytes: RwLock<Vec<u8>>,
    appended: Notify,
}

impl Accumulator {
    async fn append(&self, data: &[u8]) {
        self.bytes.write().await.extend_from_slice(data);
        self.appended.notify_one();
    }
}

/// The drain task of one expect call.
struct Drain {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drain {
    fn spawn(
        output: Arc<Mutex<OutputReceiver>>,
        acc: Arc<Accumulator>,
        errors: oneshot::Sender<io::Error>,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(drain(output, acc, stop_rx, errors));
        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Tell the task to stop and wait until it has.
    async fn shutdown(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.handle.take() {
            Some(handle) => Ok(handle.await?),
            None => Ok(()),
        }
    }
}

impl Drop for Drain {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn drain(
    output: Arc<Mutex<OutputReceiver>>,
    acc: Arc<Accumulator>,
    mut stop: oneshot::Receiver<()>,
    errors: oneshot::Sender<io::Error>,
) {
    let mut rx = tokio::select! {
        _ = &mut stop => return,
        rx = output.lock() => rx,
    };
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => return,
            event = rx.recv() => match event {
                Some(ReadEvent::Data(bytes)) if bytes.is_empty() => continue,
                Some(ReadEvent::Data(bytes)) => acc.append(&bytes).await,
                Some(ReadEvent::Error(e)) => {
                    let _ = errors.send(e);
                    return;
                }
                None => {
                    log::debug!("expect: end of pty output");
                    return;
                }
            },
        }
    }
}

enum Outcome {
    Matched(usize),
    TimedOut,
    ReadError(io::Error),
}

pub(crate) async fn expect_patterns<P: Pattern>(
    output: Arc<Mutex<OutputReceiver>>,
    patterns: &[P],
    timeout: Duration,
    poll_interval: Duration,
    log: &OutputLog,
) -> Result<usize> {
    let acc = Arc::new(Accumulator::default());
    let (err_tx, mut err_rx) = oneshot::channel();
    let drain = Drain::spawn(output, acc.clone(), err_tx);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut reader_done = false;

    let outcome = loop {
        {
            let bytes = acc.bytes.read().await;
            if let Some(index) = first_match(patterns, &bytes) {
                break Outcome::Matched(index);
            }
        }

        tokio::select! {
            biased;
            _ = &mut deadline => break Outcome::TimedOut,
            err = &mut err_rx, if !reader_done => match err {
                Ok(e) => break Outcome::ReadError(e),
                // Stream ended without error; nothing more will arrive.
                Err(_) => reader_done = true,
            },
            _ = acc.appended.notified() => {}
            _ = tokio::time::sleep(poll_interval) => {}
        }
    };

    drain.shutdown().await?;

    match outcome {
        Outcome::Matched(index) => {
            log::debug!("expect: pattern {index} matched");
            Ok(index)
        }
        Outcome::TimedOut => {
            log.record(format_args!("timeout expecting results after {timeout:?}"));
            Err(Error::Timeout(timeout))
        }
        Outcome::ReadError(e) => {
            log.record(format_args!("error reading from pty: {e}"));
            Err(Error::Read(e))
        }
    }
}
