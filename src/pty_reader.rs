use nix::errno::Errno;
use std::io::{self, Read};
use std::thread;
use tokio::sync::mpsc::{self, Receiver};

/// One unit of output from the pty reader thread.
#[derive(Debug)]
pub(crate) enum ReadEvent {
    Data(Vec<u8>),
    Error(io::Error),
}

pub(crate) type OutputReceiver = Receiver<ReadEvent>;

const CHANNEL_CAPACITY: usize = 64;

/// Spawns a background thread to read from a PTY.
///
/// The channel closes when the stream ends. A hard read error is delivered as
/// [`ReadEvent::Error`] before the channel closes.
pub(crate) fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> OutputReceiver {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break, // EOF
                Ok(n) => {
                    log::trace!("pty reader: {n} bytes");
                    if tx.blocking_send(ReadEvent::Data(buffer[..n].to_vec())).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_end_of_stream(&e) => break,
                Err(e) => {
                    let _ = tx.blocking_send(ReadEvent::Error(e));
                    break;
                }
            }
        }
        log::debug!("pty reader: stream closed");
    });

    rx
}

/// Linux reports EIO on the master once every slave descriptor is closed.
fn is_end_of_stream(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::EIO as i32)
}
