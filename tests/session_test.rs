use expectty::{ControlEvent, Error, InteractExit, Session, SessionConfig};
use nix::errno::Errno;
use nix::pty::{Winsize, openpty};
use nix::sys::termios::{self, LocalFlags, Termios};
use nix::unistd::Pid;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn config() -> SessionConfig {
    SessionConfig::default().with_raw_mode(false)
}

fn start(command: &str, args: &[&str]) -> Session {
    let mut session = Session::with_config(command, args, config());
    session.start().expect("Failed to start session");
    session
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_expect_echoed_line() {
    let mut session = start("cat", &[]);
    session.send_line("hello").unwrap();

    let index = session
        .expect_any_timeout(&["hello"], Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(index, 0);
    assert!(!session.is_raw());

    session.close().unwrap();
}

#[tokio::test]
async fn test_expect_regex() {
    let mut session = start("sh", &["-c", "echo value=42; sleep 5"]);
    let pattern = Regex::new(r"value=\d+").unwrap();

    assert!(session.expect_timeout(&pattern, Duration::from_secs(2)).await.unwrap());
    session.close().unwrap();
}

fn local_flags(fd: &OwnedFd) -> LocalFlags {
    termios::tcgetattr(fd).unwrap().local_flags
}

#[tokio::test]
async fn test_close_restores_terminal_mode() {
    let tty = openpty(None::<&Winsize>, None::<&Termios>).unwrap();
    let before = local_flags(&tty.slave);
    assert!(before.contains(LocalFlags::ICANON | LocalFlags::ECHO));

    let config = SessionConfig::default().with_terminal(tty.slave.try_clone().unwrap());
    let mut session = Session::with_config("cat", &[] as &[&str], config);
    session.start().unwrap();

    assert!(session.is_raw());
    let raw = local_flags(&tty.slave);
    assert!(!raw.contains(LocalFlags::ICANON));
    assert!(!raw.contains(LocalFlags::ECHO));

    session.close().unwrap();
    assert!(!session.is_raw());
    assert_eq!(local_flags(&tty.slave), before);

    // A second close leaves the restored mode alone.
    session.close().unwrap();
    assert_eq!(local_flags(&tty.slave), before);
}

#[tokio::test]
async fn test_raw_mode_failure_kills_child() {
    let (not_a_tty, _write_end) = nix::unistd::pipe().unwrap();
    let config = SessionConfig::default().with_terminal(not_a_tty);
    let mut session = Session::with_config("sleep", &["30"], config);

    let err = session.start().unwrap_err();
    assert!(matches!(err, Error::TerminalMode(_)), "unexpected error: {err}");
    assert!(!session.is_running());
    assert!(session.process_id().is_none());
    assert!(matches!(session.send("x"), Err(Error::NotRunning)));

    let log = session.log_output();
    let pid: i32 = log
        .lines()
        .find_map(|line| line.strip_prefix("killed child "))
        .and_then(|pid| pid.parse().ok())
        .unwrap_or_else(|| panic!("no kill recorded in log: {log}"));
    // The child was killed and reaped, so its pid no longer exists.
    assert_eq!(
        nix::sys::signal::kill(Pid::from_raw(pid), None),
        Err(Errno::ESRCH)
    );
}

#[tokio::test]
async fn test_launch_failure() {
    let mut session = Session::with_config(
        "/nonexistent/expectty-test-binary",
        &[] as &[&str],
        config(),
    );

    let err = session.start().unwrap_err();
    assert!(matches!(err, Error::Launch { .. }), "unexpected error: {err}");
    assert!(!session.is_raw());
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_expect_timeout() {
    let mut session = start("sleep", &["5"]);

    let started = Instant::now();
    let err = session
        .expect_timeout("never", Duration::from_millis(100))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    assert!(session.log_output().contains("timeout"));

    // A timeout leaves the session usable.
    assert!(session.is_running());
    session.close().unwrap();
}

#[tokio::test]
async fn test_expect_after_child_exit_times_out() {
    let mut session = start("true", &[]);
    let err = session
        .expect_timeout("anything", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    session.close().unwrap();
}

#[tokio::test]
async fn test_send_writes_every_byte() {
    let mut session = start("sh", &["-c", "stty -echo -icrnl; echo ready; wc -c"]);
    session
        .expect_timeout("ready", Duration::from_secs(5))
        .await
        .unwrap();

    let line = format!("{}\n", "x".repeat(99));
    for _ in 0..30 {
        session.send(&line).unwrap();
    }
    session.send("\x04").unwrap();

    let total = Regex::new(r"\b3000\b").unwrap();
    assert!(session.expect_timeout(&total, Duration::from_secs(5)).await.unwrap());
    session.close().unwrap();
}

#[tokio::test]
async fn test_send_line_appends_crlf() {
    let mut session = start("sh", &["-c", "stty -echo -icrnl; echo ready; wc -c"]);
    session
        .expect_timeout("ready", Duration::from_secs(5))
        .await
        .unwrap();

    // "abc\r\n" with the \r left untranslated.
    session.send_line("abc").unwrap();
    session.send("\x04").unwrap();

    let total = Regex::new(r"\b5\b").unwrap();
    assert!(session.expect_timeout(&total, Duration::from_secs(5)).await.unwrap());
    session.close().unwrap();
}

#[tokio::test]
async fn test_close_twice_and_send_after_close() {
    let mut session = start("cat", &[]);
    let pid = session.process_id();
    assert!(pid.is_some());

    session.close().unwrap();
    session.close().unwrap();

    assert!(matches!(session.send("late"), Err(Error::NotRunning)));
    let err = session
        .expect_timeout("x", Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotRunning));
}

#[tokio::test]
async fn test_interact_resize_then_terminate() {
    let mut session = start("sh", &[]);

    let (input, input_writer) = nix::unistd::pipe().unwrap();
    let mut input_writer = File::from(input_writer);
    let sink = SharedBuf::default();
    let (controls, rx) = mpsc::channel(8);

    let driver = {
        let sink = sink.clone();
        async move {
            controls
                .send(ControlEvent::Resize { rows: 40, cols: 120 })
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            input_writer.write_all(b"stty size\r").unwrap();

            let deadline = Instant::now() + Duration::from_secs(5);
            while !sink.contents().contains("40 120") && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let _ = controls.send(ControlEvent::Terminate).await;
            input_writer
        }
    };

    let (result, _input_writer) =
        tokio::join!(session.interact_with(input, sink.clone(), rx), driver);

    assert!(matches!(result.unwrap(), InteractExit::Terminated));
    assert!(sink.contents().contains("40 120"), "output: {}", sink.contents());

    // Interact consumed the pty.
    assert!(matches!(session.send("x"), Err(Error::NotRunning)));
    session.close().unwrap();
}

#[tokio::test]
async fn test_interact_ends_when_child_exits() {
    let mut session = start("sh", &["-c", "echo bye; exit 3"]);

    let (input, _input_writer) = nix::unistd::pipe().unwrap();
    let sink = SharedBuf::default();
    let (_controls, rx) = mpsc::channel(8);

    let exit = session.interact_with(input, sink.clone(), rx).await.unwrap();
    match exit {
        InteractExit::Exited(status) => assert_eq!(status.exit_code(), 3),
        other => panic!("unexpected exit: {other:?}"),
    }
    session.close().unwrap();
}

#[tokio::test]
async fn test_interact_requires_start() {
    let mut session = Session::with_config("cat", &[] as &[&str], config());
    let (input, _input_writer) = nix::unistd::pipe().unwrap();
    let (_controls, rx) = mpsc::channel(8);

    let err = session
        .interact_with(input, io::sink(), rx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotRunning));
}
