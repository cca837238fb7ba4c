//! # Expectty
//!
//! Drive interactive programs through a pseudo-terminal.
//!
//! A [`Session`] launches a child on a pty and offers two ways to control
//! it: waiting for patterns in its output with a deadline ("expect"), and
//! handing the controlling terminal over to it ("interact"). This is the
//! classic expect primitive for scripting shells, ssh, telnet and other
//! tools without a machine-friendly interface.
//!
//! ## Quick start
//!
//! ```no_run
//! use expectty::Session;
//! use regex::bytes::Regex;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> expectty::Result<()> {
//!     let mut session = Session::new("bash", &[] as &[&str]);
//!     session.start()?;
//!
//!     session.send_line("echo hello")?;
//!     let prompt = Regex::new(r"hello\r?\n").unwrap();
//!     session.expect_timeout(&prompt, Duration::from_secs(5)).await?;
//!
//!     session.close()
//! }
//! ```
//!
//! ## Several patterns
//!
//! [`Session::expect_any_timeout`] takes an ordered pattern set and returns
//! the index of the first pattern, by position, that matches. A timeout is
//! reported as [`Error::Timeout`], which callers can tell apart from real
//! failures with [`Error::is_timeout`]:
//!
//! ```no_run
//! # async fn run(session: &mut expectty::Session) -> expectty::Result<()> {
//! use std::time::Duration;
//!
//! match session.expect_any_timeout(&["password:", "$ "], Duration::from_secs(10)).await {
//!     Ok(0) => session.send_line("hunter2")?,
//!     Ok(_) => {}
//!     Err(e) if e.is_timeout() => eprintln!("no prompt"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Interactive sessions
//!
//! [`Session::interact`] forwards stdin to the child and the child's output
//! to stdout until the child exits or SIGINT/SIGTSTP arrives, propagating
//! window-size changes along the way. [`Session::interact_with`] does the
//! same with caller-supplied streams and a [`ControlEvent`] channel in place
//! of OS signals.
//!
//! ## Diagnostics
//!
//! Read errors, timeouts and cleanup failures are recorded in an
//! [`OutputLog`], retrievable with [`Session::log_output`], and forwarded to
//! the `log` facade.

pub mod config;
pub mod error;
pub mod event;
pub mod expect;
pub mod interact;
pub mod output_log;
pub mod parser;
pub mod patterns;
pub(crate) mod pty;
pub(crate) mod pty_reader;
pub mod session;
pub mod signals;
pub mod terminal;

pub use config::{DEFAULT_TIMEOUT, SessionConfig};
pub use error::{Error, Result};
pub use event::ControlEvent;
pub use interact::InteractExit;
pub use output_log::OutputLog;
pub use patterns::Pattern;
pub use portable_pty::ExitStatus;
pub use session::Session;
pub use terminal::TerminalSession;
