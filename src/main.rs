use anyhow::{Context, Result};
use clap::Parser;
use expectty::parser::{parse_duration, parse_escapes};
use expectty::{InteractExit, Session, SessionConfig};
use regex::bytes::Regex;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "expectty",
    about = "Run a program in a PTY, feed it input and wait for its output",
    version
)]
struct Args {
    /// Command to run in the PTY
    #[arg(short, long)]
    command: String,

    /// Line to send before waiting (escapes: \n \r \t \e \\ \xNN); repeatable
    #[arg(short, long = "send-line")]
    send_line: Vec<String>,

    /// Regular expression to wait for; repeatable, earlier patterns win
    #[arg(short, long)]
    expect: Vec<String>,

    /// How long to wait for the patterns
    #[arg(short, long, default_value = "30s", value_parser = parse_duration)]
    timeout: Duration,

    /// Hand the terminal over to the program afterwards
    #[arg(short, long)]
    interact: bool,

    /// Leave the controlling terminal in its current mode
    #[arg(long)]
    no_raw: bool,

    /// Arguments to pass to the command, after `--`
    #[arg(last = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let patterns = args
        .expect
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("Invalid pattern: {p}")))
        .collect::<Result<Vec<_>>>()?;

    let config = SessionConfig::default()
        .with_timeout(args.timeout)
        .with_raw_mode(!args.no_raw);
    let mut session = Session::with_config(&args.command, &args.args, config);
    session
        .start()
        .with_context(|| format!("Failed to start session for '{}'", args.command))?;

    let outcome = run(&mut session, &args, &patterns).await;

    // Report only once the terminal is back in its previous mode.
    if let Err(e) = session.close() {
        log::warn!("{e}");
    }
    for line in outcome? {
        println!("{line}");
    }
    Ok(())
}

async fn run(session: &mut Session, args: &Args, patterns: &[Regex]) -> Result<Vec<String>> {
    let mut report = Vec::new();

    for line in &args.send_line {
        session
            .send_line(parse_escapes(line))
            .context("Failed to send input")?;
    }

    if !patterns.is_empty() {
        let index = session
            .expect_any(patterns)
            .await
            .context("Failed waiting for output")?;
        report.push(format!("matched pattern {index}: {}", patterns[index].as_str()));
    }

    if args.interact {
        match session.interact().await.context("Interactive session failed")? {
            InteractExit::Exited(status) => report.push(format!("{} exited: {status}", args.command)),
            InteractExit::Terminated => report.push("interrupted".to_string()),
        }
    }

    Ok(report)
}
