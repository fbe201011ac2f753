use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lockout::config::{LockoutConfig, LoggingConfig};
use lockout::limiter::{LimitStatus, SystemClock, TimesLimiter};

/// Drive a lockout limiter from commands on stdin.
///
/// Commands, one per line: `fail <key>`, `check <key>`, `reset <key>`, `stats`.
#[derive(Debug, Parser)]
#[command(name = "lockout", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log filter directive, overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum Reply<'a> {
    Status {
        key: &'a str,
        locked: bool,
        #[serde(flatten)]
        status: LimitStatus,
    },
    Removed {
        key: &'a str,
    },
    Stats {
        tracked_keys: usize,
    },
    Error {
        message: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.log_level.as_deref(), cli.json_logs);

    info!("Starting lockout");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        path = cli.config.as_deref().unwrap_or("<defaults>"),
        free_attempts = config.policy.free_attempts,
        eviction_candidates = config.limiter.eviction_candidates,
        sampling = ?config.limiter.sampling,
        "Configuration loaded"
    );

    let limiter = TimesLimiter::with_config(
        config.policy.clone(),
        Arc::new(SystemClock),
        &config.limiter,
    );

    run(&limiter, io::stdin().lock(), io::stdout().lock())?;

    info!(tracked_keys = limiter.len(), "Input closed, shutting down");
    Ok(())
}

/// Read the config file if one was given. Runs before tracing is set up, so
/// it must not rely on logging.
fn load_config(path: Option<&str>) -> lockout::error::Result<LockoutConfig> {
    match path {
        Some(path) => LockoutConfig::from_file(path),
        None => Ok(LockoutConfig::default()),
    }
}

/// Execute one command per input line and write one JSON reply per line.
///
/// Lines that are not valid UTF-8 get an error reply; only I/O failures end
/// the loop.
fn run<R: BufRead, W: Write>(
    limiter: &TimesLimiter,
    mut input: R,
    mut output: W,
) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }

        let reply = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                execute(limiter, line)
            }
            Err(_) => {
                warn!(bytes = buf.len(), "Input line is not valid UTF-8");
                Reply::Error {
                    message: "input line is not valid UTF-8".to_string(),
                }
            }
        };

        serde_json::to_writer(&mut output, &reply)?;
        writeln!(output)?;
        output.flush()?;
    }
}

fn execute<'a>(limiter: &TimesLimiter, line: &'a str) -> Reply<'a> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let key = parts.next().map(str::trim).filter(|key| !key.is_empty());

    match (command, key) {
        ("fail", Some(key)) => status_reply(key, limiter.add_one_times(key)),
        ("check", Some(key)) => status_reply(key, limiter.check_limit(key)),
        ("reset", Some(key)) => {
            limiter.remove_limit(key);
            Reply::Removed { key }
        }
        ("stats", None) => Reply::Stats {
            tracked_keys: limiter.len(),
        },
        ("fail" | "check" | "reset", None) => Reply::Error {
            message: format!("missing key for '{}'", command),
        },
        _ => {
            warn!(line = %line, "Unrecognized command");
            Reply::Error {
                message: format!("unrecognized command '{}'", line),
            }
        }
    }
}

fn status_reply(key: &str, status: LimitStatus) -> Reply<'_> {
    Reply::Status {
        key,
        locked: status.is_locked(),
        status,
    }
}

/// Initialize tracing. `RUST_LOG` wins over the CLI flag, which wins over the
/// config file. Logs go to stderr so stdout carries only replies.
fn init_tracing(logging: &LoggingConfig, cli_level: Option<&str>, cli_json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.unwrap_or(&logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(io::stderr);

    if cli_json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
