//! swarfarm-logger - CLI host for the SWARFARM relay
//!
//! This tool provides commands for:
//! - Checking SWARFARM configuration and API key status
//! - Fetching the list of commands the server currently accepts
//! - Relaying captured game events from a JSON-lines stream
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/swarfarm-logger/config.toml (~/.config/swarfarm-logger/config.toml)
//! - Logs: $XDG_STATE_HOME/swarfarm-logger/ (~/.local/state/swarfarm-logger/)

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use swarfarm_logger_core::{
    is_valid_api_key, AcceptedCommandCache, Config, Credential, HttpTransport, LiveConfig,
    Relay, Reporter,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::console::ConsoleSink;

#[derive(Parser)]
#[command(name = "swarfarm-logger")]
#[command(about = "Relay game events and profile snapshots to SWARFARM")]
#[command(version)]
struct Args {
    /// Verbose output (debug messages and log file)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show SWARFARM configuration and API key status
    Status,

    /// Fetch and list the commands SWARFARM currently accepts
    Commands,

    /// Relay captured events, one JSON object per line
    Relay {
        /// Read events from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

/// One captured exchange as written by the capture proxy
#[derive(Debug, Deserialize)]
struct Exchange {
    request: Value,
    #[serde(default)]
    response: Value,
}

/// Returns $HOME
fn home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .context("HOME environment variable not set")
}

/// Sets XDG environment variables to ensure the core library uses XDG paths
fn ensure_xdg_env() -> Result<()> {
    let home = home_dir()?;

    if std::env::var("XDG_STATE_HOME").is_err() {
        std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
    }

    if std::env::var("XDG_CONFIG_HOME").is_err() {
        std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    ensure_xdg_env()?;

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging if verbose; the guard flushes the file on exit
    let _log_guard = if args.verbose {
        Some(
            swarfarm_logger_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    match args.command {
        Command::Status => cmd_status(&config),
        Command::Commands => cmd_commands(&config, args.verbose).await,
        Command::Relay { input } => cmd_relay(config, input, args.verbose).await,
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("SWARFARM Logger Configuration");
    println!("=============================");
    println!();

    let swarfarm = &config.swarfarm;

    println!("Enabled:          {}", swarfarm.enabled);

    if !swarfarm.enabled {
        println!();
        println!("SWARFARM logging is disabled. Enable it in config.toml:");
        println!();
        println!("  [swarfarm]");
        println!("  enabled = true");
        println!("  profile_sync = true");
        println!("  api_key = \"<40 character key from your SWARFARM Edit Profile page>\"");
        return Ok(());
    }

    println!("Profile Sync:     {}", swarfarm.profile_sync);
    println!("Server URL:       {}", swarfarm.server_url);

    match &swarfarm.api_key {
        Credential::Single(key) if key.is_empty() => {
            println!("API Key:          <not set>");
        }
        Credential::Single(key) => {
            println!("API Key:          <set>");
            println!("Key Format:       {}", key_format(key));
        }
        Credential::PerIdentity(keys) => {
            println!("API Key:          <set> ({} account(s))", keys.len());
            for (identity, key) in keys {
                println!("  {:<16}{}", identity, key_format(key));
            }
        }
    }

    println!("Timeout:          {}s", swarfarm.timeout_secs);
    println!("Command Refresh:  {}s", swarfarm.command_refresh_secs);
    println!("Poll Interval:    {}ms", swarfarm.poll_interval_ms);
    println!("Job Timeout:      {}s", swarfarm.job_timeout_secs);
    println!("Log File:         {}", Config::log_path().display());

    println!();
    if !swarfarm.api_key.is_configured() {
        if swarfarm.profile_sync {
            println!("Status: Not ready (profile sync needs an API key)");
        } else {
            println!("Status: Ready (logs are matched by in-game account ID only)");
        }
    } else {
        println!("Status: Ready");
    }

    Ok(())
}

fn key_format(key: &str) -> &'static str {
    if is_valid_api_key(key) {
        "valid"
    } else {
        "invalid (expected 40 lowercase letters or digits)"
    }
}

async fn cmd_commands(config: &Config, verbose: bool) -> Result<()> {
    let transport = HttpTransport::new(&config.swarfarm).context("invalid SWARFARM settings")?;
    let reporter = Reporter::new(Arc::new(ConsoleSink::new(verbose)));
    let cache = AcceptedCommandCache::new();

    cache
        .refresh(&transport, &reporter)
        .await
        .context("failed to fetch accepted commands")?;

    let commands = cache
        .snapshot()
        .ok_or_else(|| anyhow!("accepted command list is empty"))?;

    println!();
    println!("Accepted Commands");
    println!("=================");
    println!();
    println!(
        "Version: {}",
        commands
            .version()
            .map(Value::to_string)
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!("Count:   {}", commands.len());
    println!();
    for name in commands.names() {
        match commands.schema(name) {
            Some(schema) if verbose => println!("  {:<28} {}", name, schema),
            _ => println!("  {}", name),
        }
    }

    Ok(())
}

async fn cmd_relay(config: Config, input: Option<PathBuf>, verbose: bool) -> Result<()> {
    let live = LiveConfig::new(config.swarfarm);
    let sink = Arc::new(ConsoleSink::new(verbose));

    let Some(relay) = Relay::connect(live, sink)
        .await
        .context("failed to start relay")?
    else {
        println!("SWARFARM logging is disabled. Run 'status' for details.");
        return Ok(());
    };

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let result = relay_lines(&relay, reader).await;

    relay.shutdown().await;
    let handled = result?;
    tracing::info!(events = handled, "Relay finished");

    Ok(())
}

/// Feed every line to the relay until EOF or Ctrl-C.
///
/// On EOF the relay is drained so in-flight uploads can finish; a second
/// Ctrl-C while draining cuts that short.
async fn relay_lines(relay: &Relay, reader: Box<dyn AsyncBufRead + Unpin + Send>) -> Result<usize> {
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut handled = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<Exchange>(&line) {
                    Ok(exchange) => {
                        relay.handle_event(exchange.request, exchange.response);
                        handled += 1;
                    }
                    Err(e) => {
                        tracing::warn!(line = line_no, error = %e, "Skipping malformed event");
                        eprintln!("line {}: skipping malformed event: {}", line_no, e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted, stopping relay...");
                return Ok(handled);
            }
        }
    }

    tokio::select! {
        _ = relay.drain() => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, stopping relay...");
        }
    }

    Ok(handled)
}
