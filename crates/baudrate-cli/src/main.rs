//! baudrate - find the baud rate of a serial port
//!
//! Entry point for the `baudrate` command.

use std::future::Future;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use baudrate_core::prelude::*;
use baudrate_core::report::{launch_companion, read_config_name};

mod args;

use args::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("baudrate: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        tracing::Level::ERROR
    } else {
        match cli.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    };

    // RUST_LOG still takes precedence
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let table = cli
        .candidate_table()
        .context("Invalid candidate rate list")?;

    // Only the minicom report goes to stdout, so it can be redirected cleanly
    if cli.list_rates {
        write_rate_list(&table, &mut io::stderr().lock())?;
        return Ok(());
    }

    let config = cli
        .detection_config()
        .context("Invalid detection settings")?;
    debug!("Detection settings: {:?}", config);

    let initial = table.at(table.default_index()).rate;
    let link = SerialLink::open(&cli.device, initial, config.read_timeout)
        .with_context(|| format!("Failed to open {}", cli.device))?;
    let link = LinkHandle::new(link);

    if config.verbose {
        print_intro(config.mode);
    }

    // Auto mode reads no keys, so the console stays cooked and Ctrl+C arrives
    // as SIGINT. In raw mode it arrives as a key instead.
    let (key_tx, key_rx) = mpsc::channel(64);
    let (console, pump) = match config.mode {
        DetectionMode::Manual => {
            let console =
                SavedTerminalModes::capture_stdin().context("Failed to configure console")?;
            let pump = spawn_key_pump(key_tx).context("Failed to read console keys")?;
            (console, Some(pump))
        }
        DetectionMode::Auto => (SavedTerminalModes::detached(), None),
    };

    let verbose = config.verbose;
    let prompt = config.prompt;
    let session = Session::new(config, table, link, console, Box::new(io::stderr()));
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let result = session.run(key_rx, interrupt, &ThreadSpawner).await;
    if let Some(pump) = pump {
        pump.stop();
    }
    let summary = result?;

    let name = match &cli.name {
        Some(name) => Some(name.clone()),
        None if verbose && prompt => match prompt_config_name().await? {
            Some(name) => Some(name),
            None => {
                debug!("Save prompt cancelled");
                return Ok(());
            }
        },
        None => None,
    };

    let report = LinkReport::from(&summary);
    let destination = write_report(
        &report,
        name.as_deref(),
        &cli.minicom_dir,
        &mut io::stdout().lock(),
    )?;

    if let (ReportDestination::File(_), Some(name)) = (&destination, &cli.name) {
        if cli.launch_minicom() {
            return Err(launch_companion(&cli.minicom_bin, name).into());
        }
    }

    Ok(())
}

fn write_rate_list(table: &CandidateTable, out: &mut dyn Write) -> io::Result<()> {
    for candidate in table.iter() {
        writeln!(out, "{:>6} baud", candidate.label)?;
    }
    out.flush()
}

fn print_intro(mode: DetectionMode) {
    eprintln!();
    match mode {
        DetectionMode::Manual => {
            eprintln!("Press the up or down arrow keys to increase or decrease the baud rate.");
        }
        DetectionMode::Auto => eprintln!("Auto detecting baudrate."),
    }
    eprintln!("Press Ctl+C to quit.");
    eprintln!();
}

/// Ask for a configuration name. `None` means the operator pressed Ctrl+C.
async fn prompt_config_name() -> Result<Option<String>> {
    eprint!("Save serial port configuration as [stdout]: ");
    io::stderr().flush()?;

    // Detached: a prompt nobody answers must not keep the process alive
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("config-name".into())
        .spawn(move || {
            let _ = tx.send(read_config_name(&mut io::stdin().lock()));
        })
        .context("Failed to read a name")?;

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let name = answer_or_cancel(rx, cancel).await?;
    if name.is_none() {
        eprintln!();
    }
    Ok(name)
}

async fn answer_or_cancel<F>(
    answer: oneshot::Receiver<io::Result<String>>,
    cancel: F,
) -> Result<Option<String>>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;

        _ = cancel => Ok(None),
        line = answer => {
            let line = line
                .context("Console closed")?
                .context("Failed to read a name")?;
            Ok(Some(line.trim().to_string()))
        }
    }
}
