// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem: bidirectional drive synchronisation.

mod commands;
mod config_file;
mod exit_error;
mod localdrive;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use std::path::PathBuf;
use tandem_core::Resolution;

#[derive(Parser)]
#[command(name = "tandem", version, about = "Bidirectional drive sync engine")]
struct Cli {
    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync cycle and exit.
    Sync {
        /// Plan and report without executing anything.
        #[arg(long)]
        dry_run: bool,
        /// Override big-delete protection.
        #[arg(long)]
        force: bool,
    },
    /// Watch for changes on both sides and sync continuously.
    Watch,
    /// Show baseline, ledger, and conflict counts.
    Status,
    /// Inspect and resolve sync conflicts.
    Conflicts {
        #[command(subcommand)]
        command: ConflictsCommand,
    },
}

#[derive(Subcommand)]
enum ConflictsCommand {
    /// List conflicts (unresolved by default).
    List {
        /// Include resolved conflicts.
        #[arg(long)]
        all: bool,
    },
    /// Record a resolution for a conflict.
    Resolve {
        /// Conflict id or path.
        id: String,
        #[arg(long, conflicts_with_all = ["keep_remote", "rename"])]
        keep_local: bool,
        #[arg(long, conflicts_with_all = ["keep_local", "rename"])]
        keep_remote: bool,
        #[arg(long, conflicts_with_all = ["keep_local", "keep_remote"])]
        rename: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tandem=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let loaded = config_file::load(cli.config.as_deref())?;
    match cli.command {
        Command::Sync { dry_run, force } => commands::sync(loaded, dry_run, force).await,
        Command::Watch => commands::watch(loaded).await,
        Command::Status => commands::status(loaded),
        Command::Conflicts { command } => match command {
            ConflictsCommand::List { all } => commands::conflicts_list(loaded, all),
            ConflictsCommand::Resolve {
                id,
                keep_local,
                keep_remote,
                rename,
            } => {
                let resolution = if keep_local {
                    Resolution::KeepLocal
                } else if keep_remote {
                    Resolution::KeepRemote
                } else if rename {
                    Resolution::Rename
                } else {
                    return Err(ExitError::new(
                        1,
                        "pick one of --keep-local, --keep-remote, --rename",
                    ));
                };
                commands::conflicts_resolve(loaded, &id, resolution)
            }
        },
    }
}
