//! ccflash: command-line uploader for CCLoader-compatible bootloaders.

mod commands;
mod config;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use config::Config;

/// Upload firmware to a CC253x chip through an Arduino running CCLoader.
#[derive(Parser)]
#[command(name = "ccflash", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Serial port (e.g., /dev/ttyUSB0 or COM3); remembered across runs.
    #[arg(short, long, global = true, env = "CCFLASH_PORT")]
    pub port: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a firmware image (.bin) to the chip.
    Flash {
        /// Path to the firmware image.
        firmware: PathBuf,
    },

    /// Erase the whole chip by uploading 512 blocks of 0xFF (256 KiB).
    Erase {
        /// Confirm the erase.
        #[arg(long)]
        yes: bool,
    },

    /// List available serial ports.
    ListPorts,
}

/// CLI-level errors.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Invalid invocation.
    #[error("{0}")]
    Usage(String),

    /// The upload session ended in failure.
    #[error("upload failed: {0}")]
    Upload(ccflash::FailureKind),
}

/// Resolve the serial port from flags, then config.
pub(crate) fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    if let Some(port) = &cli.port {
        return Ok(port.clone());
    }
    if let Some(port) = &config.connection.port {
        log::debug!("Using configured port {port}");
        return Ok(port.clone());
    }

    Err(CliError::Usage(
        "no serial port specified; pass --port (see `ccflash list-ports`) \
         or set one in ccflash.toml"
            .into(),
    )
    .into())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load();

    match &cli.command {
        Command::Flash { firmware } => commands::cmd_flash(&cli, &mut config, firmware),
        Command::Erase { yes } => commands::cmd_erase(&cli, &mut config, *yes),
        Command::ListPorts => commands::cmd_list_ports(),
    }
}
