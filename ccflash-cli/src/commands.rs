//! Flash, erase, and list-ports command implementations.

use anyhow::{Context, Result};
use ccflash::{
    NativeTimers, NativeTransport, ProgressEvent, UploadRequest, UploadSession, list_ports,
};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::mpsc;

use crate::config::Config;
use crate::{Cli, CliError, get_port};

/// Flash command implementation.
pub(crate) fn cmd_flash(cli: &Cli, config: &mut Config, firmware: &Path) -> Result<()> {
    if !firmware.is_file() {
        return Err(CliError::Usage(format!(
            "firmware image not found: {}",
            firmware.display()
        ))
        .into());
    }

    let port = get_port(cli, config)?;
    if !cli.quiet {
        eprintln!(
            "{} Uploading {} via {}",
            style("→").cyan(),
            firmware.display(),
            port
        );
    }

    run_upload(
        cli,
        &port,
        UploadRequest::Program(firmware.to_path_buf()),
    )?;

    config.remember_port(&port);
    if !cli.quiet {
        eprintln!("{} Upload complete", style("✓").green().bold());
    }
    Ok(())
}

/// Erase command implementation.
pub(crate) fn cmd_erase(cli: &Cli, config: &mut Config, yes: bool) -> Result<()> {
    if !yes {
        return Err(CliError::Usage(
            "erasing uploads 256 KiB of 0xFF over all existing data; pass --yes to confirm".into(),
        )
        .into());
    }

    let port = get_port(cli, config)?;
    if !cli.quiet {
        eprintln!(
            "{} Erasing all flash memory via {}",
            style("→").red(),
            port
        );
    }

    run_upload(cli, &port, UploadRequest::Erase)?;

    config.remember_port(&port);
    if !cli.quiet {
        eprintln!("{} Erase complete", style("✓").green().bold());
    }
    Ok(())
}

/// List-ports command implementation.
pub(crate) fn cmd_list_ports() -> Result<()> {
    let ports = list_ports().context("could not enumerate serial ports")?;

    if ports.is_empty() {
        eprintln!("No serial ports found");
        return Ok(());
    }

    for port in ports {
        let detail = match (&port.manufacturer, &port.product) {
            (Some(m), Some(p)) => format!("  ({m} {p})"),
            (_, Some(p)) => format!("  ({p})"),
            (Some(m), _) => format!("  ({m})"),
            _ => String::new(),
        };
        println!("{}{}", port.name, style(detail).dim());
    }
    Ok(())
}

/// Drive one upload session to completion over the native transport.
///
/// All events (received bytes, timer firings, port lifecycle, Ctrl-C)
/// funnel through one channel, so the state machine runs strictly
/// single-threaded here.
fn run_upload(cli: &Cli, port: &str, request: UploadRequest) -> Result<()> {
    let (tx, rx) = mpsc::channel();

    // Ctrl-C is the user-initiated close; the session handles it from any
    // state. May legitimately fail if a handler is already installed.
    let interrupt_tx = tx.clone();
    let _ = ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(ccflash::SessionEvent::CloseRequested);
    });

    let transport = NativeTransport::new(port, tx.clone());
    let timers = NativeTimers::new(tx);

    let progress = progress_renderer(cli.quiet);
    let mut session = UploadSession::new(transport, timers, request).with_progress(progress);

    session.start();
    while !session.state().is_terminal() {
        let Ok(event) = rx.recv() else { break };
        session.handle(event);
    }

    match session.failure() {
        Some(kind) => Err(CliError::Upload(kind).into()),
        None => Ok(()),
    }
}

/// Render progress events: status lines plus a per-block progress bar.
#[allow(clippy::unwrap_used)] // Static template string
fn progress_renderer(quiet: bool) -> impl FnMut(ProgressEvent) + 'static {
    let bar = ProgressBar::hidden();

    move |event| {
        if quiet {
            return;
        }

        match event {
            ProgressEvent::ImageLoaded { bytes, blocks } => {
                eprintln!(
                    "{} Image loaded: {bytes} bytes, {blocks} blocks",
                    style("ℹ").blue()
                );
            },
            ProgressEvent::TrailingBytesDropped { bytes } => {
                eprintln!(
                    "{} File size is not a multiple of 512; \
                     the last {bytes} byte(s) will not be sent",
                    style("⚠").yellow()
                );
            },
            ProgressEvent::AwaitingDevice => {
                eprintln!("{} Waiting for device setup...", style("⏳").yellow());
            },
            ProgressEvent::AwaitingResponse => {
                eprintln!("{} Waiting for response...", style("⏳").yellow());
            },
            ProgressEvent::BlockSent { index, total } => {
                if bar.length().is_none() {
                    bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} blocks {msg}",
                            )
                            .unwrap()
                            .progress_chars("#>-"),
                    );
                    bar.set_length(total as u64);
                }
                bar.set_position(index as u64);
            },
            ProgressEvent::Done => {
                bar.finish_with_message("done");
            },
            ProgressEvent::Failed(kind) => {
                bar.abandon();
                eprintln!("{} {kind}", style("✗").red().bold());
            },
            ProgressEvent::Opening | ProgressEvent::Closed => {
                eprintln!("{} {event}", style("•").dim());
            },
        }
    }
}
