//! # ccflash
//!
//! A library implementing the CCLoader block-upload protocol used to flash
//! CC253x-class chips through an Arduino running the CCLoader sketch.
//!
//! This crate provides the protocol core:
//!
//! - Frame encoding/decoding for the five CCLoader message types
//! - The 16-bit additive block checksum
//! - Firmware image sources (file-backed, and full-chip erase filler)
//! - The event-driven upload session state machine
//! - A native serial transport and timer facility (feature `native`)
//!
//! ## Protocol
//!
//! The link is half duplex and strictly request-response: the host sends
//! BEGIN, then one 515-byte DATA frame (512-byte block + 2-byte checksum)
//! per RESPONSE byte from the device, then END. The device answers with
//! single bytes only. See the [`protocol`] and [`session`] modules.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ccflash::{NativeTimers, NativeTransport, SessionEvent, UploadRequest, UploadSession};
//! use std::sync::mpsc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, rx) = mpsc::channel();
//!     let transport = NativeTransport::new("/dev/ttyUSB0", tx.clone());
//!     let timers = NativeTimers::new(tx);
//!
//!     let mut session = UploadSession::new(
//!         transport,
//!         timers,
//!         UploadRequest::Program("firmware.bin".into()),
//!     )
//!     .with_progress(|event| println!("{event}"));
//!
//!     session.start();
//!     while !session.state().is_terminal() {
//!         session.handle(rx.recv()?);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod image;
pub mod port;
pub mod protocol;
pub mod session;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::{NativeTimers, NativeTransport, list_ports};
pub use {
    error::{Error, Result},
    image::{ERASE_BLOCK_COUNT, Image, ImageKind},
    port::{Parity, PortInfo, SerialSettings, StopBits, TimerScheduler, Transport},
    protocol::frame::{BLOCK_SIZE, DATA_FRAME_LEN, Frame},
    session::{
        FailureKind, ProgressEvent, SessionEvent, SessionState, TimerKind, UploadRequest,
        UploadSession,
    },
};
