//! Transport and timer seams between the protocol core and the platform.
//!
//! The upload session is I/O-agnostic: it calls into a [`Transport`] to move
//! bytes and a [`TimerScheduler`] to arm one-shot delays, and consumes the
//! resulting lifecycle notifications as [`SessionEvent`]s from a single
//! serialized queue. This keeps the state machine free of threads and locks,
//! and lets tests drive it with in-memory mocks.
//!
//! ```text
//! +--------------------+
//! |   UploadSession    |
//! +----+----------+----+
//!      |          |
//!      v          v
//! +----+-----+ +--+-------------+
//! | Transport| | TimerScheduler |
//! +----+-----+ +--+-------------+
//!      |          |
//!      v          v
//! +----+----------+----+
//! |  mpsc SessionEvent |  (native driver / test harness)
//! +--------------------+
//! ```
//!
//! [`SessionEvent`]: crate::session::SessionEvent

#[cfg(feature = "native")]
pub mod native;

use crate::error::Result;
use crate::session::TimerKind;
use std::time::Duration;

/// Serial line configuration for the upload link.
///
/// The CCLoader protocol runs at a fixed configuration; [`Default`] yields
/// it: 115200 baud, 8 data bits, no parity, one stop bit, DTR and RTS held
/// low so opening the port does not reset the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate.
    pub baud_rate: u32,
    /// Parity checking mode.
    pub parity: Parity,
    /// Number of stop bits.
    pub stop_bits: StopBits,
    /// DTR line level after open.
    pub dtr: bool,
    /// RTS line level after open.
    pub rts: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            parity: Parity::None,
            stop_bits: StopBits::One,
            dtr: false,
            rts: false,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Serial port information, as reported by enumeration.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// Byte transport for one upload session.
///
/// `open` and `send` report immediate failures through their return value;
/// everything asynchronous (the port actually opening, received bytes, the
/// port closing, the device disappearing) arrives later as a
/// [`SessionEvent`](crate::session::SessionEvent) on the session's queue.
pub trait Transport {
    /// Open the port with the given line settings.
    fn open(&mut self, settings: &SerialSettings) -> Result<()>;

    /// Queue bytes for transmission.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the port. Safe to call in any state; a
    /// [`SessionEvent::PortClosed`](crate::session::SessionEvent::PortClosed)
    /// follows once the port is gone.
    fn close(&mut self);

    /// Whether the port is currently open.
    fn is_open(&self) -> bool;
}

/// One-shot delayed callback facility.
///
/// Timers are fire-once and cooperatively scheduled: a firing is delivered
/// as [`SessionEvent::TimerElapsed`](crate::session::SessionEvent::TimerElapsed)
/// on the same serialized queue as every other event. There is no cancel
/// API; the session ignores firings that no longer apply.
pub trait TimerScheduler {
    /// Arm a single-shot timer.
    fn schedule(&mut self, delay: Duration, timer: TimerKind);
}

// Re-export the native implementation when enabled
#[cfg(feature = "native")]
pub use native::{NativeTimers, NativeTransport, list_ports};
