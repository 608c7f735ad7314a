//! Upload session state machine.
//!
//! One [`UploadSession`] drives a complete CCLoader upload: open the port,
//! resolve the image, handshake, stream blocks one acknowledgment at a time,
//! finish with an END frame. The protocol is strictly request-response:
//! block *N+1* is never sent before the device acknowledges block *N*, so
//! at most one frame is ever in flight and flow control is implicit in the
//! acknowledgment cadence.
//!
//! The session reacts to exactly one serialized stream of [`SessionEvent`]s
//! (transport lifecycle, received bytes, timer firings, device removal).
//! No two transitions run concurrently and the session holds no locks; the
//! driver owning the event queue decides how events are produced (threads
//! and channels in [`port::native`](crate::port::native), plain calls in
//! tests).
//!
//! ```text
//! Idle -> OpeningPort -> AwaitingDeviceReady -> EnablingTransmission
//!      -> AwaitingFirstAck -> Programming (self-loop per block)
//!      -> AwaitingEndAck -> Closed
//! ```
//!
//! `Failed(kind)` is terminal and reachable from every non-terminal state.
//! No failure is retried.

use crate::error::Error;
use crate::image::Image;
use crate::port::{SerialSettings, TimerScheduler, Transport};
use crate::protocol::frame::{self, Frame};
use log::{debug, error, info, trace, warn};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Settle time granted to the target's own boot sequence before BEGIN.
pub const DEVICE_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// How long to wait for the first acknowledgment after BEGIN.
///
/// This is the only timeout in the protocol: once the first acknowledgment
/// arrives no per-block deadline is enforced. The asymmetry is inherited
/// from the device firmware's host tooling and is kept as-is.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Linger after sending END before closing the port, so the final frame
/// drains before the line drops.
pub const CLOSE_DELAY: Duration = Duration::from_secs(2);

/// What a session uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRequest {
    /// Upload the firmware image at the given path.
    Program(PathBuf),
    /// Upload 512 filler blocks, erasing the whole chip.
    Erase,
}

/// One-shot timers the session arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Delay between port open and the BEGIN frame.
    DeviceSettle,
    /// Handshake deadline; ignored once `is_flashing` is set.
    ResponseTimeout,
    /// Delay between END and closing the port.
    CloseDelay,
}

/// Inbound events, consumed from a single serialized queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport finished opening the port.
    PortOpened,
    /// The port is closed, whether by protocol completion or by a failure.
    PortClosed,
    /// The transport hit a non-fatal error; logged, no transition.
    PortFault(String),
    /// A chunk of raw bytes arrived from the device.
    BytesReceived(Vec<u8>),
    /// A previously armed timer fired.
    TimerElapsed(TimerKind),
    /// The device was physically removed. Valid in any state.
    DeviceRemoved,
    /// The user asked to close the port. Valid in any state.
    CloseRequested,
}

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The serial port could not be opened.
    PortOpen,
    /// The firmware file could not be read.
    ImageRead,
    /// A frame could not be written to the transport.
    Send,
    /// No acknowledgment within [`RESPONSE_TIMEOUT`] of BEGIN.
    Timeout,
    /// The device reported an error after at least one block was accepted.
    VerifyFailed,
    /// The device reported an error before accepting anything.
    NoDeviceDetected,
    /// The device disappeared mid-session.
    DeviceRemoved,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::PortOpen => "failed to open serial port",
            Self::ImageRead => "failed to read firmware image",
            Self::Send => "failed to send frame",
            Self::Timeout => "timed out waiting for device response",
            Self::VerifyFailed => "verify failed",
            Self::NoDeviceDetected => "no target device detected",
            Self::DeviceRemoved => "device removed",
        };
        f.write_str(msg)
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started.
    Idle,
    /// `Transport::open` issued, confirmation pending.
    OpeningPort,
    /// Image resolved; waiting out the device settle delay.
    AwaitingDeviceReady,
    /// Sending the BEGIN frame.
    EnablingTransmission,
    /// BEGIN sent; waiting for the first acknowledgment.
    AwaitingFirstAck,
    /// Streaming blocks, one per acknowledgment.
    Programming,
    /// END sent; lingering before close.
    AwaitingEndAck,
    /// Terminal: the port closed after a completed (or user-closed) session.
    Closed,
    /// Terminal: the session failed. Never retried.
    Failed(FailureKind),
}

impl SessionState {
    /// Whether the session can react to further events.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }
}

/// Human-readable progress emitted towards the driver's sink.
///
/// Strictly one-way; the session never queries the sink. Rendering (progress
/// bars, in-place counters) is entirely the sink's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The port is being opened.
    Opening,
    /// The image was resolved.
    ImageLoaded {
        /// Image size in bytes.
        bytes: usize,
        /// Full blocks to transmit.
        blocks: usize,
    },
    /// Advisory: a partial trailing block will never be sent.
    TrailingBytesDropped {
        /// Number of bytes beyond the last full block.
        bytes: usize,
    },
    /// Waiting out the device settle delay.
    AwaitingDevice,
    /// BEGIN sent; waiting for the first acknowledgment.
    AwaitingResponse,
    /// A block was sent (1-based index).
    BlockSent {
        /// 1-based index of the block just sent.
        index: usize,
        /// Total number of blocks.
        total: usize,
    },
    /// All blocks acknowledged and END sent.
    Done,
    /// The session failed.
    Failed(FailureKind),
    /// The port closed after a non-failed session.
    Closed,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opening => write!(f, "opening serial port"),
            Self::ImageLoaded { bytes, blocks } => {
                write!(f, "image loaded: {bytes} bytes, {blocks} blocks")
            },
            Self::TrailingBytesDropped { bytes } => write!(
                f,
                "warning: {bytes} trailing byte(s) beyond the last full block will not be sent"
            ),
            Self::AwaitingDevice => write!(f, "waiting for device setup"),
            Self::AwaitingResponse => write!(f, "waiting for response"),
            Self::BlockSent { index, total } => write!(f, "block {index} of {total}"),
            Self::Done => write!(f, "done"),
            Self::Failed(kind) => write!(f, "error: {kind}"),
            Self::Closed => write!(f, "serial port closed"),
        }
    }
}

/// Progress callback type.
pub type ProgressFn = Box<dyn FnMut(ProgressEvent)>;

/// The upload protocol engine.
///
/// Generic over the transport and timer implementations so the same state
/// machine runs against real serial hardware and against in-memory mocks.
pub struct UploadSession<T: Transport, S: TimerScheduler> {
    transport: T,
    timers: S,
    request: UploadRequest,
    settings: SerialSettings,
    state: SessionState,
    image: Option<Image>,
    blocks_sent: usize,
    is_flashing: bool,
    progress: ProgressFn,
}

impl<T: Transport, S: TimerScheduler> UploadSession<T, S> {
    /// Create a session for the given request.
    pub fn new(transport: T, timers: S, request: UploadRequest) -> Self {
        Self {
            transport,
            timers,
            request,
            settings: SerialSettings::default(),
            state: SessionState::Idle,
            image: None,
            blocks_sent: 0,
            is_flashing: false,
            progress: Box::new(|_| {}),
        }
    }

    /// Install a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: impl FnMut(ProgressEvent) + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Why the session failed, if it did.
    #[must_use]
    pub fn failure(&self) -> Option<FailureKind> {
        match self.state {
            SessionState::Failed(kind) => Some(kind),
            _ => None,
        }
    }

    /// Blocks acknowledged-and-sent so far. Monotone within a session.
    #[must_use]
    pub fn blocks_sent(&self) -> usize {
        self.blocks_sent
    }

    /// Total blocks in the resolved image, or 0 before resolution.
    #[must_use]
    pub fn total_blocks(&self) -> usize {
        self.image.as_ref().map_or(0, Image::total_blocks)
    }

    /// Whether at least one block has been acknowledged.
    #[must_use]
    pub fn is_flashing(&self) -> bool {
        self.is_flashing
    }

    /// Start the session: ask the transport to open the fixed-configuration
    /// serial link. An immediate open failure is terminal.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state, SessionState::Idle);

        info!("Opening serial port");
        self.state = SessionState::OpeningPort;
        (self.progress)(ProgressEvent::Opening);

        let settings = self.settings.clone();
        if let Err(e) = self.transport.open(&settings) {
            error!("Port open failed: {e}");
            self.fail(FailureKind::PortOpen);
        }
    }

    /// Feed one event from the serialized queue.
    ///
    /// Events arriving after a terminal state are discarded. In particular
    /// the handshake timer is never cancelled, so a stale firing can land
    /// after a failure; it must not rewrite the recorded outcome.
    pub fn handle(&mut self, event: SessionEvent) {
        trace!("Event {event:?} in state {:?}", self.state);

        if self.state.is_terminal() {
            trace!("Ignoring {event:?}; session already ended");
            return;
        }

        match event {
            SessionEvent::PortOpened => self.on_port_opened(),
            SessionEvent::PortClosed => self.on_port_closed(),
            SessionEvent::PortFault(msg) => warn!("Serial port error: {msg}"),
            SessionEvent::BytesReceived(bytes) => self.on_bytes(&bytes),
            SessionEvent::TimerElapsed(kind) => self.on_timer(kind),
            SessionEvent::DeviceRemoved => self.on_device_removed(),
            SessionEvent::CloseRequested => self.transport.close(),
        }
    }

    fn on_port_opened(&mut self) {
        if self.state != SessionState::OpeningPort {
            debug!("Ignoring PortOpened in state {:?}", self.state);
            return;
        }

        let image = match &self.request {
            UploadRequest::Program(path) => {
                info!("Reading image from {}", path.display());
                match Image::from_file(path) {
                    Ok(image) => image,
                    Err(e) => {
                        error!("Image read failed: {e}");
                        self.fail(FailureKind::ImageRead);
                        return;
                    },
                }
            },
            UploadRequest::Erase => {
                info!("Synthesizing full-chip erase image");
                Image::erase()
            },
        };

        let bytes = image.len();
        let blocks = image.total_blocks();
        let dropped = image.dropped_bytes();
        info!("Image ready: {bytes} bytes, {blocks} blocks");

        self.image = Some(image);
        (self.progress)(ProgressEvent::ImageLoaded { bytes, blocks });
        if dropped != 0 {
            (self.progress)(ProgressEvent::TrailingBytesDropped { bytes: dropped });
        }

        self.state = SessionState::AwaitingDeviceReady;
        self.timers
            .schedule(DEVICE_SETTLE_DELAY, TimerKind::DeviceSettle);
        (self.progress)(ProgressEvent::AwaitingDevice);
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::DeviceSettle => {
                if self.state == SessionState::AwaitingDeviceReady {
                    self.enable_transmission();
                } else {
                    debug!("Ignoring settle timer in state {:?}", self.state);
                }
            },
            TimerKind::ResponseTimeout => {
                // The timer is never cancelled. A firing only matters while
                // the handshake is still pending and the port is still open.
                if !self.is_flashing && self.transport.is_open() {
                    warn!("No response within {RESPONSE_TIMEOUT:?}");
                    self.fail(FailureKind::Timeout);
                }
            },
            TimerKind::CloseDelay => {
                if self.transport.is_open() {
                    self.transport.close();
                }
            },
        }
    }

    fn enable_transmission(&mut self) {
        self.state = SessionState::EnablingTransmission;
        info!("Enabling transmission");

        if let Err(e) = self.transport.send(&frame::encode_begin()) {
            error!("BEGIN send failed: {e}");
            self.fail(FailureKind::Send);
            return;
        }

        self.timers
            .schedule(RESPONSE_TIMEOUT, TimerKind::ResponseTimeout);
        self.state = SessionState::AwaitingFirstAck;
        (self.progress)(ProgressEvent::AwaitingResponse);
    }

    fn on_bytes(&mut self, bytes: &[u8]) {
        for frame in frame::decode(bytes) {
            if self.state.is_terminal() {
                break;
            }

            match self.state {
                SessionState::AwaitingFirstAck | SessionState::Programming => {
                    self.on_frame(frame);
                },
                _ => {
                    trace!("Ignoring {frame:?} in state {:?}", self.state);
                },
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Response => self.on_ack(),
            Frame::Error => {
                let kind = if self.is_flashing {
                    FailureKind::VerifyFailed
                } else {
                    FailureKind::NoDeviceDetected
                };
                error!("Device signalled an error: {kind}");
                self.fail(kind);
            },
            Frame::Unknown(byte) => {
                warn!("Unknown response byte: 0x{byte:02X}");
            },
        }
    }

    fn on_ack(&mut self) {
        let Some(image) = self.image.as_ref() else {
            debug!("Acknowledgment without an image; ignoring");
            return;
        };
        let total = image.total_blocks();

        if self.blocks_sent == total {
            info!("All {total} blocks acknowledged, sending END");
            if let Err(e) = self.transport.send(&frame::encode_end()) {
                error!("END send failed: {e}");
                self.fail(FailureKind::Send);
                return;
            }

            self.timers.schedule(CLOSE_DELAY, TimerKind::CloseDelay);
            self.state = SessionState::AwaitingEndAck;
            (self.progress)(ProgressEvent::Done);
            return;
        }

        self.is_flashing = true;

        let data = match image.block(self.blocks_sent) {
            Ok(block) => frame::encode_data(block),
            Err(e) => {
                // Unreachable while blocks_sent is bounded by total_blocks.
                error!("Block lookup failed: {e}");
                self.fail(FailureKind::Send);
                return;
            },
        };

        if let Err(e) = self.transport.send(&data) {
            error!("DATA send failed: {e}");
            self.fail(FailureKind::Send);
            return;
        }

        self.blocks_sent += 1;
        self.state = SessionState::Programming;
        debug!("Sent block {} of {total}", self.blocks_sent);
        (self.progress)(ProgressEvent::BlockSent {
            index: self.blocks_sent,
            total,
        });
    }

    fn on_device_removed(&mut self) {
        warn!("Device removed");
        self.reset_fields();
        self.state = SessionState::Failed(FailureKind::DeviceRemoved);
        (self.progress)(ProgressEvent::Failed(FailureKind::DeviceRemoved));
    }

    fn on_port_closed(&mut self) {
        info!("Serial port closed");
        self.reset_fields();

        // A failed session stays failed; the close that follows a failure
        // must not launder the outcome into a clean Closed.
        if !matches!(self.state, SessionState::Failed(_)) {
            self.state = SessionState::Closed;
            (self.progress)(ProgressEvent::Closed);
        }
    }

    fn fail(&mut self, kind: FailureKind) {
        self.state = SessionState::Failed(kind);
        (self.progress)(ProgressEvent::Failed(kind));
        if self.transport.is_open() {
            self.transport.close();
        }
    }

    fn reset_fields(&mut self) {
        self.blocks_sent = 0;
        self.image = None;
        self.is_flashing = false;
    }
}

impl From<FailureKind> for Error {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::PortOpen => Self::PortOpen(kind.to_string()),
            FailureKind::ImageRead => Self::ImageRead(kind.to_string()),
            FailureKind::Send => Self::Send(kind.to_string()),
            FailureKind::Timeout => Self::Timeout,
            FailureKind::VerifyFailed => Self::VerifyFailed,
            FailureKind::NoDeviceDetected => Self::NoDeviceDetected,
            FailureKind::DeviceRemoved => Self::DeviceRemoved,
        }
    }
}
