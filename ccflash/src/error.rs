//! Error types for ccflash.

use std::io;
use thiserror::Error;

/// Result type for ccflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ccflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The serial port could not be opened.
    #[error("Failed to open serial port: {0}")]
    PortOpen(String),

    /// The firmware image could not be read.
    #[error("Failed to read firmware image: {0}")]
    ImageRead(String),

    /// A frame could not be written to the transport.
    #[error("Failed to send frame: {0}")]
    Send(String),

    /// The device never acknowledged the transmission-enable request.
    #[error("Timed out waiting for the device to respond")]
    Timeout,

    /// The device reported a write verification failure.
    #[error("Device reported a verify failure")]
    VerifyFailed,

    /// The device sent an error before acknowledging anything.
    #[error("No target device detected")]
    NoDeviceDetected,

    /// The device was physically removed mid-session.
    #[error("Device was removed")]
    DeviceRemoved,

    /// A block index outside the image was requested.
    #[error("Block index {index} out of range ({total} blocks)")]
    BlockOutOfRange {
        /// Requested block index.
        index: usize,
        /// Number of blocks in the image.
        total: usize,
    },
}
