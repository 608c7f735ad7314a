//! CCLoader frame encoding and decoding.
//!
//! The host→device direction carries three message types:
//!
//! ```text
//! BEGIN:  +------+------+
//!         | 0x01 | 0x00 |
//!         +------+------+
//!
//! DATA:   +------+----------------+---------+---------+
//!         | 0x02 |  payload (512) | sum hi  | sum lo  |
//!         +------+----------------+---------+---------+
//!         total 515 bytes, checksum big-endian
//!
//! END:    +------+
//!         | 0x04 |
//!         +------+
//! ```
//!
//! The device→host direction is strictly single-byte-per-event: each received
//! byte stands alone as a RESPONSE (0x03), an ERROR (0x05), or noise.

use crate::protocol::checksum::block_checksum;
use byteorder::{BigEndian, WriteBytesExt};

/// Frame tag bytes.
pub mod tag {
    /// Transmission-enable request (host→device).
    pub const BEGIN: u8 = 0x01;
    /// Block payload frame (host→device).
    pub const DATA: u8 = 0x02;
    /// Block acknowledgment (device→host).
    pub const RESPONSE: u8 = 0x03;
    /// End of stream (host→device).
    pub const END: u8 = 0x04;
    /// Failure indication (device→host).
    pub const ERROR: u8 = 0x05;
}

/// Size of one firmware block in bytes.
pub const BLOCK_SIZE: usize = 512;

/// On-wire size of a DATA frame: tag + payload + 2-byte checksum.
pub const DATA_FRAME_LEN: usize = 1 + BLOCK_SIZE + 2;

/// A decoded device→host message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// The device acknowledged the previous frame.
    Response,
    /// The device reported a failure.
    Error,
    /// An unrecognized byte; logged by the session, never fatal.
    Unknown(u8),
}

impl Frame {
    /// Interpret a single received byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            tag::RESPONSE => Self::Response,
            tag::ERROR => Self::Error,
            other => Self::Unknown(other),
        }
    }
}

/// Encode a BEGIN frame.
#[must_use]
pub fn encode_begin() -> [u8; 2] {
    [tag::BEGIN, 0x00]
}

/// Encode an END frame.
#[must_use]
pub fn encode_end() -> [u8; 1] {
    [tag::END]
}

/// Encode a DATA frame for one 512-byte block.
///
/// The block is framed verbatim; the additive checksum trails it high byte
/// first. There is no sequence number on the wire; ordering is implicit in
/// the per-block acknowledgment cadence.
#[must_use]
#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
pub fn encode_data(block: &[u8]) -> Vec<u8> {
    debug_assert_eq!(block.len(), BLOCK_SIZE);

    let mut buf = Vec::with_capacity(DATA_FRAME_LEN);
    buf.push(tag::DATA);
    buf.extend_from_slice(block);
    buf.write_u16::<BigEndian>(block_checksum(block)).unwrap();
    buf
}

/// Decode a raw chunk received from the transport.
///
/// The transport delivers chunks of arbitrary length; every byte is an
/// independent one-byte message.
#[must_use]
pub fn decode(received: &[u8]) -> Vec<Frame> {
    received.iter().copied().map(Frame::from_byte).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_begin() {
        assert_eq!(encode_begin(), [0x01, 0x00]);
    }

    #[test]
    fn test_encode_end() {
        assert_eq!(encode_end(), [0x04]);
    }

    #[test]
    fn test_encode_data_layout() {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0x12;
        block[511] = 0x34;

        let frame = encode_data(&block);

        assert_eq!(frame.len(), DATA_FRAME_LEN);
        assert_eq!(frame[0], tag::DATA);
        assert_eq!(&frame[1..=BLOCK_SIZE], &block[..]);
        // 0x12 + 0x34 = 0x46, big-endian trailer
        assert_eq!(frame[513], 0x00);
        assert_eq!(frame[514], 0x46);
    }

    #[test]
    fn test_encode_data_checksum_trailer_big_endian() {
        let block = [0xFFu8; BLOCK_SIZE];
        let frame = encode_data(&block);

        // 512 * 0xFF = 0xFE00
        assert_eq!(frame[513], 0xFE);
        assert_eq!(frame[514], 0x00);
    }

    #[test]
    fn test_decode_single_bytes() {
        assert_eq!(Frame::from_byte(0x03), Frame::Response);
        assert_eq!(Frame::from_byte(0x05), Frame::Error);
        assert_eq!(Frame::from_byte(0x42), Frame::Unknown(0x42));
    }

    #[test]
    fn test_decode_chunk_byte_per_frame() {
        let frames = decode(&[0x03, 0x03, 0x05, 0x00]);
        assert_eq!(
            frames,
            vec![
                Frame::Response,
                Frame::Response,
                Frame::Error,
                Frame::Unknown(0x00)
            ]
        );
    }

    #[test]
    fn test_decode_empty_chunk() {
        assert!(decode(&[]).is_empty());
    }
}
