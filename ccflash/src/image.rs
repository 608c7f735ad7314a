//! Firmware image sources.
//!
//! An [`Image`] is the ordered sequence of 512-byte blocks an upload session
//! transmits. Two kinds exist:
//!
//! - **Program**: the contents of a `.bin` file, read fully into memory when
//!   the session starts. A file whose length is not a multiple of 512 has its
//!   trailing partial block dropped: the bootloader only accepts full
//!   blocks, so the tail would never reach flash anyway. This surfaces as an
//!   advisory, not an error.
//! - **Erase**: 512 synthesized blocks of `0xFF` (256 KiB), enough to cover
//!   the whole chip. Uploading them overwrites all existing data.

use crate::error::{Error, Result};
use crate::protocol::frame::BLOCK_SIZE;
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Number of blocks in an erase image. Fixed property of erase mode.
pub const ERASE_BLOCK_COUNT: usize = 512;

/// Filler byte used for erase blocks.
pub const ERASE_FILL_BYTE: u8 = 0xFF;

/// What an image was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// File-backed firmware data.
    Program,
    /// Synthesized full-chip erase filler.
    Erase,
}

/// An in-memory firmware image, owned by a session for its duration.
#[derive(Debug, Clone)]
pub struct Image {
    data: Vec<u8>,
    total_blocks: usize,
    kind: ImageKind,
    dropped_bytes: usize,
}

impl Image {
    /// Load a program image from a file.
    ///
    /// Reads the whole file into memory. Fails with [`Error::ImageRead`] if
    /// the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| Error::ImageRead(format!("{}: {e}", path.display())))?;

        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(Self::from_bytes(data))
    }

    /// Build a program image from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let total_blocks = data.len() / BLOCK_SIZE;
        let dropped_bytes = data.len() % BLOCK_SIZE;

        if dropped_bytes != 0 {
            warn!(
                "Image size is not a multiple of {BLOCK_SIZE}; \
                 the last {dropped_bytes} byte(s) will never be sent"
            );
        }

        Self {
            data,
            total_blocks,
            kind: ImageKind::Program,
            dropped_bytes,
        }
    }

    /// Build a full-chip erase image: 512 blocks of `0xFF`.
    #[must_use]
    pub fn erase() -> Self {
        Self {
            data: vec![ERASE_FILL_BYTE; ERASE_BLOCK_COUNT * BLOCK_SIZE],
            total_blocks: ERASE_BLOCK_COUNT,
            kind: ImageKind::Erase,
            dropped_bytes: 0,
        }
    }

    /// Number of full blocks this image will transmit.
    #[must_use]
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    /// Image kind.
    #[must_use]
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    /// Image length in bytes (including any dropped tail).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image contains no full blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_blocks == 0
    }

    /// Bytes beyond the last full block that will never be transmitted.
    #[must_use]
    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }

    /// The 512-byte block at `index`.
    ///
    /// Fails only for an out-of-range index, which indicates a caller bug;
    /// sessions always bound the index by [`Image::total_blocks`].
    pub fn block(&self, index: usize) -> Result<&[u8]> {
        if index >= self.total_blocks {
            return Err(Error::BlockOutOfRange {
                index,
                total: self.total_blocks,
            });
        }

        let start = index * BLOCK_SIZE;
        Ok(&self.data[start..start + BLOCK_SIZE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_block_count_floor_division() {
        let image = Image::from_bytes(vec![0xAA; 1024]);
        assert_eq!(image.total_blocks(), 2);
        assert_eq!(image.dropped_bytes(), 0);
    }

    #[test]
    fn test_partial_tail_dropped() {
        // 513 bytes: one full block, one advisory byte never transmitted.
        let mut data = vec![0x11; 513];
        data[512] = 0x99;
        let image = Image::from_bytes(data);

        assert_eq!(image.total_blocks(), 1);
        assert_eq!(image.dropped_bytes(), 1);

        let block = image.block(0).unwrap();
        assert_eq!(block.len(), BLOCK_SIZE);
        assert!(block.iter().all(|&b| b == 0x11));
        assert!(image.block(1).is_err());
    }

    #[test]
    fn test_under_one_block_sends_nothing() {
        let image = Image::from_bytes(vec![0x55; 100]);
        assert_eq!(image.total_blocks(), 0);
        assert_eq!(image.dropped_bytes(), 100);
        assert!(image.is_empty());
    }

    #[test]
    fn test_erase_image_shape() {
        let image = Image::erase();

        assert_eq!(image.kind(), ImageKind::Erase);
        assert_eq!(image.total_blocks(), ERASE_BLOCK_COUNT);
        assert_eq!(image.len(), 256 * 1024);
        assert_eq!(image.dropped_bytes(), 0);

        for index in [0, 255, 511] {
            let block = image.block(index).unwrap();
            assert_eq!(block.len(), BLOCK_SIZE);
            assert!(block.iter().all(|&b| b == ERASE_FILL_BYTE));
        }
        assert!(image.block(ERASE_BLOCK_COUNT).is_err());
    }

    #[test]
    fn test_block_contents_match_offsets() {
        let mut data = vec![0u8; 1024];
        data[0] = 0xA0;
        data[512] = 0xB0;
        let image = Image::from_bytes(data);

        assert_eq!(image.block(0).unwrap()[0], 0xA0);
        assert_eq!(image.block(1).unwrap()[0], 0xB0);
    }

    #[test]
    fn test_from_file_reads_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0xC3; 1536]).unwrap();
        file.flush().unwrap();

        let image = Image::from_file(file.path()).unwrap();
        assert_eq!(image.kind(), ImageKind::Program);
        assert_eq!(image.total_blocks(), 3);
    }

    #[test]
    fn test_from_file_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not_there.bin");

        let err = Image::from_file(&missing).unwrap_err();
        assert!(matches!(err, Error::ImageRead(_)));
    }
}
