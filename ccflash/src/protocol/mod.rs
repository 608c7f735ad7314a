//! CCLoader wire protocol: checksum and frame codec.

pub mod checksum;
pub mod frame;

// Re-export common types
pub use checksum::block_checksum;
pub use frame::{BLOCK_SIZE, DATA_FRAME_LEN, Frame, decode, encode_begin, encode_data, encode_end};
