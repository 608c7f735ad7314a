//! Additive block checksum.
//!
//! The CCLoader bootloader verifies each 512-byte block with a plain 16-bit
//! additive checksum: every byte's unsigned value is summed into a `u16`
//! with wraparound. The sum is order-insensitive and easy to collide; it is
//! kept bit-exact here because the receiving firmware computes the same one.

/// Compute the 16-bit additive checksum of a block payload.
///
/// Wrapping modular addition, never saturating or panicking.
#[must_use]
pub fn block_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::BLOCK_SIZE;

    #[test]
    fn test_empty_block_is_zero() {
        assert_eq!(block_checksum(&[]), 0);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(block_checksum(&[0x01, 0x02, 0x03]), 0x0006);
        assert_eq!(block_checksum(&[0xFF]), 0x00FF);
    }

    #[test]
    fn test_full_erase_block() {
        // 512 bytes of 0xFF: 512 * 255 = 130560 = 0xFE00, fits without wrap.
        let block = [0xFFu8; BLOCK_SIZE];
        assert_eq!(block_checksum(&block), 0xFE00);
    }

    #[test]
    fn test_wraparound() {
        // 0x8000 bytes of 0xFF exceed u16::MAX and must wrap, not trap.
        let data = vec![0xFFu8; 0x8000];
        let expected = ((0x8000u32 * 0xFF) % 0x1_0000) as u16;
        assert_eq!(block_checksum(&data), expected);
    }

    #[test]
    fn test_order_insensitive() {
        // The sum depends on byte values only; permutations collide. This is
        // a wire-compatibility requirement, not a property worth having.
        let a = [0x10, 0x20, 0x30, 0x40];
        let b = [0x40, 0x10, 0x30, 0x20];
        assert_eq!(block_checksum(&a), block_checksum(&b));
    }
}
