//! Little-endian word reads shared by data loads.

use super::AddressSpace;

/// Reads a little-endian 16-bit word at `addr` and `addr + 1`.
///
/// No alignment is required. The high byte address wraps within the 16-bit
/// data address range.
#[must_use]
pub fn read_u16_le(memory: &AddressSpace, addr: u16) -> u16 {
    let lo = memory.read_u8(u32::from(addr));
    let hi = memory.read_u8(u32::from(addr.wrapping_add(1)));
    u16::from_le_bytes([lo, hi])
}

#[cfg(test)]
mod tests {
    use super::read_u16_le;
    use crate::memory::{AddressSpace, MemorySpace};

    fn data_with(bytes: &[(u32, u8)]) -> AddressSpace {
        let mut data = AddressSpace::new(MemorySpace::Data);
        for &(addr, value) in bytes {
            data.write_u8(addr, value);
        }
        data
    }

    #[test]
    fn low_byte_comes_first() {
        let data = data_with(&[(0x0200, 0x34), (0x0201, 0x12)]);
        assert_eq!(read_u16_le(&data, 0x0200), 0x1234);
    }

    #[test]
    fn unaligned_words_are_permitted() {
        let data = data_with(&[(0x0101, 0xEF), (0x0102, 0xBE)]);
        assert_eq!(read_u16_le(&data, 0x0101), 0xBEEF);
        assert_eq!(read_u16_le(&data, 0x0100), 0xEF00);
    }

    #[test]
    fn word_at_top_of_data_space_wraps_high_byte() {
        let data = data_with(&[(0xFFFF, 0x5A), (0x0000, 0xA5)]);
        assert_eq!(read_u16_le(&data, 0xFFFF), 0xA55A);
    }
}
