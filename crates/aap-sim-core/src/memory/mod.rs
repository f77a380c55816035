//! Code and data address spaces.

/// Little-endian word reads over raw byte images.
pub mod access;

pub use access::read_u16_le;

use crate::fault::LoadError;

/// Size in bytes of the data address space (64 KiB, 16-bit byte addresses).
pub const DATA_SPACE_BYTES: usize = u16::MAX as usize + 1;

/// Size in bytes of the code address space.
///
/// The program counter is a 16-bit word address, so code memory spans
/// 128 KiB of bytes.
pub const CODE_SPACE_BYTES: usize = 2 * (u16::MAX as usize + 1);

/// The two independent byte-addressable memories of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemorySpace {
    /// Instruction memory, written at load time and fetched by the step driver.
    Code,
    /// Data memory, read and written by load/store instructions.
    Data,
}

impl MemorySpace {
    /// Returns the size of this space in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Code => CODE_SPACE_BYTES,
            Self::Data => DATA_SPACE_BYTES,
        }
    }
}

/// Dense, zero-initialized byte store for one memory space.
///
/// The backing store always spans exactly `space.size()` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(try_from = "AddressSpaceImage")
)]
pub struct AddressSpace {
    space: MemorySpace,
    bytes: Box<[u8]>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct AddressSpaceImage {
    space: MemorySpace,
    bytes: Box<[u8]>,
}

#[cfg(feature = "serde")]
impl TryFrom<AddressSpaceImage> for AddressSpace {
    type Error = crate::fault::StateError;

    fn try_from(image: AddressSpaceImage) -> Result<Self, Self::Error> {
        let expected = image.space.size();
        if image.bytes.len() != expected {
            return Err(crate::fault::StateError::AddressSpaceLength {
                space: image.space,
                len: image.bytes.len(),
                expected,
            });
        }
        Ok(Self {
            space: image.space,
            bytes: image.bytes,
        })
    }
}

impl AddressSpace {
    /// Allocates a zeroed backing store sized for `space`.
    #[must_use]
    pub fn new(space: MemorySpace) -> Self {
        Self {
            space,
            bytes: vec![0; space.size()].into_boxed_slice(),
        }
    }

    /// Returns which memory space this store backs.
    #[must_use]
    pub const fn space(&self) -> MemorySpace {
        self.space
    }

    /// Reads one byte. Addresses past the end of the space read as zero.
    #[must_use]
    pub fn read_u8(&self, addr: u32) -> u8 {
        usize::try_from(addr)
            .ok()
            .and_then(|index| self.bytes.get(index))
            .copied()
            .unwrap_or(0)
    }

    /// Writes one byte. Writes past the end of the space are dropped.
    pub fn write_u8(&mut self, addr: u32, value: u8) {
        if let Some(slot) = usize::try_from(addr)
            .ok()
            .and_then(|index| self.bytes.get_mut(index))
        {
            *slot = value;
        }
    }

    /// Returns the bytes from `addr` to the end of the space.
    ///
    /// An address at or past the end yields an empty slice.
    #[must_use]
    pub fn tail(&self, addr: u32) -> &[u8] {
        usize::try_from(addr)
            .ok()
            .and_then(|index| self.bytes.get(index..))
            .unwrap_or(&[])
    }

    /// Copies a section image into the space starting at byte `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfRange`] when any byte of the section would
    /// land outside the space. Nothing is written in that case.
    pub fn load(&mut self, bytes: &[u8], addr: u32) -> Result<(), LoadError> {
        let out_of_range = LoadError::OutOfRange {
            space: self.space,
            address: addr,
            len: bytes.len(),
        };
        let start = usize::try_from(addr).map_err(|_| out_of_range)?;
        let end = start.checked_add(bytes.len()).ok_or(out_of_range)?;
        let target = self.bytes.get_mut(start..end).ok_or(out_of_range)?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Returns the raw backing bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
