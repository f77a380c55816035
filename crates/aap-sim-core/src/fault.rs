use thiserror::Error;

use crate::memory::MemorySpace;

/// Register index spaces used by the instruction encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterClass {
    /// 8-entry class addressed by 3-bit fields of short encodings.
    Narrow,
    /// 64-entry class addressed by 6-bit fields of long encodings.
    Full,
}

/// Reason an instruction could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    /// Not enough bytes remained to assemble the next instruction word.
    #[error("instruction stream truncated")]
    Truncated,
    /// Neither the 16-bit nor the 32-bit encoding table matched.
    #[error("no instruction encoding matches")]
    NoMatchingEncoding,
    /// A register field indexed past the end of its register-class table.
    #[error("register index {index} is outside the {class:?} register class")]
    RegisterOutOfRange {
        /// Class whose table was consulted.
        class: RegisterClass,
        /// Raw field value.
        index: u32,
    },
}

/// Decode failure together with the resynchronization size reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("decode failed at byte address {address:#06x}: {error}")]
pub struct DecodeFailure {
    /// Underlying decode error.
    pub error: DecodeError,
    /// Bytes a caller may skip to resynchronize (`0` when the stream is exhausted).
    pub size: u8,
    /// Byte address the decode was attempted at.
    pub address: u32,
}

impl DecodeFailure {
    /// Creates a failure that reports `size` bytes for resynchronization.
    #[must_use]
    pub const fn new(error: DecodeError, size: u8, address: u32) -> Self {
        Self {
            error,
            size,
            address,
        }
    }
}

/// Host-side section loading failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LoadError {
    /// The section does not fit inside the target address space.
    #[error("{len}-byte section at {address:#x} does not fit in {space:?} memory")]
    OutOfRange {
        /// Address space the section targeted.
        space: MemorySpace,
        /// Requested base byte address.
        address: u32,
        /// Section length in bytes.
        len: usize,
    },
}

/// A register index or state image that breaks a machine-state invariant.
///
/// Raised when converting raw values into [`crate::Reg`] and when a
/// serialized state image is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum StateError {
    /// Register index at or past the end of the register file.
    #[error("register index {0} is outside r0..r63")]
    RegisterIndex(u8),
    /// Register file image with the wrong number of registers.
    #[error("register file holds {0} registers, expected 64")]
    RegisterFileLength(usize),
    /// Address-space image whose length differs from the size of its space.
    #[error("{space:?} image holds {len} bytes, expected {expected}")]
    AddressSpaceLength {
        /// Space the image claims to back.
        space: MemorySpace,
        /// Bytes present in the image.
        len: usize,
        /// Size of the space.
        expected: usize,
    },
    /// Address-space image stored in the slot of the other space.
    #[error("{found:?} image stored where {expected:?} memory belongs")]
    MisplacedSpace {
        /// Space the slot holds.
        expected: MemorySpace,
        /// Space the image claims to back.
        found: MemorySpace,
    },
}
