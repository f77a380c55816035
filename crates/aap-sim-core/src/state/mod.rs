//! Architectural machine state.

/// Register file and special register model.
pub mod registers;

pub use registers::{ArchitecturalState, Reg, GENERAL_REGISTER_COUNT};

#[cfg(feature = "serde")]
use crate::fault::StateError;
use crate::memory::{AddressSpace, MemorySpace};

/// Complete state owned by one simulator instance.
///
/// Created once per run and mutated only by the executor through the step
/// driver. No instruction creates or destroys registers or address spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(try_from = "MachineStateImage")
)]
pub struct MachineState {
    /// Registers, program counter, overflow flag and exit code.
    pub arch: ArchitecturalState,
    /// Instruction memory.
    pub code: AddressSpace,
    /// Data memory.
    pub data: AddressSpace,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct MachineStateImage {
    arch: ArchitecturalState,
    code: AddressSpace,
    data: AddressSpace,
}

#[cfg(feature = "serde")]
impl TryFrom<MachineStateImage> for MachineState {
    type Error = StateError;

    fn try_from(image: MachineStateImage) -> Result<Self, Self::Error> {
        for (slot, expected) in [
            (&image.code, MemorySpace::Code),
            (&image.data, MemorySpace::Data),
        ] {
            if slot.space() != expected {
                return Err(StateError::MisplacedSpace {
                    expected,
                    found: slot.space(),
                });
            }
        }
        Ok(Self {
            arch: image.arch,
            code: image.code,
            data: image.data,
        })
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            arch: ArchitecturalState::default(),
            code: AddressSpace::new(MemorySpace::Code),
            data: AddressSpace::new(MemorySpace::Data),
        }
    }
}

impl MachineState {
    /// Reads a byte of data memory.
    #[must_use]
    pub fn data_mem(&self, addr: u16) -> u8 {
        self.data.read_u8(u32::from(addr))
    }

    /// Writes a byte of data memory.
    pub fn set_data_mem(&mut self, addr: u16, value: u8) {
        self.data.write_u8(u32::from(addr), value);
    }

    /// Reads a byte of code memory.
    #[must_use]
    pub fn code_mem(&self, addr: u32) -> u8 {
        self.code.read_u8(addr)
    }

    /// Writes a byte of code memory.
    pub fn set_code_mem(&mut self, addr: u32, value: u8) {
        self.code.write_u8(addr, value);
    }

    /// Restores registers, PC, overflow flag and exit code to zero.
    ///
    /// Both memory images are preserved.
    pub fn reset(&mut self) {
        self.arch = ArchitecturalState::default();
    }
}
