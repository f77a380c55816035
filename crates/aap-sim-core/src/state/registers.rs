use crate::fault::StateError;

/// Number of architecturally visible general-purpose registers (`R0..R63`).
pub const GENERAL_REGISTER_COUNT: usize = 64;

/// Physical general-purpose register identifier.
///
/// Values are always below [`GENERAL_REGISTER_COUNT`]; the only way to
/// build one is through [`Reg::new`] (or its `TryFrom<u8>` form) or the
/// decoder's register-class tables. Deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct Reg(u8);

impl Reg {
    /// `R0`.
    pub const R0: Self = Self(0);

    /// Returns the register with physical index `index`, if it exists.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < GENERAL_REGISTER_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the array index for this register (`0..=63`).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterates every register in ascending index order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..GENERAL_REGISTER_COUNT as u8).map(Self)
    }
}

impl TryFrom<u8> for Reg {
    type Error = StateError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or(StateError::RegisterIndex(index))
    }
}

impl From<Reg> for u8 {
    fn from(reg: Reg) -> Self {
        reg.0
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Register file, program counter, overflow flag and exit-code latch.
///
/// The register file always holds exactly [`GENERAL_REGISTER_COUNT`] entries.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(try_from = "RegisterFileImage")
)]
pub struct ArchitecturalState {
    gpr: Box<[u16]>,
    pc: u16,
    overflow: bool,
    exit_code: u16,
}

/// Unvalidated deserialization form of [`ArchitecturalState`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RegisterFileImage {
    gpr: Box<[u16]>,
    pc: u16,
    overflow: bool,
    exit_code: u16,
}

#[cfg(feature = "serde")]
impl TryFrom<RegisterFileImage> for ArchitecturalState {
    type Error = StateError;

    fn try_from(image: RegisterFileImage) -> Result<Self, Self::Error> {
        if image.gpr.len() != GENERAL_REGISTER_COUNT {
            return Err(StateError::RegisterFileLength(image.gpr.len()));
        }
        Ok(Self {
            gpr: image.gpr,
            pc: image.pc,
            overflow: image.overflow,
            exit_code: image.exit_code,
        })
    }
}

impl Default for ArchitecturalState {
    fn default() -> Self {
        Self {
            gpr: vec![0; GENERAL_REGISTER_COUNT].into_boxed_slice(),
            pc: 0,
            overflow: false,
            exit_code: 0,
        }
    }
}

impl ArchitecturalState {
    /// Reads a general-purpose register.
    #[must_use]
    pub fn reg(&self, reg: Reg) -> u16 {
        self.gpr[reg.index()]
    }

    /// Writes a general-purpose register.
    pub fn set_reg(&mut self, reg: Reg, value: u16) {
        self.gpr[reg.index()] = value;
    }

    /// Reads the word-addressed program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    /// Writes the word-addressed program counter.
    pub const fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    /// Reads the overflow flag.
    #[must_use]
    pub const fn overflow(&self) -> bool {
        self.overflow
    }

    /// Writes the overflow flag.
    pub const fn set_overflow(&mut self, value: bool) {
        self.overflow = value;
    }

    /// Reads the exit code captured by the last quit request.
    #[must_use]
    pub const fn exit_code(&self) -> u16 {
        self.exit_code
    }

    /// Latches the exit code reported by a quit request.
    pub const fn set_exit_code(&mut self, value: u16) {
        self.exit_code = value;
    }
}
