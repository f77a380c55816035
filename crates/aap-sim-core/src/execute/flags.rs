//! Overflow flag behavior of the add and subtract families.

/// Describes how the overflow flag should be updated after an instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagsUpdate {
    /// No change to the overflow flag.
    #[default]
    None,
    /// Overwrite the overflow flag.
    Overflow(bool),
}

/// Sign-extends a register value to 32 bits.
#[must_use]
pub const fn widen(value: u16) -> i32 {
    value as i16 as i32
}

/// Truncates a 32-bit intermediate to 16 bits.
///
/// Overflow is set when the 32-bit result differs from its 16-bit
/// sign-extended truncation.
#[must_use]
pub const fn settle(wide: i32) -> (u16, FlagsUpdate) {
    let value = wide as u16;
    (value, FlagsUpdate::Overflow(widen(value) != wide))
}
