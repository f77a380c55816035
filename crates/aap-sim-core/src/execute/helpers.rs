//! Addressing-mode and control-transfer helpers for instruction execution.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::decoder::{AccessWidth, AddressingMode};

/// Pointer value used for the access: decremented first in pre-decrement mode.
#[must_use]
pub const fn pointer_before_access(pointer: u16, mode: AddressingMode, width: AccessWidth) -> u16 {
    match mode {
        AddressingMode::PreDecrement => pointer.wrapping_sub(width.bytes()),
        AddressingMode::Plain | AddressingMode::PostIncrement => pointer,
    }
}

/// Pointer write-back after the access, if the mode has one.
#[must_use]
pub const fn pointer_after_access(
    pointer: u16,
    mode: AddressingMode,
    width: AccessWidth,
) -> Option<u16> {
    match mode {
        AddressingMode::PostIncrement => Some(pointer.wrapping_add(width.bytes())),
        AddressingMode::Plain | AddressingMode::PreDecrement => None,
    }
}

/// Data address of `pointer + offset`, wrapping in the 16-bit data space.
#[must_use]
pub const fn effective_address(pointer: u16, offset: i32) -> u16 {
    pointer.wrapping_add(offset as u16)
}

/// Word PC reached by a PC-relative transfer from `pc`.
#[must_use]
pub const fn relative_target(pc: u16, offset: i32) -> u16 {
    pc.wrapping_add(offset as u16)
}
