//! Instruction execution for the AAP instruction set.
//!
//! Execution runs in two phases:
//! 1. Read source operands and data memory, compute results into an
//!    [`ExecuteState`] without touching the machine.
//! 2. [`commit_execution`] applies the recorded writes in program order:
//!    register writes, data-memory writes, console output, exit code,
//!    overflow flag and finally the PC.
//!
//! An instruction that traps commits nothing, so the machine is left exactly
//! as it was before the step.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::too_many_arguments,
    unknown_lints,
    missing_docs
)]

mod flags;
mod helpers;

pub use flags::{settle, widen, FlagsUpdate};
pub use helpers::{
    effective_address, pointer_after_access, pointer_before_access, relative_target,
};

use crate::api::{Console, UnknownOpcodePolicy};
use crate::decoder::{
    AccessWidth, AddressingMode, AluOp, Condition, Decoder, Instruction, Operation,
};
use crate::fault::DecodeFailure;
use crate::memory::{read_u16_le, AddressSpace};
use crate::state::{MachineState, Reg};

/// NOP command that stops with a breakpoint.
pub const NOP_BREAKPOINT: u16 = 0;
/// NOP command that latches the register as exit code and quits.
pub const NOP_QUIT: u16 = 2;
/// NOP command that writes the register's low byte to stdout.
pub const NOP_PUTCHAR_STDOUT: u16 = 3;
/// NOP command that writes the register's low byte to stderr.
pub const NOP_PUTCHAR_STDERR: u16 = 4;

/// Outcome of executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Instruction retired normally.
    Retired,
    /// Breakpoint NOP retired.
    Breakpoint,
    /// Quit NOP retired; the exit code is pending in the execute state.
    Quit,
    /// The instruction has no execution semantics; nothing may be committed.
    Unimplemented,
}

/// Output stream selected by a character NOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// Side effects accumulated while executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteState {
    /// Register writes in program order. A later write to the same register wins.
    pub reg_writes: [Option<(Reg, u16)>; 3],
    /// Data-memory byte writes.
    pub memory_writes: [Option<(u16, u8)>; 2],
    /// Character to emit.
    pub console: Option<(ConsoleStream, u8)>,
    /// Exit code to latch.
    pub exit_code: Option<u16>,
    /// Overflow flag update to apply.
    pub flags_update: FlagsUpdate,
    /// Word PC to commit.
    pub next_pc: u16,
}

impl ExecuteState {
    /// Creates an empty execute state that falls through to `next_pc`.
    #[must_use]
    pub const fn new(next_pc: u16) -> Self {
        Self {
            reg_writes: [None; 3],
            memory_writes: [None; 2],
            console: None,
            exit_code: None,
            flags_update: FlagsUpdate::None,
            next_pc,
        }
    }

    fn write_reg(&mut self, reg: Reg, value: u16) {
        let slot = self.reg_writes.iter_mut().find(|slot| slot.is_none());
        debug_assert!(slot.is_some(), "register write slots exhausted");
        if let Some(slot) = slot {
            *slot = Some((reg, value));
        }
    }

    fn write_mem(&mut self, addr: u16, value: u8) {
        let slot = self.memory_writes.iter_mut().find(|slot| slot.is_none());
        debug_assert!(slot.is_some(), "memory write slots exhausted");
        if let Some(slot) = slot {
            *slot = Some((addr, value));
        }
    }
}

/// Executes decoded instructions under a fixed unknown-opcode policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Executor {
    unknown_opcode: UnknownOpcodePolicy,
}

impl Executor {
    #[must_use]
    pub const fn new(unknown_opcode: UnknownOpcodePolicy) -> Self {
        Self { unknown_opcode }
    }

    #[must_use]
    pub const fn unknown_opcode(&self) -> UnknownOpcodePolicy {
        self.unknown_opcode
    }

    /// Computes the effects of `instr` located at word PC `pc`.
    ///
    /// `next_pc` is the fall-through word PC. The machine is only read.
    ///
    /// # Panics
    ///
    /// Panics on an unimplemented opcode when the policy is
    /// [`UnknownOpcodePolicy::Abort`].
    #[must_use]
    pub fn execute(
        &self,
        instr: &Instruction,
        state: &MachineState,
        pc: u16,
        next_pc: u16,
    ) -> (ExecuteOutcome, ExecuteState) {
        let mut exec = ExecuteState::new(next_pc);

        let outcome = match instr.operation {
            Operation::Nop { reg, command } => execute_nop(state, &mut exec, reg, command),
            Operation::Move { rd, rs } => {
                exec.write_reg(rd, state.arch.reg(rs));
                ExecuteOutcome::Retired
            }
            Operation::MoveImmediate { rd, imm } => {
                exec.write_reg(rd, (imm & 0xFFFF) as u16);
                ExecuteOutcome::Retired
            }
            Operation::Alu { op, rd, ra, rb } => {
                let rhs = Rhs::Register(state.arch.reg(rb));
                execute_alu(state, &mut exec, op, rd, ra, rhs)
            }
            Operation::AluImmediate { op, rd, ra, imm } => {
                execute_alu(state, &mut exec, op, rd, ra, Rhs::Immediate(imm))
            }
            Operation::Load {
                width,
                mode,
                rd,
                base,
                offset,
            } => execute_load(state, &mut exec, width, mode, rd, base, offset),
            Operation::Store {
                width,
                mode,
                base,
                offset,
                rs,
            } => execute_store(state, &mut exec, width, mode, base, offset, rs),
            Operation::BranchAndLink { offset, link } => {
                exec.write_reg(link, next_pc);
                exec.next_pc = relative_target(pc, offset);
                ExecuteOutcome::Retired
            }
            Operation::JumpAndLink { target, link } => {
                let target = state.arch.reg(target);
                exec.write_reg(link, next_pc);
                exec.next_pc = target;
                ExecuteOutcome::Retired
            }
            Operation::Branch {
                cond,
                offset,
                ra,
                rb,
            } => execute_branch(state, &mut exec, pc, cond, offset, ra, rb),
            Operation::BranchAlways { offset } => {
                exec.next_pc = relative_target(pc, offset);
                ExecuteOutcome::Retired
            }
            Operation::Jump { target } => {
                exec.next_pc = state.arch.reg(target);
                ExecuteOutcome::Retired
            }
            Operation::JumpConditional { .. } => ExecuteOutcome::Unimplemented,
        };

        if outcome == ExecuteOutcome::Unimplemented {
            tracing::debug!(pc, opcode = ?instr.opcode, "no execution semantics for opcode");
            if self.unknown_opcode == UnknownOpcodePolicy::Abort {
                panic!(
                    "no simulator support for {:?} at pc {pc:#06x}",
                    instr.opcode
                );
            }
            return (outcome, ExecuteState::new(pc));
        }

        (outcome, exec)
    }
}

/// Second operand of an ALU operation.
///
/// Register operands are sign-extended for arithmetic; encoded immediates
/// are unsigned.
#[derive(Debug, Clone, Copy)]
enum Rhs {
    Register(u16),
    Immediate(u32),
}

impl Rhs {
    const fn wide(self) -> i32 {
        match self {
            Self::Register(value) => widen(value),
            Self::Immediate(imm) => imm as i32,
        }
    }

    const fn bits(self) -> u16 {
        match self {
            Self::Register(value) => value,
            Self::Immediate(imm) => imm as u16,
        }
    }
}

fn execute_nop(
    state: &MachineState,
    exec: &mut ExecuteState,
    reg: Reg,
    command: u16,
) -> ExecuteOutcome {
    let value = state.arch.reg(reg);
    let [low, _] = value.to_le_bytes();

    match command {
        NOP_BREAKPOINT => ExecuteOutcome::Breakpoint,
        NOP_QUIT => {
            exec.exit_code = Some(value);
            ExecuteOutcome::Quit
        }
        NOP_PUTCHAR_STDOUT => {
            exec.console = Some((ConsoleStream::Stdout, low));
            ExecuteOutcome::Retired
        }
        NOP_PUTCHAR_STDERR => {
            exec.console = Some((ConsoleStream::Stderr, low));
            ExecuteOutcome::Retired
        }
        _ => ExecuteOutcome::Retired,
    }
}

fn execute_alu(
    state: &MachineState,
    exec: &mut ExecuteState,
    op: AluOp,
    rd: Reg,
    ra: Reg,
    rhs: Rhs,
) -> ExecuteOutcome {
    let a = state.arch.reg(ra);
    let carry = i32::from(state.arch.overflow());

    let (result, flags) = match op {
        AluOp::Add => settle(widen(a) + rhs.wide()),
        AluOp::AddWithCarry => settle(widen(a) + rhs.wide() + carry),
        AluOp::Sub => settle(widen(a) - rhs.wide()),
        AluOp::SubWithBorrow => settle(widen(a) - rhs.wide() - carry),
        AluOp::And => (a & rhs.bits(), FlagsUpdate::None),
        AluOp::Or => (a | rhs.bits(), FlagsUpdate::None),
        AluOp::Xor => (a ^ rhs.bits(), FlagsUpdate::None),
        AluOp::Asr => {
            let shift = rhs.bits() & 0xF;
            (((a as i16) >> shift) as u16, FlagsUpdate::None)
        }
        AluOp::Lsl => (a << (rhs.bits() & 0xF), FlagsUpdate::None),
        AluOp::Lsr => (a >> (rhs.bits() & 0xF), FlagsUpdate::None),
    };

    exec.write_reg(rd, result);
    exec.flags_update = flags;
    ExecuteOutcome::Retired
}

fn execute_load(
    state: &MachineState,
    exec: &mut ExecuteState,
    width: AccessWidth,
    mode: AddressingMode,
    rd: Reg,
    base: Reg,
    offset: i32,
) -> ExecuteOutcome {
    let pointer = pointer_before_access(state.arch.reg(base), mode, width);
    if mode == AddressingMode::PreDecrement {
        exec.write_reg(base, pointer);
    }

    let addr = effective_address(pointer, offset);
    let value = match width {
        AccessWidth::Byte => u16::from(state.data_mem(addr)),
        AccessWidth::Word => read_u16_le(&state.data, addr),
    };
    exec.write_reg(rd, value);

    if let Some(pointer) = pointer_after_access(pointer, mode, width) {
        exec.write_reg(base, pointer);
    }
    ExecuteOutcome::Retired
}

fn execute_store(
    state: &MachineState,
    exec: &mut ExecuteState,
    width: AccessWidth,
    mode: AddressingMode,
    base: Reg,
    offset: i32,
    rs: Reg,
) -> ExecuteOutcome {
    let value = state.arch.reg(rs);
    let pointer = pointer_before_access(state.arch.reg(base), mode, width);
    if mode == AddressingMode::PreDecrement {
        exec.write_reg(base, pointer);
    }

    let addr = effective_address(pointer, offset);
    let [lo, hi] = value.to_le_bytes();
    exec.write_mem(addr, lo);
    if width == AccessWidth::Word {
        exec.write_mem(addr.wrapping_add(1), hi);
    }

    if let Some(pointer) = pointer_after_access(pointer, mode, width) {
        exec.write_reg(base, pointer);
    }
    ExecuteOutcome::Retired
}

fn execute_branch(
    state: &MachineState,
    exec: &mut ExecuteState,
    pc: u16,
    cond: Condition,
    offset: i32,
    ra: Reg,
    rb: Reg,
) -> ExecuteOutcome {
    if cond.holds(state.arch.reg(ra), state.arch.reg(rb)) {
        exec.next_pc = relative_target(pc, offset);
    }
    ExecuteOutcome::Retired
}

/// Applies the side effects recorded by [`Executor::execute`].
pub fn commit_execution<C: Console + ?Sized>(
    state: &mut MachineState,
    console: &mut C,
    exec: &ExecuteState,
) {
    for &(reg, value) in exec.reg_writes.iter().flatten() {
        state.arch.set_reg(reg, value);
    }

    for &(addr, value) in exec.memory_writes.iter().flatten() {
        state.set_data_mem(addr, value);
    }

    match exec.console {
        Some((ConsoleStream::Stdout, byte)) => console.put_stdout(byte),
        Some((ConsoleStream::Stderr, byte)) => console.put_stderr(byte),
        None => {}
    }

    if let Some(code) = exec.exit_code {
        state.arch.set_exit_code(code);
    }

    if let FlagsUpdate::Overflow(overflow) = exec.flags_update {
        state.arch.set_overflow(overflow);
    }

    state.arch.set_pc(exec.next_pc);
}

/// Fetches and decodes the instruction at word PC `pc`.
///
/// # Errors
///
/// Returns the decoder's failure when the bytes at `pc * 2` do not decode.
pub fn fetch_and_decode(pc: u16, code: &AddressSpace) -> Result<Instruction, DecodeFailure> {
    let address = u32::from(pc) * 2;
    Decoder::decode(code.tail(address), address)
}
