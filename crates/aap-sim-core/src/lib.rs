//! Instruction-set simulator core for the AAP 16-bit architecture.
//!
//! Decodes 16- and 32-bit little-endian instruction words from code memory
//! and executes them against 64 general-purpose registers, a separate data
//! memory and a single overflow flag.

/// Code and data address spaces.
pub mod memory;
pub use memory::{read_u16_le, AddressSpace, MemorySpace, CODE_SPACE_BYTES, DATA_SPACE_BYTES};

/// Architectural machine state.
pub mod state;
pub use state::{ArchitecturalState, MachineState, Reg, GENERAL_REGISTER_COUNT};

/// Opcode enumeration and mask/match encoding tables.
pub mod encoding;
pub use encoding::{InstructionClass, Opcode, LONG_ENCODINGS, SHORT_ENCODINGS};

/// Instruction decoder with register-class tables and operand field decoders.
pub mod decoder;
pub use decoder::{
    AccessWidth, AddressingMode, AluOp, Condition, Decoder, Instruction, Operation,
    FULL_REGISTERS, NARROW_REGISTERS,
};

/// Decode and load error taxonomy.
pub mod fault;
pub use fault::{DecodeError, DecodeFailure, LoadError, RegisterClass, StateError};

/// Host-facing configuration, status and hook types.
pub mod api;
pub use api::{
    BufferConsole, Console, InvalidInstructionPolicy, RunOutcome, SimConfig, StdConsole,
    StepStatus, TraceEvent, TraceSink, UnknownOpcodePolicy,
};

/// Instruction execution.
pub mod execute;
pub use execute::{commit_execution, fetch_and_decode, ExecuteOutcome, ExecuteState, Executor};

/// Step driver and simulator handle.
pub mod sim;
pub use sim::Simulator;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
