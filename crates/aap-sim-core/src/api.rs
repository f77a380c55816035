//! Public host-facing API contracts for embedding the simulator core.

use std::io::Write;

use crate::encoding::Opcode;
use crate::fault::DecodeError;

/// Behavior when a recognized opcode has no execution semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum UnknownOpcodePolicy {
    /// Leave state and PC untouched and report [`StepStatus::Trap`].
    #[default]
    Trap,
    /// Panic with the offending opcode. Intended for debugging simulator gaps.
    Abort,
}

/// Behavior of the run loop when the decoder rejects the bytes at PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InvalidInstructionPolicy {
    /// Stop and report [`StepStatus::InvalidInstruction`].
    #[default]
    Stop,
    /// Skip the decoder's fallback size and keep running.
    ///
    /// A failure reporting size `0` (stream exhausted) still stops the run.
    Resync,
}

/// Top-level immutable configuration for a simulator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SimConfig {
    /// Handling of decoded-but-unimplemented opcodes.
    pub unknown_opcode: UnknownOpcodePolicy,
    /// Run-loop handling of undecodable instructions.
    pub invalid_instruction: InvalidInstructionPolicy,
    /// Maximum instructions per run call; `None` runs until a terminal status.
    pub max_steps: Option<u64>,
}

/// Result of simulating one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepStatus {
    /// Instruction retired; execution may continue.
    Ok,
    /// Unimplemented opcode; PC still addresses the offending instruction.
    Trap,
    /// Program-requested breakpoint.
    Breakpoint,
    /// Program-requested exit; the exit code is latched.
    Quit,
    /// The bytes at PC do not decode; PC is unchanged.
    InvalidInstruction,
}

impl StepStatus {
    /// Returns true for every status the default run loop stops on.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Trap => "trap",
            Self::Breakpoint => "breakpoint",
            Self::Quit => "quit",
            Self::InvalidInstruction => "invalid instruction",
        };
        f.write_str(name)
    }
}

/// Aggregated outcome of a run call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Steps attempted during this run call, including the terminal one.
    pub steps: u64,
    /// Last status observed. `Ok` only when the step budget ran out.
    pub status: StepStatus,
}

impl RunOutcome {
    /// Returns true when the run stopped on the configured step budget.
    #[must_use]
    pub const fn budget_exhausted(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Character sink for the output NOP commands.
///
/// This is the only I/O boundary the core touches.
pub trait Console {
    /// Emits one byte on the program's standard output.
    fn put_stdout(&mut self, byte: u8);
    /// Emits one byte on the program's standard error.
    fn put_stderr(&mut self, byte: u8);
}

/// Console bound to the host process's stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn put_stdout(&mut self, byte: u8) {
        let mut out = std::io::stdout().lock();
        if let Err(error) = out.write_all(&[byte]).and_then(|()| out.flush()) {
            tracing::warn!(%error, "failed to write simulated stdout");
        }
    }

    fn put_stderr(&mut self, byte: u8) {
        let mut err = std::io::stderr().lock();
        if let Err(error) = err.write_all(&[byte]).and_then(|()| err.flush()) {
            tracing::warn!(%error, "failed to write simulated stderr");
        }
    }
}

/// Console that captures output in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferConsole {
    /// Bytes written to standard output.
    pub stdout: Vec<u8>,
    /// Bytes written to standard error.
    pub stderr: Vec<u8>,
}

impl BufferConsole {
    /// Captured standard output, lossily decoded as UTF-8.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Captured standard error, lossily decoded as UTF-8.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl Console for BufferConsole {
    fn put_stdout(&mut self, byte: u8) {
        self.stdout.push(byte);
    }

    fn put_stderr(&mut self, byte: u8) {
        self.stderr.push(byte);
    }
}

/// Deterministic trace events emitted at step boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// Instruction decoded and about to execute.
    InstructionStart {
        /// Word PC of the instruction.
        pc: u16,
        /// Decoded encoding.
        opcode: Opcode,
        /// Encoded size in bytes.
        size: u8,
    },
    /// Instruction finished executing.
    InstructionRetired {
        /// Word PC of the instruction.
        pc: u16,
        /// Word PC committed after the instruction.
        next_pc: u16,
        /// Status reported by the step.
        status: StepStatus,
    },
    /// The bytes at PC did not decode.
    DecodeFailed {
        /// Word PC of the fetch.
        pc: u16,
        /// Decoder error.
        error: DecodeError,
        /// Bytes the decoder suggests skipping to resynchronize.
        fallback_size: u8,
    },
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BufferConsole, Console, InvalidInstructionPolicy, RunOutcome, SimConfig, StepStatus,
        UnknownOpcodePolicy,
    };

    #[test]
    fn default_config_traps_stops_and_runs_unbounded() {
        let config = SimConfig::default();

        assert_eq!(config.unknown_opcode, UnknownOpcodePolicy::Trap);
        assert_eq!(config.invalid_instruction, InvalidInstructionPolicy::Stop);
        assert_eq!(config.max_steps, None);
    }

    #[test]
    fn only_ok_is_continuable() {
        assert!(!StepStatus::Ok.is_terminal());
        for status in [
            StepStatus::Trap,
            StepStatus::Breakpoint,
            StepStatus::Quit,
            StepStatus::InvalidInstruction,
        ] {
            assert!(status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn run_outcome_reports_budget_exhaustion() {
        let exhausted = RunOutcome {
            steps: 10,
            status: StepStatus::Ok,
        };
        let quit = RunOutcome {
            steps: 3,
            status: StepStatus::Quit,
        };

        assert!(exhausted.budget_exhausted());
        assert!(!quit.budget_exhausted());
    }

    #[test]
    fn buffer_console_keeps_streams_apart() {
        let mut console = BufferConsole::default();
        for byte in *b"hi" {
            console.put_stdout(byte);
        }
        console.put_stderr(b'!');

        assert_eq!(console.stdout_text(), "hi");
        assert_eq!(console.stderr_text(), "!");
    }
}
