//! Step driver and host-facing simulator handle.

use crate::api::{
    Console, InvalidInstructionPolicy, RunOutcome, SimConfig, StdConsole, StepStatus, TraceEvent,
    TraceSink,
};
use crate::execute::{commit_execution, fetch_and_decode, ExecuteOutcome, Executor};
use crate::fault::{DecodeFailure, LoadError};
use crate::state::{MachineState, Reg};

struct NoTrace;

impl TraceSink for NoTrace {
    fn on_event(&mut self, _event: TraceEvent) {}
}

fn register(index: usize) -> Reg {
    match u8::try_from(index).ok().and_then(Reg::new) {
        Some(reg) => reg,
        None => panic!("register index {index} is outside r0..r63"),
    }
}

/// One simulated AAP machine.
///
/// Owns its machine state, so independent instances need no synchronization.
#[derive(Debug)]
pub struct Simulator<C: Console = StdConsole> {
    state: MachineState,
    config: SimConfig,
    executor: Executor,
    console: C,
}

impl Simulator<StdConsole> {
    /// Creates a simulator whose output NOPs write to the host's stdout/stderr.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::with_console(config, StdConsole)
    }
}

impl Default for Simulator<StdConsole> {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl<C: Console> Simulator<C> {
    /// Creates a simulator that routes output NOPs to `console`.
    #[must_use]
    pub fn with_console(config: SimConfig, console: C) -> Self {
        Self {
            state: MachineState::default(),
            config,
            executor: Executor::new(config.unknown_opcode),
            console,
        }
    }

    /// Copies `bytes` into code memory at byte address `address`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfRange`] when the section does not fit; code
    /// memory is left untouched in that case.
    pub fn load_code_section(&mut self, bytes: &[u8], address: u32) -> Result<(), LoadError> {
        self.state.code.load(bytes, address)?;
        tracing::debug!(address, len = bytes.len(), "loaded code section");
        Ok(())
    }

    /// Copies `bytes` into data memory at byte address `address`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::OutOfRange`] when the section does not fit; data
    /// memory is left untouched in that case.
    pub fn load_data_section(&mut self, bytes: &[u8], address: u32) -> Result<(), LoadError> {
        self.state.data.load(bytes, address)?;
        tracing::debug!(address, len = bytes.len(), "loaded data section");
        Ok(())
    }

    /// Executes exactly one instruction.
    pub fn step(&mut self) -> StepStatus {
        self.step_with(&mut NoTrace).0
    }

    /// Executes exactly one instruction, reporting trace events to `sink`.
    pub fn step_traced(&mut self, sink: &mut dyn TraceSink) -> StepStatus {
        self.step_with(sink).0
    }

    fn step_with(&mut self, sink: &mut dyn TraceSink) -> (StepStatus, Option<DecodeFailure>) {
        let pc = self.state.arch.pc();

        let instruction = match fetch_and_decode(pc, &self.state.code) {
            Ok(instruction) => instruction,
            Err(failure) => {
                tracing::debug!(pc, error = %failure, "invalid instruction");
                sink.on_event(TraceEvent::DecodeFailed {
                    pc,
                    error: failure.error,
                    fallback_size: failure.size,
                });
                return (StepStatus::InvalidInstruction, Some(failure));
            }
        };

        let size = instruction.size();
        tracing::trace!(pc, opcode = ?instruction.opcode, size, "execute");
        sink.on_event(TraceEvent::InstructionStart {
            pc,
            opcode: instruction.opcode,
            size,
        });

        let next_pc = pc.wrapping_add(u16::from(size / 2));
        let (outcome, exec) = self.executor.execute(&instruction, &self.state, pc, next_pc);

        let status = match outcome {
            ExecuteOutcome::Retired => StepStatus::Ok,
            ExecuteOutcome::Breakpoint => {
                tracing::debug!(pc, "breakpoint");
                StepStatus::Breakpoint
            }
            ExecuteOutcome::Quit => {
                tracing::debug!(pc, exit_code = ?exec.exit_code, "quit");
                StepStatus::Quit
            }
            ExecuteOutcome::Unimplemented => StepStatus::Trap,
        };

        if outcome != ExecuteOutcome::Unimplemented {
            commit_execution(&mut self.state, &mut self.console, &exec);
        }

        sink.on_event(TraceEvent::InstructionRetired {
            pc,
            next_pc: self.state.arch.pc(),
            status,
        });
        (status, None)
    }

    /// Runs until a terminal status and returns it.
    ///
    /// Returns [`StepStatus::Ok`] only when the configured step budget ran out.
    pub fn run(&mut self) -> StepStatus {
        self.run_outcome().status
    }

    /// Runs until a terminal status or the step budget, counting steps.
    pub fn run_outcome(&mut self) -> RunOutcome {
        self.run_with(&mut NoTrace)
    }

    /// Like [`Simulator::run_outcome`], reporting trace events to `sink`.
    pub fn run_traced(&mut self, sink: &mut dyn TraceSink) -> RunOutcome {
        self.run_with(sink)
    }

    fn run_with(&mut self, sink: &mut dyn TraceSink) -> RunOutcome {
        let mut steps = 0_u64;
        loop {
            if self.config.max_steps.is_some_and(|max| steps >= max) {
                tracing::debug!(steps, "step budget exhausted");
                return RunOutcome {
                    steps,
                    status: StepStatus::Ok,
                };
            }

            let (status, failure) = self.step_with(sink);
            steps += 1;

            if let Some(failure) = failure {
                if self.config.invalid_instruction == InvalidInstructionPolicy::Resync
                    && failure.size > 0
                {
                    let pc = self.state.arch.pc();
                    let resumed = pc.wrapping_add(u16::from(failure.size / 2));
                    tracing::debug!(pc, resumed, "skipping undecodable instruction");
                    self.state.arch.set_pc(resumed);
                    continue;
                }
            }

            if status.is_terminal() {
                return RunOutcome { steps, status };
            }
        }
    }

    /// Reads general-purpose register `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is not below 64.
    #[must_use]
    pub fn reg(&self, index: usize) -> u16 {
        self.state.arch.reg(register(index))
    }

    /// Writes general-purpose register `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is not below 64.
    pub fn set_reg(&mut self, index: usize, value: u16) {
        self.state.arch.set_reg(register(index), value);
    }

    /// Word-addressed program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.state.arch.pc()
    }

    /// Sets the word-addressed program counter.
    pub const fn set_pc(&mut self, pc: u16) {
        self.state.arch.set_pc(pc);
    }

    /// Current overflow flag.
    #[must_use]
    pub const fn overflow(&self) -> bool {
        self.state.arch.overflow()
    }

    /// Overwrites the overflow flag.
    pub const fn set_overflow(&mut self, overflow: bool) {
        self.state.arch.set_overflow(overflow);
    }

    /// Exit code latched by the last quit NOP. Meaningful after [`StepStatus::Quit`].
    #[must_use]
    pub const fn exit_code(&self) -> u16 {
        self.state.arch.exit_code()
    }

    /// Reads one byte of data memory.
    #[must_use]
    pub fn data_byte(&self, address: u16) -> u8 {
        self.state.data_mem(address)
    }

    /// Reads one byte of code memory.
    #[must_use]
    pub fn code_byte(&self, address: u32) -> u8 {
        self.state.code_mem(address)
    }

    /// Full machine state.
    #[must_use]
    pub const fn state(&self) -> &MachineState {
        &self.state
    }

    /// Mutable machine state for test setup and debuggers.
    pub const fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    /// Configuration the simulator was built with.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Console receiving output NOPs.
    #[must_use]
    pub const fn console(&self) -> &C {
        &self.console
    }

    /// Mutable console, e.g. to drain captured output.
    pub const fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Restores registers, PC, overflow flag and exit code to zero.
    ///
    /// Loaded code and data images are kept.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
