//! Whole-program runs through the run loop, policies and host hooks.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use aap_sim_core::{
    BufferConsole, InvalidInstructionPolicy, LoadError, MemorySpace, Opcode, SimConfig, Simulator,
    StepStatus, TraceEvent, UnknownOpcodePolicy,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const ALU: u32 = 0b00;
const MEM: u32 = 0b01;
const CTRL: u32 = 0b10;

#[derive(Debug, Clone, Copy)]
enum Insn {
    Short(u16),
    Long(u32),
}

const fn short(class: u32, opc: u32, a: u32, b: u32, c: u32) -> Insn {
    Insn::Short(((class << 13) | (opc << 9) | (a << 6) | (b << 3) | c) as u16)
}

const fn long(class: u32, opc: u32, x: u32, a: u32, b: u32, c: u32) -> Insn {
    Insn::Long(
        0x8000
            | (class << 13)
            | (opc << 9)
            | ((a & 7) << 6)
            | ((b & 7) << 3)
            | (c & 7)
            | (x << 25)
            | ((a >> 3) << 22)
            | ((b >> 3) << 19)
            | ((c >> 3) << 16),
    )
}

const fn movi_long(rd: u32, imm: u32) -> Insn {
    long(ALU, 0xF, imm >> 12, rd, (imm >> 6) & 0x3F, imm & 0x3F)
}

const fn nop(reg: u32, command: u32) -> Insn {
    short(ALU, 0x0, reg, command >> 3, command & 7)
}

fn assemble(program: &[Insn]) -> Vec<u8> {
    program
        .iter()
        .flat_map(|insn| match *insn {
            Insn::Short(word) => word.to_le_bytes().to_vec(),
            Insn::Long(word) => word.to_le_bytes().to_vec(),
        })
        .collect()
}

fn load(config: SimConfig, program: &[Insn]) -> Simulator<BufferConsole> {
    let mut sim = Simulator::with_console(config, BufferConsole::default());
    sim.load_code_section(&assemble(program), 0)
        .expect("program fits in code memory");
    sim
}

#[test]
fn hello_world_writes_stdout_and_quits() {
    let mut sim = load(
        SimConfig::default(),
        &[
            movi_long(1, u32::from(b'H')),
            nop(1, 3),
            movi_long(1, u32::from(b'i')),
            nop(1, 3),
            movi_long(2, u32::from(b'!')),
            nop(2, 4),
            short(ALU, 0xF, 3, 0, 0),
            nop(3, 2),
        ],
    );

    let outcome = sim.run_outcome();

    assert_eq!(outcome.status, StepStatus::Quit);
    assert_eq!(outcome.steps, 8);
    assert_eq!(sim.console().stdout_text(), "Hi");
    assert_eq!(sim.console().stderr_text(), "!");
    assert_eq!(sim.exit_code(), 0);
}

#[test]
fn countdown_loop_accumulates_and_reports_exit_code() {
    let mut sim = load(
        SimConfig::default(),
        &[
            short(ALU, 0xF, 1, 0, 5),  // movi r1, 5
            short(ALU, 0xF, 2, 0, 0),  // movi r2, 0
            short(ALU, 0xA, 2, 2, 3),  // addi r2, r2, 3
            short(ALU, 0xB, 1, 1, 1),  // subi r1, r1, 1
            short(CTRL, 0x3, 6, 1, 0), // bne -2, r1, r0
            nop(2, 2),
        ],
    );

    let outcome = sim.run_outcome();

    assert_eq!(outcome.status, StepStatus::Quit);
    assert_eq!(outcome.steps, 18);
    assert_eq!(sim.exit_code(), 15);
    assert_eq!(sim.reg(1), 0);
}

#[test]
fn subroutine_call_and_return_through_link_register() {
    let mut sim = load(
        SimConfig::default(),
        &[
            short(ALU, 0xF, 1, 2, 4),  // movi r1, 20
            short(CTRL, 0x1, 0, 3, 7), // bal +3, r7
            nop(1, 2),
            nop(0, 1),
            short(ALU, 0xA, 1, 1, 1),  // addi r1, r1, 1
            short(ALU, 0xD, 1, 1, 0),  // lsli r1, r1, 1
            short(CTRL, 0x8, 7, 0, 0), // jmp r7
        ],
    );

    assert_eq!(sim.run(), StepStatus::Quit);
    assert_eq!(sim.exit_code(), 42);
    assert_eq!(sim.reg(7), 2);
}

#[test]
fn long_forms_walk_a_table_in_high_registers() {
    let mut sim = load(
        SimConfig::default(),
        &[
            movi_long(40, 0x0400),         // r40 = table
            movi_long(41, 3),              // r41 = count
            movi_long(42, 0),              // r42 = sum
            long(MEM, 0x5, 0, 43, 40, 0),  // ldw r43, [r40+, 0]
            long(ALU, 0x1, 0, 42, 42, 43), // add r42, r42, r43
            long(ALU, 0xB, 0, 41, 41, 1),  // subi r41, r41, 1
            long(CTRL, 0x3, 0xF, 0x3A, 41, 0), // bne -6, r41, r0
            long(ALU, 0x0, 0, 42, 0, 2),   // nop r42, 2
        ],
    );
    sim.load_data_section(&[0x01, 0x00, 0x20, 0x00, 0x00, 0x03], 0x0400)
        .expect("table fits");

    assert_eq!(sim.run(), StepStatus::Quit);
    assert_eq!(sim.exit_code(), 0x0321);
    assert_eq!(sim.reg(40), 0x0406);
}

#[test]
fn breakpoint_stops_the_run_and_can_be_resumed() {
    let mut sim = load(
        SimConfig::default(),
        &[nop(0, 0), short(ALU, 0xF, 4, 1, 1), nop(4, 2)],
    );

    assert_eq!(sim.run(), StepStatus::Breakpoint);
    assert_eq!(sim.pc(), 1);
    assert_eq!(sim.run(), StepStatus::Quit);
    assert_eq!(sim.exit_code(), 9);
}

#[rstest]
#[case::stop(InvalidInstructionPolicy::Stop, StepStatus::InvalidInstruction, 1, 0)]
#[case::resync(InvalidInstructionPolicy::Resync, StepStatus::Quit, 2, 2)]
fn invalid_instruction_policy(
    #[case] policy: InvalidInstructionPolicy,
    #[case] status: StepStatus,
    #[case] steps: u64,
    #[case] final_pc: u16,
) {
    let config = SimConfig {
        invalid_instruction: policy,
        ..SimConfig::default()
    };
    // Reserved-class word followed by a quit NOP.
    let mut sim = load(config, &[Insn::Short(0xE000), nop(0, 2)]);

    let outcome = sim.run_outcome();

    assert_eq!(outcome.status, status);
    assert_eq!(outcome.steps, steps);
    assert_eq!(sim.pc(), final_pc);
}

#[test]
fn step_budget_bounds_an_infinite_loop() {
    let config = SimConfig {
        max_steps: Some(100),
        ..SimConfig::default()
    };
    let mut sim = load(config, &[short(CTRL, 0x0, 0, 0, 0)]);

    let outcome = sim.run_outcome();

    assert_eq!(outcome.steps, 100);
    assert_eq!(outcome.status, StepStatus::Ok);
    assert!(outcome.budget_exhausted());
    assert_eq!(sim.pc(), 0);
}

#[test]
fn unimplemented_opcode_traps_in_place() {
    let mut sim = load(
        SimConfig::default(),
        &[short(ALU, 0xF, 1, 0, 1), short(CTRL, 0xB, 1, 2, 3)],
    );

    assert_eq!(sim.run(), StepStatus::Trap);
    assert_eq!(sim.pc(), 1);
    assert_eq!(sim.step(), StepStatus::Trap);
    assert_eq!(sim.pc(), 1);
}

#[test]
#[should_panic(expected = "no simulator support")]
fn abort_policy_panics_on_unimplemented_opcode() {
    let config = SimConfig {
        unknown_opcode: UnknownOpcodePolicy::Abort,
        ..SimConfig::default()
    };
    let mut sim = load(config, &[long(CTRL, 0xF, 0, 1, 2, 3)]);

    let _ = sim.run();
}

#[test]
fn run_traced_reports_events_in_program_order() {
    let mut sim = load(SimConfig::default(), &[movi_long(1, 0x100), nop(1, 2)]);
    let mut events = Vec::new();

    let outcome = sim.run_traced(&mut events);

    assert_eq!(outcome.status, StepStatus::Quit);
    assert_eq!(
        events,
        vec![
            TraceEvent::InstructionStart {
                pc: 0,
                opcode: Opcode::Movi,
                size: 4
            },
            TraceEvent::InstructionRetired {
                pc: 0,
                next_pc: 2,
                status: StepStatus::Ok
            },
            TraceEvent::InstructionStart {
                pc: 2,
                opcode: Opcode::NopShort,
                size: 2
            },
            TraceEvent::InstructionRetired {
                pc: 2,
                next_pc: 3,
                status: StepStatus::Quit
            },
        ]
    );
}

#[test]
fn reset_clears_registers_but_keeps_loaded_images() {
    let mut sim = load(SimConfig::default(), &[short(ALU, 0xF, 1, 7, 7), nop(1, 2)]);
    sim.load_data_section(&[0x5A], 0x1000).expect("data fits");

    assert_eq!(sim.run(), StepStatus::Quit);
    sim.reset();

    assert_eq!(sim.pc(), 0);
    assert_eq!(sim.reg(1), 0);
    assert_eq!(sim.exit_code(), 0);
    assert!(!sim.overflow());
    assert_eq!(sim.data_byte(0x1000), 0x5A);
    assert_eq!(sim.run(), StepStatus::Quit);
    assert_eq!(sim.exit_code(), 63);
}

#[test]
fn host_can_seed_state_and_drain_output_between_runs() {
    let mut sim = load(
        SimConfig::default(),
        &[nop(5, 3), nop(0, 0), nop(5, 3), nop(5, 2)],
    );
    sim.state_mut().set_data_mem(0x20, 0x77);
    sim.set_reg(5, u16::from(b'a'));

    assert_eq!(sim.run(), StepStatus::Breakpoint);
    assert_eq!(std::mem::take(&mut sim.console_mut().stdout), b"a");

    sim.set_reg(5, u16::from(b'b'));
    assert_eq!(sim.run(), StepStatus::Quit);
    assert_eq!(sim.console().stdout_text(), "b");
    assert_eq!(sim.exit_code(), u16::from(b'b'));
    assert_eq!(sim.data_byte(0x20), 0x77);
}

#[test]
fn sections_outside_their_space_are_rejected_whole() {
    let mut sim = Simulator::with_console(SimConfig::default(), BufferConsole::default());

    assert_eq!(
        sim.load_data_section(&[1, 2], 0xFFFF),
        Err(LoadError::OutOfRange {
            space: MemorySpace::Data,
            address: 0xFFFF,
            len: 2
        })
    );
    assert_eq!(sim.data_byte(0xFFFF), 0);
    assert!(sim.load_code_section(&[1, 2], 0x1_FFFE).is_ok());
    assert!(sim.load_code_section(&[1, 2, 3], 0x1_FFFE).is_err());
    assert_eq!(sim.code_byte(0x1_FFFE), 1);
}

#[test]
fn independent_simulators_run_on_separate_threads() {
    let handles: Vec<_> = (1..=4u32)
        .map(|value| {
            std::thread::spawn(move || {
                let mut sim = load(SimConfig::default(), &[movi_long(1, value), nop(1, 2)]);
                (sim.run(), sim.exit_code())
            })
        })
        .collect();

    for (handle, value) in handles.into_iter().zip(1..=4u16) {
        let (status, code) = handle.join().expect("simulator thread");
        assert_eq!(status, StepStatus::Quit);
        assert_eq!(code, value);
    }
}
