#![no_main]

use aap_sim_core::{BufferConsole, Decoder, SimConfig, Simulator, StepStatus};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let address = u32::from(u16::from_le_bytes([data[0], data[1]])) << 1;
    let program = &data[2..];

    if let Ok(instruction) = Decoder::decode(program, address) {
        assert!(usize::from(instruction.size()) <= program.len());
    }

    let config = SimConfig {
        max_steps: Some(256),
        ..SimConfig::default()
    };
    let mut sim = Simulator::with_console(config, BufferConsole::default());
    if sim.load_code_section(program, 0).is_err() {
        return;
    }
    let _ = sim.load_data_section(program, 0);

    let before = sim.pc();
    let status = sim.step();
    if matches!(status, StepStatus::Trap | StepStatus::InvalidInstruction) {
        assert_eq!(sim.pc(), before);
    }
    let _ = sim.run_outcome();
});
