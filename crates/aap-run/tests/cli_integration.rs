//! Integration tests for the aap-run CLI.

#![allow(clippy::cast_possible_truncation)]

use aap_sim_core as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

const ALU: u32 = 0b00;
const MEM: u32 = 0b01;
const CTRL: u32 = 0b10;

fn short(class: u32, opc: u32, a: u32, b: u32, c: u32) -> Vec<u8> {
    (((class << 13) | (opc << 9) | (a << 6) | (b << 3) | c) as u16)
        .to_le_bytes()
        .to_vec()
}

fn movi_long(rd: u32, imm: u32) -> Vec<u8> {
    let low = 0x8000 | (ALU << 13) | (0xF << 9) | ((rd & 7) << 6) | (((imm >> 6) & 7) << 3) | (imm & 7);
    let high = ((imm >> 12) << 9) | ((rd >> 3) << 6) | (((imm >> 9) & 7) << 3) | ((imm >> 3) & 7);
    (low | (high << 16)).to_le_bytes().to_vec()
}

fn nop(reg: u32, command: u32) -> Vec<u8> {
    short(ALU, 0x0, reg, command >> 3, command & 7)
}

fn write_image(dir: &Path, name: &str, parts: &[Vec<u8>]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, parts.concat()).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aap-run"))
        .args(args)
        .output()
        .expect("failed to run aap-run")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn quit_code_becomes_exit_status() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(
        temp_dir.path(),
        "quit.bin",
        &[short(ALU, 0xF, 1, 0, 7), nop(1, 2)],
    );

    let output = run(&[path_arg(&code)]);

    assert_eq!(output.status.code(), Some(7));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("quit with exit code 0x0007"), "{stderr}");
}

#[test]
fn output_nops_reach_the_host_streams() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(
        temp_dir.path(),
        "hello.bin",
        &[
            movi_long(1, u32::from(b'o')),
            nop(1, 3),
            movi_long(1, u32::from(b'k')),
            nop(1, 3),
            movi_long(2, u32::from(b'?')),
            nop(2, 4),
            nop(0, 2),
        ],
    );

    let output = run(&[path_arg(&code)]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(output.stdout, b"ok");
    assert!(output.stderr.starts_with(b"?"));
}

#[test]
fn data_image_is_loaded_at_its_address() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(
        temp_dir.path(),
        "load.bin",
        &[
            short(ALU, 0xF, 2, 2, 0), // movi r2, 0x10
            short(MEM, 0x4, 1, 2, 0), // ldw r1, [r2, 0]
            nop(1, 2),
        ],
    );
    let data = write_image(temp_dir.path(), "data.bin", &[vec![0x2A, 0x00]]);

    let output = run(&[
        "--data",
        path_arg(&data),
        "--data-addr",
        "0x10",
        path_arg(&code),
    ]);

    assert_eq!(output.status.code(), Some(42));
}

#[test]
fn entry_and_code_address_select_the_start() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(
        temp_dir.path(),
        "entry.bin",
        &[short(ALU, 0xF, 1, 0, 3), nop(1, 2)],
    );

    let output = run(&["--code-addr", "0x200", "--entry", "256", path_arg(&code)]);

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn breakpoint_status() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(temp_dir.path(), "bkpt.bin", &[nop(0, 0)]);

    let output = run(&[path_arg(&code)]);

    assert_eq!(output.status.code(), Some(0x85));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("breakpoint at pc 0x0001"), "{stderr}");
}

#[test]
fn unimplemented_opcode_status() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(temp_dir.path(), "jcc.bin", &[short(CTRL, 0xA, 1, 2, 3)]);

    let output = run(&[path_arg(&code)]);

    assert_eq!(output.status.code(), Some(0x86));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("trap at pc 0x0000"), "{stderr}");
}

#[test]
fn invalid_instruction_stops_unless_resyncing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(
        temp_dir.path(),
        "reserved.bin",
        &[vec![0x00, 0x60], short(ALU, 0xF, 1, 0, 5), nop(1, 2)],
    );

    let stopped = run(&[path_arg(&code)]);
    assert_eq!(stopped.status.code(), Some(0x84));
    assert!(String::from_utf8_lossy(&stopped.stderr).contains("invalid instruction"));

    let resynced = run(&["--resync", path_arg(&code)]);
    assert_eq!(resynced.status.code(), Some(5));
}

#[test]
fn step_budget_status() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(temp_dir.path(), "spin.bin", &[short(CTRL, 0x0, 0, 0, 0)]);

    let output = run(&["--max-steps", "50", path_arg(&code)]);

    assert_eq!(output.status.code(), Some(0x87));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("after 50 steps"), "{stderr}");
}

#[test]
fn missing_image_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("absent.bin");

    let output = run(&[path_arg(&missing)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read"));
}

#[test]
fn oversized_data_image_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let code = write_image(temp_dir.path(), "quit.bin", &[nop(0, 2)]);
    let data = write_image(temp_dir.path(), "big.bin", &[vec![0; 4]]);

    let output = run(&[
        "--data",
        path_arg(&data),
        "--data-addr",
        "0xFFFE",
        path_arg(&code),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("data image"));
}

#[test]
fn help_exits_cleanly() {
    let output = run(&["--help"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Usage: aap-run"));
}

#[test]
fn usage_errors_exit_with_one() {
    let output = run(&["--bogus"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown option"));
}
