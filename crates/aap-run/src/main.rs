//! CLI entry point for the AAP simulator runner.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use aap_sim_core::{
    InvalidInstructionPolicy, LoadError, RunOutcome, SimConfig, Simulator, StepStatus,
    UnknownOpcodePolicy,
};
#[cfg(test)]
use tempfile as _;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: aap-run [options] <code.bin>

Options:
  --code-addr <n>     Byte address for the code image (default 0)
  --data <file>       Raw data image
  --data-addr <n>     Byte address for the data image (default 0)
  --entry <n>         Initial word PC (default 0)
  --max-steps <n>     Stop after n instructions
  --resync            Skip undecodable instructions
  --abort-on-unknown  Panic on unimplemented opcodes
  -h, --help          Show this help message

Numbers accept decimal or 0x-prefixed hex.

Exit status:
  quit                low byte of the program's exit code
  invalid instruction 0x84
  breakpoint          0x85
  trap                0x86
  step budget         0x87
  usage or I/O error  1
";

const EXIT_INVALID_INSTRUCTION: i32 = 0x84;
const EXIT_BREAKPOINT: i32 = 0x85;
const EXIT_TRAP: i32 = 0x86;
const EXIT_BUDGET: i32 = 0x87;

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    code: PathBuf,
    code_addr: u32,
    data: Option<PathBuf>,
    data_addr: u32,
    entry: u16,
    max_steps: Option<u64>,
    resync: bool,
    abort_on_unknown: bool,
}

impl RunArgs {
    const fn config(&self) -> SimConfig {
        SimConfig {
            unknown_opcode: if self.abort_on_unknown {
                UnknownOpcodePolicy::Abort
            } else {
                UnknownOpcodePolicy::Trap
            },
            invalid_instruction: if self.resync {
                InvalidInstructionPolicy::Resync
            } else {
                InvalidInstructionPolicy::Stop
            },
            max_steps: self.max_steps,
        }
    }
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{what} image: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: LoadError,
    },
}

fn parse_number(flag: &str, value: Option<OsString>) -> Result<u64, String> {
    let value = value.ok_or_else(|| format!("missing value for {flag}"))?;
    let text = value.to_string_lossy();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid number for {flag}: {text}"))
}

fn parse_bounded<T: TryFrom<u64>>(flag: &str, value: Option<OsString>) -> Result<T, String> {
    let number = parse_number(flag, value)?;
    T::try_from(number).map_err(|_| format!("value for {flag} is out of range: {number:#x}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut code: Option<PathBuf> = None;
    let mut code_addr = 0;
    let mut data: Option<PathBuf> = None;
    let mut data_addr = 0;
    let mut entry = 0;
    let mut max_steps = None;
    let mut resync = false;
    let mut abort_on_unknown = false;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseResult::Help),
            "--code-addr" => code_addr = parse_bounded(&flag, args.next())?,
            "--data-addr" => data_addr = parse_bounded(&flag, args.next())?,
            "--entry" => entry = parse_bounded(&flag, args.next())?,
            "--max-steps" => max_steps = Some(parse_number(&flag, args.next())?),
            "--data" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --data".to_string())?;
                data = Some(PathBuf::from(value));
            }
            "--resync" => resync = true,
            "--abort-on-unknown" => abort_on_unknown = true,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            _ => {
                if code.is_some() {
                    return Err("multiple code images provided".to_string());
                }
                code = Some(PathBuf::from(arg));
            }
        }
    }

    let code = code.ok_or_else(|| "missing code image path".to_string())?;
    Ok(ParseResult::Run(RunArgs {
        code,
        code_addr,
        data,
        data_addr,
        entry,
        max_steps,
        resync,
        abort_on_unknown,
    }))
}

fn read_image(path: &Path) -> Result<Vec<u8>, RunError> {
    fs::read(path).map_err(|source| RunError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn prepare(args: &RunArgs) -> Result<Simulator, RunError> {
    let mut sim = Simulator::new(args.config());

    let code = read_image(&args.code)?;
    sim.load_code_section(&code, args.code_addr)
        .map_err(|source| RunError::Load {
            what: "code",
            source,
        })?;

    if let Some(path) = &args.data {
        let data = read_image(path)?;
        sim.load_data_section(&data, args.data_addr)
            .map_err(|source| RunError::Load {
                what: "data",
                source,
            })?;
    }

    sim.set_pc(args.entry);
    tracing::debug!(entry = args.entry, config = ?sim.config(), "starting run");
    Ok(sim)
}

fn exit_status(outcome: RunOutcome, exit_code: u16) -> i32 {
    match outcome.status {
        StepStatus::Quit => i32::from(exit_code) & 0xFF,
        StepStatus::Breakpoint => EXIT_BREAKPOINT,
        StepStatus::Trap => EXIT_TRAP,
        StepStatus::InvalidInstruction => EXIT_INVALID_INSTRUCTION,
        StepStatus::Ok => EXIT_BUDGET,
    }
}

fn report(sim: &Simulator, outcome: RunOutcome) {
    if outcome.budget_exhausted() {
        eprintln!(
            "aap-run: step budget exhausted after {} steps at pc {:#06x}",
            outcome.steps,
            sim.pc()
        );
    } else if outcome.status == StepStatus::Quit {
        eprintln!(
            "aap-run: quit with exit code {:#06x} after {} steps",
            sim.exit_code(),
            outcome.steps
        );
    } else {
        eprintln!(
            "aap-run: {} at pc {:#06x} after {} steps",
            outcome.status,
            sim.pc(),
            outcome.steps
        );
    }
}

fn run(args: &RunArgs) -> Result<i32, RunError> {
    let mut sim = prepare(args)?;
    let outcome = sim.run_outcome();
    report(&sim, outcome);
    Ok(exit_status(outcome, sim.exit_code()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => match run(&args) {
            Ok(code) => code,
            Err(error) => {
                eprintln!("error: {error}");
                1
            }
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ParseResult, String> {
        parse_args(args.iter().map(OsString::from))
    }

    fn parse_run(args: &[&str]) -> RunArgs {
        match parse(args).expect("valid arguments should parse") {
            ParseResult::Run(args) => args,
            ParseResult::Help => panic!("expected run arguments"),
        }
    }

    #[test]
    fn parses_defaults() {
        assert_eq!(
            parse_run(&["prog.bin"]),
            RunArgs {
                code: PathBuf::from("prog.bin"),
                code_addr: 0,
                data: None,
                data_addr: 0,
                entry: 0,
                max_steps: None,
                resync: false,
                abort_on_unknown: false,
            }
        );
    }

    #[test]
    fn parses_every_option() {
        let args = parse_run(&[
            "--code-addr",
            "0x100",
            "--data",
            "data.bin",
            "--data-addr",
            "512",
            "--entry",
            "0x80",
            "--max-steps",
            "1000",
            "--resync",
            "--abort-on-unknown",
            "prog.bin",
        ]);

        assert_eq!(args.code_addr, 0x100);
        assert_eq!(args.data, Some(PathBuf::from("data.bin")));
        assert_eq!(args.data_addr, 512);
        assert_eq!(args.entry, 0x80);
        assert_eq!(args.max_steps, Some(1000));

        let config = args.config();
        assert_eq!(config.unknown_opcode, UnknownOpcodePolicy::Abort);
        assert_eq!(config.invalid_instruction, InvalidInstructionPolicy::Resync);
        assert_eq!(config.max_steps, Some(1000));
    }

    #[test]
    fn parses_help_flag() {
        assert!(matches!(parse(&["-h"]), Ok(ParseResult::Help)));
        assert!(matches!(parse(&["prog.bin", "--help"]), Ok(ParseResult::Help)));
    }

    #[test]
    fn rejects_missing_code_image() {
        let error = parse(&["--resync"]).expect_err("no image should fail");
        assert!(error.contains("missing code image"));
    }

    #[test]
    fn rejects_unknown_option() {
        let error = parse(&["--fast", "prog.bin"]).expect_err("unknown option should fail");
        assert!(error.contains("unknown option: --fast"));
    }

    #[test]
    fn rejects_second_code_image() {
        let error = parse(&["a.bin", "b.bin"]).expect_err("two images should fail");
        assert!(error.contains("multiple code images"));
    }

    #[test]
    fn rejects_entry_wider_than_pc() {
        let error = parse(&["--entry", "0x10000", "prog.bin"]).expect_err("entry overflows u16");
        assert!(error.contains("out of range"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let error = parse(&["--max-steps", "ten", "prog.bin"]).expect_err("not a number");
        assert!(error.contains("invalid number for --max-steps"));

        let error = parse(&["--code-addr"]).expect_err("value missing");
        assert!(error.contains("missing value for --code-addr"));
    }

    #[test]
    fn exit_status_follows_terminal_status() {
        let outcome = |status| RunOutcome { steps: 3, status };

        assert_eq!(exit_status(outcome(StepStatus::Quit), 0x1234), 0x34);
        assert_eq!(exit_status(outcome(StepStatus::Breakpoint), 0), 0x85);
        assert_eq!(exit_status(outcome(StepStatus::Trap), 0), 0x86);
        assert_eq!(
            exit_status(outcome(StepStatus::InvalidInstruction), 0),
            0x84
        );
        assert_eq!(exit_status(outcome(StepStatus::Ok), 0), 0x87);
    }
}
