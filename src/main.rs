//! Binary entry point: parses the command line, loads the guest ELF, and
//! runs it to completion (§4.F, §6).

use std::fs;
use std::process::ExitCode;
use std::time::Instant;

use rvemu::cli::Cli;
use rvemu::elf::{self, LoadConfig};
use rvemu::{Emulator, RunOutcome};

const MIB: u64 = 1024 * 1024;

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("usage: emu [flags] <elf> [guest args...]\n{err}");
            return ExitCode::FAILURE;
        }
    };

    let bytes = match fs::read(&cli.elf_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("emu: can't read {}: {err}", cli.elf_path);
            return ExitCode::FAILURE;
        }
    };

    if cli.dump_elf {
        return match elf::dump::dump(&bytes, cli.dump_symbols) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("emu: {err}");
                ExitCode::FAILURE
            }
        };
    }

    let config = LoadConfig {
        brk_commit: u64::from(cli.brk_mib) * MIB,
        mmap_commit: u64::from(cli.mmap_mib) * MIB,
    };
    let mut argv = vec![cli.elf_path.clone()];
    argv.extend(cli.guest_args.iter().cloned());

    let loaded = match elf::load(&bytes, &argv, &[], config) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("emu: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut emulator = Emulator::from_loaded(loaded);
    if cli.trace {
        emulator.enable_trace(cli.trace_instructions);
    }

    let started = Instant::now();
    let outcome = emulator.run(None);
    let elapsed = started.elapsed();

    let exit_code = match outcome {
        Ok(RunOutcome::Exited(status)) => status,
        Ok(RunOutcome::Stopped) => 0,
        Err(err) => {
            eprintln!("emu: {err}");
            130
        }
    };

    if cli.print_perf {
        let cycles = emulator.cpu.cycle;
        let millis = elapsed.as_secs_f64() * 1000.0;
        let mhz = if elapsed.as_secs_f64() > 0.0 {
            cycles as f64 / elapsed.as_secs_f64() / 1_000_000.0
        } else {
            0.0
        };
        println!("{millis:.3} ms, {cycles} cycles, {mhz:.3} effective MHz, exit code {exit_code}");
    }

    ExitCode::from(exit_code.rem_euclid(256) as u8)
}
