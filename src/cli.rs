//! Command-line parsing (§6 "CLI"). `emu [flags] <elf> [guest args…]`.
//!
//! The flags this program takes (`-h:N`, `-m:N`, and the rest) use a
//! colon separator and an open-ended trailing passthrough for the guest's
//! own argv, neither of which `clap`'s derive macro models well, so this
//! module parses the argument vector by hand, the way
//! `original_source/rvos.cxx`'s `argc`/`argv` loop does.

use std::fmt;

/// Parsed command line: everything the loader and run loop need to decide
/// what to do before touching the guest ELF.
#[derive(Debug, Clone)]
pub struct Cli {
    pub dump_elf: bool,
    pub dump_symbols: bool,
    pub brk_mib: u32,
    pub mmap_mib: u32,
    pub trace: bool,
    pub trace_instructions: bool,
    pub print_perf: bool,
    pub elf_path: String,
    pub guest_args: Vec<String>,
}

#[derive(Debug)]
pub struct UsageError(pub String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UsageError {}

const MAX_REGION_MIB: u32 = 1024;

impl Cli {
    /// Parses `args` (excluding the program name, i.e. `env::args().skip(1)`).
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, UsageError> {
        let mut dump_elf = false;
        let mut dump_symbols = false;
        let mut brk_mib = 40;
        let mut mmap_mib = 40;
        let mut trace = false;
        let mut trace_instructions = false;
        let mut print_perf = false;
        let mut elf_path = None;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            if elf_path.is_some() {
                // First non-flag argument after the ELF path starts the
                // guest's own argv; the rest of the command line belongs
                // to it.
                let mut guest_args = vec![arg];
                guest_args.extend(iter);
                return Ok(Self {
                    dump_elf,
                    dump_symbols,
                    brk_mib,
                    mmap_mib,
                    trace,
                    trace_instructions,
                    print_perf,
                    elf_path: elf_path.expect("checked above"),
                    guest_args,
                });
            }

            if let Some(value) = arg.strip_prefix("-h:") {
                brk_mib = parse_region(value, "-h")?;
                continue;
            }
            if let Some(value) = arg.strip_prefix("-m:") {
                mmap_mib = parse_region(value, "-m")?;
                continue;
            }
            match arg.as_str() {
                "-e" => dump_elf = true,
                "-v" => dump_symbols = true,
                "-t" => trace = true,
                "-i" => trace_instructions = true,
                "-p" => print_perf = true,
                _ if arg.starts_with('-') => {
                    return Err(UsageError(format!("unrecognized flag {arg}")));
                }
                _ => elf_path = Some(arg),
            }
        }

        if trace_instructions && !trace {
            return Err(UsageError("-i requires -t".to_owned()));
        }
        let elf_path = elf_path.ok_or_else(|| UsageError("missing elf executable".to_owned()))?;
        Ok(Self {
            dump_elf,
            dump_symbols,
            brk_mib,
            mmap_mib,
            trace,
            trace_instructions,
            print_perf,
            elf_path,
            guest_args: Vec::new(),
        })
    }
}

fn parse_region(value: &str, flag: &str) -> Result<u32, UsageError> {
    let mib: u32 = value
        .parse()
        .map_err(|_| UsageError(format!("{flag} argument must be a number")))?;
    if mib > MAX_REGION_MIB {
        return Err(UsageError(format!("{flag} argument must be 0..{MAX_REGION_MIB}")));
    }
    Ok(mib)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn parses_region_flags() {
        let cli = Cli::parse(strs(&["-h:64", "-m:128", "prog.elf"])).unwrap();
        assert_eq!(cli.brk_mib, 64);
        assert_eq!(cli.mmap_mib, 128);
        assert_eq!(cli.elf_path, "prog.elf");
        assert!(cli.guest_args.is_empty());
    }

    #[test]
    fn trailing_arguments_become_guest_argv() {
        let cli = Cli::parse(strs(&["-t", "prog.elf", "-x", "hello"])).unwrap();
        assert!(cli.trace);
        assert_eq!(cli.elf_path, "prog.elf");
        assert_eq!(cli.guest_args, vec!["-x".to_owned(), "hello".to_owned()]);
    }

    #[test]
    fn instruction_trace_requires_trace() {
        assert!(Cli::parse(strs(&["-i", "prog.elf"])).is_err());
    }

    #[test]
    fn rejects_out_of_range_region() {
        assert!(Cli::parse(strs(&["-h:2000", "prog.elf"])).is_err());
    }
}
