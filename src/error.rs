//! Top-level error types: guest-visible syscall failures stay out of this
//! module entirely (they're plain `i64` negative-errno values, per §4.E's
//! result convention); this module is only for the emulator-fatal path of
//! §7.2, which terminates the process with a diagnostic dump.

use derive_more::{Display, Error};

use crate::memory::OutOfRange;

/// An unrecoverable condition: out-of-range memory, an unknown opcode, a
/// stack pointer that drifted out of bounds or lost 16-byte alignment, or a
/// syscall with no stub. The dump printed alongside this (PC + nearest
/// symbol, all integer registers, host/target id) is assembled by the
/// caller from [`crate::Emulator`] state at the point the fault is raised.
#[derive(Debug, Display, Error)]
pub enum EmulatorFault {
    #[display(fmt = "memory fault: {_0}")]
    Memory(OutOfRange),
    #[display(fmt = "illegal or unimplemented instruction {raw:#010x} at pc {pc:#x}")]
    IllegalInstruction { pc: u64, raw: u32 },
    #[display(fmt = "unsupported syscall number {number} (pc {pc:#x})")]
    UnsupportedSyscall { number: i64, pc: u64 },
    #[display(fmt = "stack pointer {sp:#x} drifted outside [{low:#x}, {high:#x})")]
    StackOutOfBounds { sp: u64, low: u64, high: u64 },
    #[display(fmt = "stack pointer {sp:#x} is not 16-byte aligned")]
    Misaligned { sp: u64 },
}

impl From<OutOfRange> for EmulatorFault {
    fn from(value: OutOfRange) -> Self {
        Self::Memory(value)
    }
}

/// The guest's requested exit status, from `exit`/`exit_group`/`tgkill`, or
/// an external stop request with no particular status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Stopped,
}
