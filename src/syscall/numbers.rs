//! Syscall numbers. RV64 and AArch64 share the Linux "generic" syscall
//! table (unlike x86), so one table serves both targets; ground truth for
//! the subset the corpus actually exercises is
//! `original_source/rvos.h`'s `SYS_*` defines, filled out with the
//! standard generic-ABI numbers where the header relied on the host's
//! `<sys/syscall.h>` instead of a local `#define`.

use crate::elf::Target;

pub const GETCWD: i64 = 17;
pub const FACCESSAT: i64 = 48;
pub const CHDIR: i64 = 49;
pub const OPENAT: i64 = 56;
pub const CLOSE: i64 = 57;
pub const GETDENTS64: i64 = 61;
pub const LSEEK: i64 = 62;
pub const READ: i64 = 63;
pub const WRITE: i64 = 64;
pub const WRITEV: i64 = 66;
pub const PSELECT6: i64 = 72;
pub const PPOLL: i64 = 73;
pub const READLINKAT: i64 = 78;
pub const NEWFSTATAT: i64 = 79;
pub const FSTAT: i64 = 80;
pub const FDATASYNC: i64 = 83;
pub const EXIT: i64 = 93;
pub const EXIT_GROUP: i64 = 94;
pub const SET_TID_ADDRESS: i64 = 96;
pub const FUTEX: i64 = 98;
pub const SET_ROBUST_LIST: i64 = 99;
pub const NANOSLEEP: i64 = 101;
pub const CLOCK_GETTIME: i64 = 113;
pub const CLOCK_NANOSLEEP: i64 = 115;
pub const SCHED_SETAFFINITY: i64 = 122;
pub const SCHED_GETAFFINITY: i64 = 123;
pub const SCHED_YIELD: i64 = 124;
pub const TGKILL: i64 = 131;
pub const SIGALTSTACK: i64 = 132;
pub const RT_SIGACTION: i64 = 134;
pub const RT_SIGPROCMASK: i64 = 135;
pub const TIMES: i64 = 153;
pub const UNAME: i64 = 160;
pub const PRCTL: i64 = 167;
pub const GETTIMEOFDAY: i64 = 169;
pub const GETPID: i64 = 172;
pub const GETUID: i64 = 174;
pub const GETEUID: i64 = 175;
pub const GETGID: i64 = 176;
pub const GETEGID: i64 = 177;
pub const GETTID: i64 = 178;
pub const SYSINFO: i64 = 179;
pub const RSEQ: i64 = 293;
pub const BRK: i64 = 214;
pub const MUNMAP: i64 = 215;
pub const MREMAP: i64 = 216;
pub const CLONE: i64 = 220;
pub const MMAP: i64 = 222;
pub const MPROTECT: i64 = 226;
pub const MADVISE: i64 = 233;
pub const RENAMEAT: i64 = 38;
pub const UNLINKAT: i64 = 35;
pub const MKDIRAT: i64 = 34;
pub const IOCTL: i64 = 29;
pub const RISCV_FLUSH_ICACHE: i64 = 259;
pub const PRLIMIT64: i64 = 261;
pub const RENAMEAT2: i64 = 276;
pub const GETRANDOM: i64 = 278;
pub const STATX: i64 = 291;

/// Private, emulator-only syscalls (`original_source/rvos.h`'s
/// `rvos_sys_*` range), numbered exactly as the reference so the test
/// programs built against them keep working unmodified.
pub mod private {
    pub const RAND: i64 = 0x2000;
    pub const PRINT_DOUBLE: i64 = 0x2001;
    pub const TRACE_INSTRUCTIONS: i64 = 0x2002;
    pub const EXIT: i64 = 0x2003;
    pub const PRINT_TEXT: i64 = 0x2004;
    pub const GET_DATETIME: i64 = 0x2005;
    pub const PRINT_INT64: i64 = 0x2006;
    pub const PRINT_CHAR: i64 = 0x2007;
}

/// The integer register carrying the syscall number: `a7` on RISC-V
/// (`x17`), `x8` on ARM64.
#[must_use]
pub const fn syscall_number_register(target: Target) -> u32 {
    match target {
        Target::RiscV64 => 17,
        Target::Aarch64 => 8,
    }
}

#[must_use]
pub const fn uname_machine(target: Target) -> &'static str {
    match target {
        Target::RiscV64 => "riscv64",
        Target::Aarch64 => "aarch64",
    }
}
