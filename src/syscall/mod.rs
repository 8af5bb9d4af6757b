//! Linux syscall dispatch (§4.E). Triggered by `ECALL`; reads the number
//! and up to six arguments from the guest's integer registers and writes
//! the `-errno`-convention result back into `a0`.
//!
//! Grounded on `original_source/rvos.cxx`'s giant `switch` over
//! `cpu.regs[REG_SYSCALL]`, restructured as one function per syscall
//! family rather than a single match arm per number, since that's how the
//! teacher's own dispatch tables (e.g. `user/src/os/syscalls.rs`) read.

pub mod errno;
pub mod numbers;
pub mod stat;
pub mod termios;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::elf::Target;
use crate::emulator::Emulator;
use crate::error::EmulatorFault;
use errno::Errno;

const O_DIRECTORY: i32 = 0o200_000;
const O_CREAT: i32 = 0o100;
const O_TRUNC: i32 = 0o1000;
const O_APPEND: i32 = 0o2000;
const O_WRONLY: i32 = 1;
const O_RDWR: i32 = 2;

const MAP_ANONYMOUS: i64 = 0x20;
const MREMAP_MAYMOVE: i64 = 1;

const FUTEX_CMD_MASK: i64 = 0x7f;
const FUTEX_WAIT: i64 = 0;
const FUTEX_WAKE: i64 = 1;

const CLOCK_REALTIME: i64 = 0;

/// What the instruction loop should do after a syscall returns.
pub enum DispatchResult {
    Continue,
    Exit(i32),
}

struct DirListing {
    entries: Vec<(String, u64, u8)>,
    cursor: usize,
}

enum OpenFile {
    Std(RawFd),
    Regular(File),
    Dir(DirListing),
}

/// Per-process state the dispatcher owns: open files, the emulated
/// working directory, and the trace/ISA-identity flags a handful of
/// syscalls (`uname`, `-t`/`-i`) need to see.
pub struct ProcessState {
    target: Target,
    cwd: PathBuf,
    open: HashMap<i64, OpenFile>,
    next_fd: i64,
    pub trace_instructions: bool,
}

impl ProcessState {
    #[must_use]
    pub fn new(target: Target) -> Self {
        let mut open = HashMap::new();
        open.insert(0, OpenFile::Std(0));
        open.insert(1, OpenFile::Std(1));
        open.insert(2, OpenFile::Std(2));
        Self {
            target,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            open,
            next_fd: 3,
            trace_instructions: false,
        }
    }
}

/// Reads the syscall number and arguments, performs it, and writes the
/// result back into `a0`. Returns the outcome for the run loop.
pub fn dispatch(emu: &mut Emulator) -> Result<DispatchResult, EmulatorFault> {
    let number = emu.cpu.reg(17) as i64; // a7: same register on both ISAs' calling convention here
    let args = [
        emu.cpu.reg(10) as i64,
        emu.cpu.reg(11) as i64,
        emu.cpu.reg(12) as i64,
        emu.cpu.reg(13) as i64,
        emu.cpu.reg(14) as i64,
        emu.cpu.reg(15) as i64,
    ];

    let (result, outcome) = perform(emu, number, args)?;

    if emu.state.trace_enabled {
        emu.sink.syscall(syscall_name(number), args, result);
    }
    emu.cpu.set_reg(10, result as u64);
    Ok(outcome)
}

fn syscall_name(number: i64) -> &'static str {
    use numbers::*;
    match number {
        EXIT => "exit",
        EXIT_GROUP => "exit_group",
        TGKILL => "tgkill",
        BRK => "brk",
        MMAP => "mmap",
        MUNMAP => "munmap",
        MREMAP => "mremap",
        READ => "read",
        WRITE => "write",
        WRITEV => "writev",
        OPENAT => "openat",
        CLOSE => "close",
        GETDENTS64 => "getdents64",
        private::PRINT_TEXT => "rvos_print_text",
        private::EXIT => "rvos_exit",
        _ => "syscall",
    }
}

#[allow(clippy::too_many_lines)]
fn perform(
    emu: &mut Emulator,
    number: i64,
    args: [i64; 6],
) -> Result<(i64, DispatchResult), EmulatorFault> {
    use numbers::*;

    match number {
        EXIT | EXIT_GROUP | TGKILL | private::EXIT => {
            return Ok((0, DispatchResult::Exit(args[0] as i32)));
        }

        GETPID | GETTID => return Ok((1, DispatchResult::Continue)),
        GETUID | GETEUID | GETGID | GETEGID => return Ok((1000, DispatchResult::Continue)),
        PRCTL | SCHED_SETAFFINITY | SCHED_GETAFFINITY | SCHED_YIELD | SET_TID_ADDRESS
        | SET_ROBUST_LIST | RSEQ | SIGALTSTACK | RT_SIGACTION | RT_SIGPROCMASK
        | RISCV_FLUSH_ICACHE | MPROTECT | MADVISE | FDATASYNC => {
            return Ok((0, DispatchResult::Continue))
        }
        CLONE => return Ok((Errno::Access.as_result(), DispatchResult::Continue)),

        BRK => return Ok((sys_brk(emu, args[0] as u64) as i64, DispatchResult::Continue)),
        MMAP => return Ok((sys_mmap(emu, args), DispatchResult::Continue)),
        MUNMAP => {
            let ok = emu.mmap.free(args[0] as u64, args[1] as u64);
            let value = if ok { 0 } else { Errno::Invalid.as_result() };
            return Ok((value, DispatchResult::Continue));
        }
        MREMAP => {
            let result = emu.mmap.resize(
                &mut emu.image,
                args[0] as u64,
                args[1] as u64,
                args[2] as u64,
                args[3] & MREMAP_MAYMOVE != 0,
            );
            let value = if result == 0 { Errno::NoMem.as_result() } else { result as i64 };
            return Ok((value, DispatchResult::Continue));
        }

        READ => return Ok((sys_read(emu, args)?, DispatchResult::Continue)),
        WRITE => return Ok((sys_write(emu, args)?, DispatchResult::Continue)),
        WRITEV => return Ok((sys_writev(emu, args)?, DispatchResult::Continue)),
        OPENAT => return Ok((sys_openat(emu, args)?, DispatchResult::Continue)),
        CLOSE => return Ok((sys_close(emu, args[0]), DispatchResult::Continue)),
        LSEEK => return Ok((sys_lseek(emu, args), DispatchResult::Continue)),
        FSTAT | NEWFSTATAT | STATX => return Ok((sys_stat(emu, number, args)?, DispatchResult::Continue)),
        GETDENTS64 => return Ok((sys_getdents64(emu, args)?, DispatchResult::Continue)),
        IOCTL => return Ok((sys_ioctl(emu, args)?, DispatchResult::Continue)),
        GETCWD => return Ok((sys_getcwd(emu, args)?, DispatchResult::Continue)),
        CHDIR => {
            let path = read_c_string(emu, args[0] as u64)?;
            let result = std::env::set_current_dir(&path);
            return Ok((errno::result_from_io(result, |()| 0), DispatchResult::Continue));
        }
        FACCESSAT => {
            let path = resolve_path(emu, args[0], args[1] as u64)?;
            let value = if path.exists() { 0 } else { Errno::NoEnt.as_result() };
            return Ok((value, DispatchResult::Continue));
        }
        MKDIRAT => {
            let path = resolve_path(emu, args[0], args[1] as u64)?;
            return Ok((
                errno::result_from_io(fs::create_dir(path), |()| 0),
                DispatchResult::Continue,
            ));
        }
        UNLINKAT => {
            let path = resolve_path(emu, args[0], args[1] as u64)?;
            let result = if path.is_dir() {
                fs::remove_dir(&path)
            } else {
                fs::remove_file(&path)
            };
            return Ok((errno::result_from_io(result, |()| 0), DispatchResult::Continue));
        }
        RENAMEAT | RENAMEAT2 => {
            let old = resolve_path(emu, args[0], args[1] as u64)?;
            let new = resolve_path(emu, args[2], args[3] as u64)?;
            return Ok((
                errno::result_from_io(fs::rename(old, new), |()| 0),
                DispatchResult::Continue,
            ));
        }
        READLINKAT => return Ok((sys_readlinkat(emu, args)?, DispatchResult::Continue)),

        CLOCK_GETTIME => return Ok((sys_clock_gettime(emu, args)?, DispatchResult::Continue)),
        GETTIMEOFDAY => return Ok((sys_gettimeofday(emu, args)?, DispatchResult::Continue)),
        TIMES => return Ok((sys_times(emu, args)?, DispatchResult::Continue)),
        NANOSLEEP | CLOCK_NANOSLEEP => {
            return Ok((sys_nanosleep(emu, args)?, DispatchResult::Continue))
        }

        UNAME => return Ok((sys_uname(emu, args)?, DispatchResult::Continue)),
        GETRANDOM => return Ok((sys_getrandom(emu, args)?, DispatchResult::Continue)),
        FUTEX => return Ok((sys_futex(emu, args)?, DispatchResult::Continue)),
        SYSINFO | PRLIMIT64 => return Ok((0, DispatchResult::Continue)),
        PSELECT6 | PPOLL => return Ok((0, DispatchResult::Continue)),

        private::PRINT_TEXT => {
            let text = read_c_string(emu, args[0] as u64)?;
            print!("{text}");
            let _ = std::io::stdout().flush();
            return Ok((0, DispatchResult::Continue));
        }
        private::PRINT_INT64 => {
            print!("{}", args[0]);
            let _ = std::io::stdout().flush();
            return Ok((0, DispatchResult::Continue));
        }
        private::PRINT_DOUBLE => {
            print!("{}", f64::from_bits(args[0] as u64));
            let _ = std::io::stdout().flush();
            return Ok((0, DispatchResult::Continue));
        }
        private::TRACE_INSTRUCTIONS => {
            let previous = emu.process.trace_instructions;
            emu.process.trace_instructions = args[0] != 0;
            return Ok((i64::from(previous), DispatchResult::Continue));
        }
        private::PRINT_CHAR => {
            print!("{}", args[0] as u8 as char);
            let _ = std::io::stdout().flush();
            return Ok((0, DispatchResult::Continue));
        }
        private::RAND => return Ok((rand::random::<i64>(), DispatchResult::Continue)),
        private::GET_DATETIME => {
            let text = format_local_time();
            write_c_string_truncated(emu, args[0] as u64, &text, 80)?;
            return Ok((0, DispatchResult::Continue));
        }

        _ => {
            return Err(EmulatorFault::UnsupportedSyscall {
                number,
                pc: emu.cpu.pc,
            })
        }
    }
}

fn read_c_string(emu: &Emulator, addr: u64) -> Result<String, EmulatorFault> {
    let mut bytes = Vec::new();
    let mut cursor = addr;
    loop {
        let byte = emu.image.read_u8(cursor)?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
        cursor += 1;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_c_string_truncated(emu: &mut Emulator, addr: u64, text: &str, max: usize) -> Result<(), EmulatorFault> {
    let bytes = text.as_bytes();
    let len = bytes.len().min(max.saturating_sub(1));
    emu.image.write_bytes(addr, &bytes[..len])?;
    emu.image.write_u8(addr + len as u64, 0)?;
    Ok(())
}

fn resolve_path(emu: &Emulator, _dirfd: i64, path_addr: u64) -> Result<PathBuf, EmulatorFault> {
    // Real directory-fd-relative opens aren't modeled; every dirfd other
    // than the guest's own working directory resolves relative to it, same
    // as AT_FDCWD.
    let raw = read_c_string(emu, path_addr)?;
    let path = PathBuf::from(raw);
    Ok(if path.is_absolute() {
        path
    } else {
        emu.process.cwd.join(path)
    })
}

fn translate_open_flags(target: Target, flags: i32) -> i32 {
    // O_DIRECT/O_DIRECTORY are swapped between the riscv64/x86_64 and the
    // arm64 numbering (original_source/rvos.cxx's
    // linux_swap_riscv64_arm_dir_open_flags); the host here uses the
    // former, so only an AArch64 guest needs the swap.
    if target != Target::Aarch64 {
        return flags;
    }
    let mut result = flags;
    if flags & 0x4000 != 0 {
        result = (result & !0x4000) | 0x10000;
    }
    if flags & 0x10000 != 0 {
        result = (result & !0x10000) | 0x4000;
    }
    result
}

fn sys_brk(emu: &mut Emulator, ask: u64) -> u64 {
    if ask == 0 {
        return emu.brk_offset;
    }
    if ask >= emu.end_of_data && ask < emu.bottom_of_stack {
        emu.brk_offset = ask;
    }
    emu.brk_offset
}

fn sys_mmap(emu: &mut Emulator, args: [i64; 6]) -> i64 {
    let addr = args[0] as u64;
    let length = args[1] as u64;
    let flags = args[3];
    if addr != 0 || flags & MAP_ANONYMOUS == 0 {
        return Errno::NoMem.as_result();
    }
    let rounded = length.div_ceil(4096) * 4096;
    match emu.mmap.allocate(&mut emu.image, rounded) {
        0 => Errno::NoMem.as_result(),
        mapped => mapped as i64,
    }
}

fn sys_read(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let fd = args[0];
    let addr = args[1] as u64;
    let len = args[2] as usize;
    let mut buf = vec![0u8; len];
    let Some(open) = emu.process.open.get_mut(&fd) else {
        return Ok(Errno::BadF.as_result());
    };
    let result = match open {
        OpenFile::Std(raw) => host_read(*raw, &mut buf),
        OpenFile::Regular(file) => file.read(&mut buf),
        OpenFile::Dir(_) => return Ok(Errno::Invalid.as_result()),
    };
    match result {
        Ok(n) => {
            emu.image.write_bytes(addr, &buf[..n])?;
            Ok(n as i64)
        }
        Err(e) => Ok(Errno::from_io_error(&e).as_result()),
    }
}

fn sys_write(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let fd = args[0];
    let addr = args[1] as u64;
    let len = args[2] as u64;
    let data = emu.image.slice(addr, len)?.to_vec();
    write_to_fd(emu, fd, &data)
}

fn sys_writev(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let fd = args[0];
    let iov_addr = args[1] as u64;
    let iovcnt = args[2] as u64;
    let mut total = 0i64;
    for i in 0..iovcnt {
        let entry = iov_addr + i * 16;
        let base = emu.image.read_u64(entry)?;
        let len = emu.image.read_u64(entry + 8)?;
        let data = emu.image.slice(base, len)?.to_vec();
        let written = write_to_fd(emu, fd, &data)?;
        if written < 0 {
            return Ok(written);
        }
        total += written;
    }
    Ok(total)
}

fn write_to_fd(emu: &mut Emulator, fd: i64, data: &[u8]) -> Result<i64, EmulatorFault> {
    let Some(open) = emu.process.open.get_mut(&fd) else {
        return Ok(Errno::BadF.as_result());
    };
    let result = match open {
        OpenFile::Std(raw) => host_write(*raw, data),
        OpenFile::Regular(file) => file.write(data),
        OpenFile::Dir(_) => return Ok(Errno::Invalid.as_result()),
    };
    Ok(errno::result_from_io(result, |n| n as i64))
}

fn host_read(raw: RawFd, buf: &mut [u8]) -> std::io::Result<usize> {
    let n = unsafe { libc::read(raw, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn host_write(raw: RawFd, buf: &[u8]) -> std::io::Result<usize> {
    let n = unsafe { libc::write(raw, buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn sys_openat(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let path = resolve_path(emu, args[0], args[1] as u64)?;
    let raw_flags = translate_open_flags(emu.process.target, args[2] as i32);

    if raw_flags & O_DIRECTORY != 0 {
        let entries = match fs::read_dir(&path) {
            Ok(iter) => iter,
            Err(e) => return Ok(Errno::from_io_error(&e).as_result()),
        };
        let mut listed = Vec::new();
        for entry in entries.flatten() {
            let kind = entry.file_type().map_or(0, |t| {
                if t.is_dir() {
                    4
                } else if t.is_symlink() {
                    10
                } else {
                    8
                }
            });
            let ino = entry.metadata().map(|m| {
                use std::os::unix::fs::MetadataExt;
                m.ino()
            }).unwrap_or(0);
            listed.push((entry.file_name().to_string_lossy().into_owned(), ino, kind));
        }
        let fd = emu.process.next_fd;
        emu.process.next_fd += 1;
        emu.process.open.insert(fd, OpenFile::Dir(DirListing { entries: listed, cursor: 0 }));
        return Ok(fd);
    }

    let mut options = OpenOptions::new();
    let access = raw_flags & 0x3;
    options.read(access != O_WRONLY);
    options.write(access == O_WRONLY || access == O_RDWR);
    options.create(raw_flags & O_CREAT != 0);
    options.truncate(raw_flags & O_TRUNC != 0);
    options.append(raw_flags & O_APPEND != 0);
    options.mode(args[3] as u32);

    match options.open(&path) {
        Ok(file) => {
            let fd = emu.process.next_fd;
            emu.process.next_fd += 1;
            emu.process.open.insert(fd, OpenFile::Regular(file));
            Ok(fd)
        }
        Err(e) => Ok(Errno::from_io_error(&e).as_result()),
    }
}

fn sys_close(emu: &mut Emulator, fd: i64) -> i64 {
    if fd <= 2 {
        return 0;
    }
    if emu.process.open.remove(&fd).is_some() {
        0
    } else {
        Errno::BadF.as_result()
    }
}

fn sys_lseek(emu: &mut Emulator, args: [i64; 6]) -> i64 {
    use std::io::SeekFrom;
    let Some(OpenFile::Regular(file)) = emu.process.open.get_mut(&args[0]) else {
        return Errno::BadF.as_result();
    };
    let from = match args[2] {
        0 => SeekFrom::Start(args[1] as u64),
        1 => SeekFrom::Current(args[1]),
        2 => SeekFrom::End(args[1]),
        _ => return Errno::Invalid.as_result(),
    };
    errno::result_from_io(file.seek(from), |pos| pos as i64)
}

fn sys_stat(emu: &mut Emulator, number: i64, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    use numbers::{FSTAT, NEWFSTATAT, STATX};
    let (metadata, out_addr) = if number == FSTAT {
        let fd = args[0];
        let Some(open) = emu.process.open.get(&fd) else {
            return Ok(Errno::BadF.as_result());
        };
        let meta = match open {
            OpenFile::Regular(file) => file.metadata(),
            OpenFile::Std(raw) => unsafe_fstat(*raw),
            OpenFile::Dir(_) => return Ok(Errno::Invalid.as_result()),
        };
        (meta, args[1] as u64)
    } else {
        let path = resolve_path(emu, args[0], args[1] as u64)?;
        let addr = if number == NEWFSTATAT { args[2] as u64 } else { args[4] as u64 };
        (fs::metadata(&path), addr)
    };

    let metadata = match metadata {
        Ok(m) => m,
        Err(e) => return Ok(Errno::from_io_error(&e).as_result()),
    };
    let is_tty = number == FSTAT && matches!(emu.process.open.get(&args[0]), Some(OpenFile::Std(_)));
    let s = stat::from_metadata(&metadata, is_tty);
    // statx uses a wider struct; the corpus only probes existence/size, so
    // it reuses the stat fields at the same base offsets rather than the
    // full layout.
    stat::write(&mut emu.image, out_addr, &s)?;
    Ok(0)
}

fn unsafe_fstat(raw: RawFd) -> std::io::Result<std::fs::Metadata> {
    // std has no public "Metadata::from_raw_fd"; go through /proc/self/fd
    // which works for genuine OS file descriptors including stdio.
    fs::metadata(format!("/proc/self/fd/{raw}"))
}

fn sys_getdents64(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let fd = args[0];
    let addr = args[1] as u64;
    let len = args[2] as u64;
    let Some(OpenFile::Dir(listing)) = emu.process.open.get_mut(&fd) else {
        return Ok(Errno::BadF.as_result());
    };
    let mut cursor = addr;
    let end = addr + len;
    let mut offset = 0u64;
    while listing.cursor < listing.entries.len() {
        let (name, ino, kind) = &listing.entries[listing.cursor];
        let record_len = (19 + name.len() + 1).div_ceil(8) * 8;
        if cursor + record_len as u64 > end {
            break;
        }
        offset += 1;
        emu.image.write_u64(cursor, *ino)?;
        emu.image.write_u64(cursor + 8, offset)?;
        emu.image.write_u16(cursor + 16, record_len as u16)?;
        emu.image.write_u8(cursor + 18, *kind)?;
        emu.image.write_bytes(cursor + 19, name.as_bytes())?;
        emu.image.write_u8(cursor + 19 + name.len() as u64, 0)?;
        cursor += record_len as u64;
        listing.cursor += 1;
    }
    Ok((cursor - addr) as i64)
}

fn sys_ioctl(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let fd = args[0];
    let request = args[1] as u64;
    let addr = args[2] as u64;
    let Some(OpenFile::Std(raw)) = emu.process.open.get(&fd) else {
        return Ok(0);
    };
    let raw = *raw;
    match request {
        termios::TCGETS => {
            let mut raw_termios: libc::termios = unsafe { std::mem::zeroed() };
            let result = unsafe { libc::tcgetattr(raw, &mut raw_termios) };
            if result != 0 {
                return Ok(Errno::from_io_error(&std::io::Error::last_os_error()).as_result());
            }
            termios::write(&mut emu.image, addr, &termios::from_host(&raw_termios))?;
            Ok(0)
        }
        termios::TCSETS => {
            let requested = termios::read(&emu.image, addr);
            let mut raw_termios: libc::termios = unsafe { std::mem::zeroed() };
            unsafe { libc::tcgetattr(raw, &mut raw_termios) };
            termios::to_host(&requested, &mut raw_termios);
            let result = unsafe { libc::tcsetattr(raw, libc::TCSANOW, &raw_termios) };
            if result != 0 {
                return Ok(Errno::from_io_error(&std::io::Error::last_os_error()).as_result());
            }
            Ok(0)
        }
        _ => Ok(0),
    }
}

fn sys_getcwd(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let addr = args[0] as u64;
    let size = args[1] as u64;
    let path = emu.process.cwd.as_os_str().as_bytes();
    if path.len() as u64 + 1 > size {
        return Ok(Errno::Invalid.as_result());
    }
    emu.image.write_bytes(addr, path)?;
    emu.image.write_u8(addr + path.len() as u64, 0)?;
    Ok(addr as i64)
}

fn sys_readlinkat(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let path = resolve_path(emu, args[0], args[1] as u64)?;
    let buf_addr = args[2] as u64;
    let buf_size = args[3] as u64;
    match fs::read_link(path) {
        Ok(target) => {
            let bytes = target.as_os_str().as_bytes();
            let n = (bytes.len() as u64).min(buf_size);
            emu.image.write_bytes(buf_addr, &bytes[..n as usize])?;
            Ok(n as i64)
        }
        Err(e) => Ok(Errno::from_io_error(&e).as_result()),
    }
}

fn sys_clock_gettime(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let addr = args[1] as u64;
    let (secs, nanos) = if args[0] == CLOCK_REALTIME {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        (now.as_secs(), now.subsec_nanos())
    } else {
        let elapsed = emu.start_time.elapsed();
        (elapsed.as_secs(), elapsed.subsec_nanos())
    };
    emu.image.write_u64(addr, secs)?;
    emu.image.write_u64(addr + 8, u64::from(nanos))?;
    Ok(0)
}

fn sys_gettimeofday(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let addr = args[0] as u64;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    emu.image.write_u64(addr, now.as_secs())?;
    emu.image.write_u64(addr + 8, u64::from(now.subsec_micros()))?;
    Ok(0)
}

fn sys_times(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    const CLK_TCK: u64 = 100;
    let addr = args[0] as u64;
    let ticks = emu.start_time.elapsed().as_secs_f64() * CLK_TCK as f64;
    let ticks = ticks as u64;
    if addr != 0 {
        emu.image.write_u64(addr, ticks)?;
        emu.image.write_u64(addr + 8, 0)?;
        emu.image.write_u64(addr + 16, 0)?;
        emu.image.write_u64(addr + 24, 0)?;
    }
    Ok(ticks as i64)
}

fn sys_nanosleep(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let addr = args[0] as u64;
    let secs = emu.image.read_u64(addr)?;
    let nanos = emu.image.read_u64(addr + 8)? as u32;
    std::thread::sleep(Duration::new(secs, nanos));
    Ok(0)
}

fn sys_uname(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let addr = args[0] as u64;
    let machine = numbers::uname_machine(emu.process.target);
    let fields = ["syscall", "rvemu", "1.0.0", "1.0.0", machine, "(none)"];
    for (i, field) in fields.iter().enumerate() {
        write_c_string_truncated(emu, addr + (i as u64) * 65, field, 65)?;
    }
    Ok(0)
}

fn sys_getrandom(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let addr = args[0] as u64;
    let len = args[1] as usize;
    let mut buf = vec![0u8; len];
    if getrandom::getrandom(&mut buf).is_err() {
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut buf);
    }
    emu.image.write_bytes(addr, &buf)?;
    Ok(len as i64)
}

fn sys_futex(emu: &mut Emulator, args: [i64; 6]) -> Result<i64, EmulatorFault> {
    let addr = args[0] as u64;
    let op = args[1] & FUTEX_CMD_MASK;
    match op {
        FUTEX_WAIT => {
            let expected = args[2] as u32;
            let actual = emu.image.read_u32(addr)?;
            if actual != expected {
                Ok(Errno::Again.as_result())
            } else {
                Ok(0)
            }
        }
        FUTEX_WAKE => Ok(0),
        _ => Ok(0),
    }
}

fn format_local_time() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let millis = now.subsec_millis();
    let local = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    format!(
        "{:02}:{:02}:{:02}.{millis:03}",
        local.hour(),
        local.minute(),
        local.second()
    )
}
