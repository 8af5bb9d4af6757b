//! `ioctl(TCGETS/TCSETS)` on the controlling terminal, translated into the
//! Linux RISC-V/ARM64 `struct termios` layout regardless of host OS.
//! Ground truth: `original_source/rvos.cxx`'s `map_termios_*_linux_to_macos`
//! family — on a Linux host the bit values already match, so translation
//! collapses to identity there and only does real work on a BSD-flavored
//! host.

use crate::memory::Image;
use crate::memory::OutOfRange;

pub const TCGETS: u64 = 0x5401;
pub const TCSETS: u64 = 0x5402;

/// The four flag words the guest's `struct termios` carries, in Linux bit
/// definitions. `c_line`/`c_cc` are zeroed; no corpus program inspects
/// them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Termios {
    pub iflag: u32,
    pub oflag: u32,
    pub cflag: u32,
    pub lflag: u32,
}

pub fn write(image: &mut Image, addr: u64, termios: &Termios) -> Result<(), OutOfRange> {
    image.write_u32(addr, termios.iflag)?;
    image.write_u32(addr + 4, termios.oflag)?;
    image.write_u32(addr + 8, termios.cflag)?;
    image.write_u32(addr + 12, termios.lflag)?;
    for i in 0..19 {
        image.write_u8(addr + 16 + i, 0)?;
    }
    Ok(())
}

#[must_use]
pub fn read(image: &Image, addr: u64) -> Termios {
    Termios {
        iflag: image.read_u32(addr).unwrap_or(0),
        oflag: image.read_u32(addr + 4).unwrap_or(0),
        cflag: image.read_u32(addr + 8).unwrap_or(0),
        lflag: image.read_u32(addr + 12).unwrap_or(0),
    }
}

#[cfg(target_os = "linux")]
pub fn from_host(raw: &libc::termios) -> Termios {
    Termios {
        iflag: raw.c_iflag,
        oflag: raw.c_oflag,
        cflag: raw.c_cflag,
        lflag: raw.c_lflag,
    }
}

#[cfg(not(target_os = "linux"))]
pub fn from_host(raw: &libc::termios) -> Termios {
    Termios {
        iflag: map_iflag_to_linux(raw.c_iflag as u32),
        oflag: map_oflag_to_linux(raw.c_oflag as u32),
        cflag: map_cflag_to_linux(raw.c_cflag as u32),
        lflag: map_lflag_to_linux(raw.c_lflag as u32),
    }
}

#[cfg(target_os = "linux")]
pub fn to_host(termios: &Termios, raw: &mut libc::termios) {
    raw.c_iflag = termios.iflag;
    raw.c_oflag = termios.oflag;
    raw.c_cflag = termios.cflag;
    raw.c_lflag = termios.lflag;
}

#[cfg(not(target_os = "linux"))]
pub fn to_host(termios: &Termios, raw: &mut libc::termios) {
    raw.c_iflag = map_iflag_from_linux(termios.iflag) as _;
    raw.c_oflag = map_oflag_from_linux(termios.oflag) as _;
    raw.c_cflag = map_cflag_from_linux(termios.cflag) as _;
    raw.c_lflag = map_lflag_from_linux(termios.lflag) as _;
}

// Linux bit definitions for the handful of flags corpus programs actually
// flip (raw-mode terminals: ICANON, ECHO, ISIG, IXON, ICRNL, OPOST).
#[cfg(not(target_os = "linux"))]
mod linux_bits {
    pub const ICRNL: u32 = 0o000400;
    pub const IXON: u32 = 0o002000;
    pub const OPOST: u32 = 0o000001;
    pub const ICANON: u32 = 0o000002;
    pub const ECHO: u32 = 0o000010;
    pub const ISIG: u32 = 0o000001;
}

#[cfg(not(target_os = "linux"))]
fn map_iflag_to_linux(f: u32) -> u32 {
    let mut r = 0;
    if f & libc::ICRNL as u32 != 0 {
        r |= linux_bits::ICRNL;
    }
    if f & libc::IXON as u32 != 0 {
        r |= linux_bits::IXON;
    }
    r
}

#[cfg(not(target_os = "linux"))]
fn map_iflag_from_linux(f: u32) -> u32 {
    let mut r = 0;
    if f & linux_bits::ICRNL != 0 {
        r |= libc::ICRNL as u32;
    }
    if f & linux_bits::IXON != 0 {
        r |= libc::IXON as u32;
    }
    r
}

#[cfg(not(target_os = "linux"))]
fn map_oflag_to_linux(f: u32) -> u32 {
    if f & libc::OPOST as u32 != 0 {
        linux_bits::OPOST
    } else {
        0
    }
}

#[cfg(not(target_os = "linux"))]
fn map_oflag_from_linux(f: u32) -> u32 {
    if f & linux_bits::OPOST != 0 {
        libc::OPOST as u32
    } else {
        0
    }
}

#[cfg(not(target_os = "linux"))]
fn map_cflag_to_linux(f: u32) -> u32 {
    f
}

#[cfg(not(target_os = "linux"))]
fn map_cflag_from_linux(f: u32) -> u32 {
    f
}

#[cfg(not(target_os = "linux"))]
fn map_lflag_to_linux(f: u32) -> u32 {
    let mut r = 0;
    if f & libc::ICANON as u32 != 0 {
        r |= linux_bits::ICANON;
    }
    if f & libc::ECHO as u32 != 0 {
        r |= linux_bits::ECHO;
    }
    if f & libc::ISIG as u32 != 0 {
        r |= linux_bits::ISIG;
    }
    r
}

#[cfg(not(target_os = "linux"))]
fn map_lflag_from_linux(f: u32) -> u32 {
    let mut r = 0;
    if f & linux_bits::ICANON != 0 {
        r |= libc::ICANON as u32;
    }
    if f & linux_bits::ECHO != 0 {
        r |= libc::ECHO as u32;
    }
    if f & linux_bits::ISIG != 0 {
        r |= libc::ISIG as u32;
    }
    r
}
