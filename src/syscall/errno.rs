//! Linux errno numbers, for the `-errno` result convention (§4.E, §7.1).
//! Numeric values are the generic (non-x86) Linux ABI ones, which RISC-V
//! and ARM64 both use.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum Errno {
    Perm = 1,
    NoEnt = 2,
    Io = 5,
    BadF = 9,
    Again = 11,
    NoMem = 12,
    Access = 13,
    Fault = 14,
    NotDir = 20,
    Invalid = 22,
    NoSys = 38,
    NotEmpty = 39,
}

impl Errno {
    #[must_use]
    pub const fn as_result(self) -> i64 {
        -(self as i64)
    }

    #[must_use]
    pub fn from_io_error(error: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::NotFound => Self::NoEnt,
            ErrorKind::PermissionDenied => Self::Access,
            ErrorKind::AlreadyExists => Self::Invalid,
            ErrorKind::InvalidInput | ErrorKind::InvalidData => Self::Invalid,
            ErrorKind::WouldBlock => Self::Again,
            _ => error
                .raw_os_error()
                .map_or(Self::Io, |code| Self::from_raw(i64::from(code))),
        }
    }

    fn from_raw(raw: i64) -> Self {
        match raw {
            1 => Self::Perm,
            2 => Self::NoEnt,
            9 => Self::BadF,
            11 => Self::Again,
            12 => Self::NoMem,
            13 => Self::Access,
            14 => Self::Fault,
            20 => Self::NotDir,
            39 => Self::NotEmpty,
            _ => Self::Io,
        }
    }
}

/// Converts an I/O result into the syscall result convention: the
/// non-negative byte count/value on success, `-errno` on failure.
pub fn result_from_io<T>(result: std::io::Result<T>, on_ok: impl FnOnce(T) -> i64) -> i64 {
    match result {
        Ok(value) => on_ok(value),
        Err(error) => Errno::from_io_error(&error).as_result(),
    }
}
