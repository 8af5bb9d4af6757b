//! `struct stat` marshaling into the Linux/RV64 128-byte layout (§4.E).
//! Field offsets per `original_source/rvos.cxx`'s `stat_linux_syscall`.

use crate::memory::Image;
use crate::memory::OutOfRange;

pub const SIZE: u64 = 128;

/// A host-independent view of the fields the guest cares about; built
/// from `std::fs::Metadata` by the caller and written out in the exact
/// byte layout Linux RISC-V/ARM64 C runtimes expect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u32,
    pub blocks: u64,
    pub atime_sec: i64,
    pub atime_nsec: i64,
    pub mtime_sec: i64,
    pub mtime_nsec: i64,
    pub ctime_sec: i64,
    pub ctime_nsec: i64,
}

pub fn write(image: &mut Image, addr: u64, stat: &Stat) -> Result<(), OutOfRange> {
    image.write_u64(addr, stat.dev)?;
    image.write_u64(addr + 8, stat.ino)?;
    image.write_u32(addr + 16, stat.mode)?;
    image.write_u32(addr + 20, stat.nlink)?;
    image.write_u32(addr + 24, stat.uid)?;
    image.write_u32(addr + 28, stat.gid)?;
    image.write_u64(addr + 32, stat.rdev)?;
    image.write_u64(addr + 40, 0)?; // st_mystery_spot padding, per the reference layout
    image.write_u64(addr + 48, stat.size)?;
    image.write_u32(addr + 56, stat.blksize)?;
    image.write_u64(addr + 64, stat.blocks)?;
    image.write_u64(addr + 72, stat.atime_sec as u64)?;
    image.write_u64(addr + 80, stat.atime_nsec as u64)?;
    image.write_u64(addr + 88, stat.mtime_sec as u64)?;
    image.write_u64(addr + 96, stat.mtime_nsec as u64)?;
    image.write_u64(addr + 104, stat.ctime_sec as u64)?;
    image.write_u64(addr + 112, stat.ctime_nsec as u64)?;
    Ok(())
}

const S_IFREG: u32 = 0o100_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFCHR: u32 = 0o020_000;

#[must_use]
pub fn from_metadata(metadata: &std::fs::Metadata, is_tty: bool) -> Stat {
    use std::os::unix::fs::MetadataExt;

    let mode_kind = if is_tty {
        S_IFCHR
    } else if metadata.is_dir() {
        S_IFDIR
    } else {
        S_IFREG
    };
    Stat {
        dev: metadata.dev(),
        ino: metadata.ino(),
        mode: mode_kind | (metadata.mode() & 0o7777),
        nlink: metadata.nlink() as u32,
        uid: 1000,
        gid: 1000,
        rdev: metadata.rdev(),
        size: metadata.size(),
        blksize: metadata.blksize() as u32,
        blocks: metadata.blocks(),
        atime_sec: metadata.atime(),
        atime_nsec: metadata.atime_nsec(),
        mtime_sec: metadata.mtime(),
        mtime_nsec: metadata.mtime_nsec(),
        ctime_sec: metadata.ctime(),
        ctime_nsec: metadata.ctime_nsec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_expected_field_offsets() {
        let mut image = Image::new(0x1000, 256);
        let stat = Stat {
            dev: 1,
            ino: 2,
            mode: S_IFREG | 0o644,
            nlink: 1,
            uid: 1000,
            gid: 1000,
            size: 42,
            ..Stat::default()
        };
        write(&mut image, 0x1000, &stat).unwrap();
        assert_eq!(image.read_u64(0x1000).unwrap(), 1);
        assert_eq!(image.read_u64(0x1008).unwrap(), 2);
        assert_eq!(image.read_u64(0x1000 + 48).unwrap(), 42);
    }
}
