//! Stack-top layout (§3): argc/argv/envp/auxv, placed high-to-low so a C
//! runtime's `_start` can consume them exactly as Linux's `execve` would
//! leave them. Ground truth for the auxv entries and `OS=`/`TZ=` env
//! synthesis: `original_source/rvos.cxx` (`AuxProcessStart`, lines ~3090-3160).

use rand::RngCore;

use crate::memory::Image;

use super::Target;

const AT_NULL: u64 = 0;
const AT_PAGESZ: u64 = 6;
const AT_UID: u64 = 11;
const AT_EGID: u64 = 14;
const AT_GID: u64 = 13;
const AT_EUID: u64 = 22;
const AT_HWCAP: u64 = 16;
const AT_RANDOM: u64 = 25;
const AT_HWCAP2: u64 = 26;

const PAGE_SIZE: u64 = 4096;
const FIXED_UID: u64 = 1000;

fn hwcap(target: Target) -> u64 {
    match target {
        // fp + atomics + cpuid bits, matching the reference loader's ARM64
        // constant; RISC-V has no equivalent HWCAP bitmap in wide use, so 0.
        Target::Aarch64 => 0xa01,
        Target::RiscV64 => 0,
    }
}

/// Builds the guest's envp: the synthesized `OS=` entry plus whatever the
/// caller supplies (typically `TZ=` when the host has no IANA zoneinfo).
#[must_use]
pub fn synthesize_env(target: Target, extra: &[String]) -> Vec<String> {
    let os_name = match target {
        Target::RiscV64 => "OS=RVOS",
        Target::Aarch64 => "OS=ARMOS",
    };
    let mut env = vec![os_name.to_owned()];
    env.extend(extra.iter().cloned());
    env
}

/// Writes argv/envp strings into the args-commit slab starting at
/// `strings_base`, then writes the auxv/envp/argv/argc structure at the
/// top of the stack region (`stack_top`, exclusive). Returns the initial
/// stack pointer (the address of the `argc` cell).
#[must_use]
pub fn write_stack_top(
    image: &mut Image,
    strings_base: u64,
    stack_top: u64,
    argv: &[String],
    envp: &[String],
    target: Target,
) -> u64 {
    let mut string_cursor = strings_base;
    let mut argv_addrs = Vec::with_capacity(argv.len());
    for arg in argv {
        argv_addrs.push(string_cursor);
        string_cursor += write_c_string(image, string_cursor, arg);
    }
    let mut envp_addrs = Vec::with_capacity(envp.len());
    for var in envp {
        envp_addrs.push(string_cursor);
        string_cursor += write_c_string(image, string_cursor, var);
    }

    let mut random = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut random);
    let random_addr = stack_top - 16;
    image
        .write_bytes(random_addr, &random)
        .expect("stack region is within the image");

    let auxv: [(u64, u64); 8] = [
        (AT_RANDOM, random_addr),
        (AT_PAGESZ, PAGE_SIZE),
        (AT_HWCAP, hwcap(target)),
        (AT_HWCAP2, 0),
        (AT_UID, FIXED_UID),
        (AT_EUID, FIXED_UID),
        (AT_GID, FIXED_UID),
        (AT_EGID, FIXED_UID),
    ];

    // Total size of argc + argv ptrs (+ terminator) + envp ptrs (+
    // terminator) + auxv pairs (+ AT_NULL terminator), all 8-byte cells.
    let cell_count = 1
        + argv_addrs.len()
        + 1
        + envp_addrs.len()
        + 1
        + 2 * (auxv.len() + 1);
    let mut cursor = random_addr - (cell_count as u64) * 8;
    cursor &= !0xF; // 16-byte align

    let sp = cursor;
    write_u64_advancing(image, &mut cursor, argv_addrs.len() as u64);
    for addr in &argv_addrs {
        write_u64_advancing(image, &mut cursor, *addr);
    }
    write_u64_advancing(image, &mut cursor, 0);
    for addr in &envp_addrs {
        write_u64_advancing(image, &mut cursor, *addr);
    }
    write_u64_advancing(image, &mut cursor, 0);
    for (kind, value) in auxv {
        write_u64_advancing(image, &mut cursor, kind);
        write_u64_advancing(image, &mut cursor, value);
    }
    write_u64_advancing(image, &mut cursor, AT_NULL);
    write_u64_advancing(image, &mut cursor, 0);

    sp
}

fn write_c_string(image: &mut Image, addr: u64, text: &str) -> u64 {
    let bytes = text.as_bytes();
    image
        .write_bytes(addr, bytes)
        .expect("args-commit slab is sized generously for typical argv/envp");
    image.write_u8(addr + bytes.len() as u64, 0).expect("slab bounds");
    bytes.len() as u64 + 1
}

fn write_u64_advancing(image: &mut Image, cursor: &mut u64, value: u64) {
    image.write_u64(*cursor, value).expect("stack region is within the image");
    *cursor += 8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_layout_round_trips_argc_argv_envp() {
        let base = 0x1_0000;
        let mut image = Image::new(base, 64 * 1024);
        let argv = vec!["prog".to_owned(), "arg1".to_owned()];
        let envp = vec!["OS=RVOS".to_owned()];
        let sp = write_stack_top(&mut image, base + 1024, base + 48 * 1024, &argv, &envp, Target::RiscV64);

        assert_eq!(sp % 16, 0);
        let argc = image.read_u64(sp).unwrap();
        assert_eq!(argc, 2);
        let argv0_ptr = image.read_u64(sp + 8).unwrap();
        let argv1_ptr = image.read_u64(sp + 16).unwrap();
        let argv_term = image.read_u64(sp + 24).unwrap();
        assert_eq!(argv_term, 0);

        let mut bytes = Vec::new();
        let mut addr = argv0_ptr;
        loop {
            let byte = image.read_u8(addr).unwrap();
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            addr += 1;
        }
        assert_eq!(String::from_utf8(bytes).unwrap(), "prog");

        let mut bytes = Vec::new();
        let mut addr = argv1_ptr;
        loop {
            let byte = image.read_u8(addr).unwrap();
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            addr += 1;
        }
        assert_eq!(String::from_utf8(bytes).unwrap(), "arg1");
    }
}
