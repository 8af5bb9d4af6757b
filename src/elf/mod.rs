//! ELF64 parsing and process-image construction (§4.F). Ground truth for
//! field layout: `original_source/rvos.cxx`'s `ElfHeader64`/
//! `ElfProgramHeader64`/`ElfSymbol64`.

pub mod dump;
pub mod layout;
pub mod symbols;

use derive_more::{Display, Error};

use crate::memory::Image;
use crate::mmap::Arena;
use symbols::SymbolTable;

const EI_MAGIC: u32 = 0x464C_457F;
const ET_EXEC: u16 = 2;
const EM_RISCV: u16 = 243;
const EM_AARCH64: u16 = 183;
const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;

const ARGS_COMMIT: u64 = 1024;
const STACK_COMMIT: u64 = 128 * 1024;
const PAGE_SIZE: u64 = 4096;
pub const DEFAULT_BRK_COMMIT: u64 = 40 * 1024 * 1024;
pub const DEFAULT_MMAP_COMMIT: u64 = 40 * 1024 * 1024;

/// Which decoder/calling convention/`uname -m` string the loaded guest
/// expects. Chosen from `e_machine`; see `numbers::syscall_number_register`
/// and `dispatch`'s machine string for where this fans back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    RiscV64,
    Aarch64,
}

#[derive(Debug, Display, Error)]
pub enum ElfLoadError {
    #[display(fmt = "reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[display(fmt = "not an ELF64 little-endian file (bad magic)")]
    BadMagic,
    #[display(fmt = "not an executable (ET_EXEC) ELF file")]
    NotExecutable,
    #[display(fmt = "unsupported machine type {machine:#x}")]
    UnsupportedMachine { machine: u16 },
    #[display(fmt = "entry point is zero")]
    NullEntry,
    #[display(fmt = "no PT_LOAD segments")]
    NoLoadSegments,
    #[display(fmt = "PT_DYNAMIC segment present; dynamic linking is unsupported")]
    DynamicLinkingUnsupported,
    #[display(fmt = "truncated ELF file")]
    Truncated,
}

#[derive(Debug, Clone, Copy)]
pub struct ElfHeader {
    pub entry: u64,
    pub machine: u16,
    pub program_header_offset: u64,
    pub program_header_entry_size: u16,
    pub program_header_count: u16,
    pub section_header_offset: u64,
    pub section_header_entry_size: u16,
    pub section_header_count: u16,
    pub section_name_index: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgramHeader {
    pub kind: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub file_size: u64,
    pub mem_size: u64,
    pub align: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SectionHeader {
    pub name_offset: u32,
    pub kind: u32,
    pub flags: u64,
    pub address: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub entry_size: u64,
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    bytes
        .get(offset..offset + 2)
        .map(|s| u16::from_le_bytes(s.try_into().unwrap()))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
}

fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    bytes
        .get(offset..offset + 8)
        .map(|s| u64::from_le_bytes(s.try_into().unwrap()))
}

pub fn parse_header(bytes: &[u8]) -> Result<ElfHeader, ElfLoadError> {
    let magic = read_u32(bytes, 0).ok_or(ElfLoadError::Truncated)?;
    if magic != EI_MAGIC {
        return Err(ElfLoadError::BadMagic);
    }
    let kind = read_u16(bytes, 16).ok_or(ElfLoadError::Truncated)?;
    if kind != ET_EXEC {
        return Err(ElfLoadError::NotExecutable);
    }
    let machine = read_u16(bytes, 18).ok_or(ElfLoadError::Truncated)?;
    if machine != EM_RISCV && machine != EM_AARCH64 {
        return Err(ElfLoadError::UnsupportedMachine { machine });
    }
    let entry = read_u64(bytes, 24).ok_or(ElfLoadError::Truncated)?;
    if entry == 0 {
        return Err(ElfLoadError::NullEntry);
    }
    Ok(ElfHeader {
        entry,
        machine,
        program_header_offset: read_u64(bytes, 32).ok_or(ElfLoadError::Truncated)?,
        program_header_entry_size: read_u16(bytes, 54).ok_or(ElfLoadError::Truncated)?,
        program_header_count: read_u16(bytes, 56).ok_or(ElfLoadError::Truncated)?,
        section_header_offset: read_u64(bytes, 40).ok_or(ElfLoadError::Truncated)?,
        section_header_entry_size: read_u16(bytes, 58).ok_or(ElfLoadError::Truncated)?,
        section_header_count: read_u16(bytes, 60).ok_or(ElfLoadError::Truncated)?,
        section_name_index: read_u16(bytes, 62).ok_or(ElfLoadError::Truncated)?,
    })
}

pub fn parse_program_headers(
    bytes: &[u8],
    header: &ElfHeader,
) -> Result<Vec<ProgramHeader>, ElfLoadError> {
    let mut out = Vec::with_capacity(header.program_header_count as usize);
    for i in 0..header.program_header_count as usize {
        let base = header.program_header_offset as usize
            + i * header.program_header_entry_size as usize;
        out.push(ProgramHeader {
            kind: read_u32(bytes, base).ok_or(ElfLoadError::Truncated)?,
            flags: read_u32(bytes, base + 4).ok_or(ElfLoadError::Truncated)?,
            offset: read_u64(bytes, base + 8).ok_or(ElfLoadError::Truncated)?,
            vaddr: read_u64(bytes, base + 16).ok_or(ElfLoadError::Truncated)?,
            paddr: read_u64(bytes, base + 24).ok_or(ElfLoadError::Truncated)?,
            file_size: read_u64(bytes, base + 32).ok_or(ElfLoadError::Truncated)?,
            mem_size: read_u64(bytes, base + 40).ok_or(ElfLoadError::Truncated)?,
            align: read_u64(bytes, base + 56).ok_or(ElfLoadError::Truncated)?,
        });
    }
    Ok(out)
}

pub fn parse_section_headers(
    bytes: &[u8],
    header: &ElfHeader,
) -> Result<Vec<SectionHeader>, ElfLoadError> {
    let mut out = Vec::with_capacity(header.section_header_count as usize);
    for i in 0..header.section_header_count as usize {
        let base = header.section_header_offset as usize
            + i * header.section_header_entry_size as usize;
        out.push(SectionHeader {
            name_offset: read_u32(bytes, base).ok_or(ElfLoadError::Truncated)?,
            kind: read_u32(bytes, base + 4).ok_or(ElfLoadError::Truncated)?,
            flags: read_u64(bytes, base + 8).ok_or(ElfLoadError::Truncated)?,
            address: read_u64(bytes, base + 16).ok_or(ElfLoadError::Truncated)?,
            offset: read_u64(bytes, base + 24).ok_or(ElfLoadError::Truncated)?,
            size: read_u64(bytes, base + 32).ok_or(ElfLoadError::Truncated)?,
            link: read_u32(bytes, base + 40).ok_or(ElfLoadError::Truncated)?,
            info: read_u32(bytes, base + 44).ok_or(ElfLoadError::Truncated)?,
            entry_size: read_u64(bytes, base + 56).ok_or(ElfLoadError::Truncated)?,
        });
    }
    Ok(out)
}

/// Configuration knobs exposed as CLI flags (`-h:N`, `-m:N`).
#[derive(Debug, Clone, Copy)]
pub struct LoadConfig {
    pub brk_commit: u64,
    pub mmap_commit: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            brk_commit: DEFAULT_BRK_COMMIT,
            mmap_commit: DEFAULT_MMAP_COMMIT,
        }
    }
}

/// A fully constructed process image, ready to hand to [`crate::Emulator`].
pub struct Loaded {
    pub image: Image,
    pub mmap: Arena,
    pub entry: u64,
    pub initial_sp: u64,
    pub end_of_data: u64,
    pub bottom_of_stack: u64,
    pub target: Target,
    pub symbols: SymbolTable,
}

/// Parses `bytes` as an ELF64 executable and builds the initial process
/// image (§4.F steps 1-7). `args` is the guest's own argv (argv[0] is the
/// path as invoked); `extra_env` lets the caller add its own variables
/// (e.g. `TZ=`) on top of the synthesized `OS=` entry.
pub fn load(
    bytes: &[u8],
    args: &[String],
    extra_env: &[String],
    config: LoadConfig,
) -> Result<Loaded, ElfLoadError> {
    let header = parse_header(bytes)?;
    let target = if header.machine == EM_RISCV {
        Target::RiscV64
    } else {
        Target::Aarch64
    };
    let program_headers = parse_program_headers(bytes, &header)?;
    if program_headers.iter().any(|ph| ph.kind == PT_DYNAMIC) {
        return Err(ElfLoadError::DynamicLinkingUnsupported);
    }
    let load_segments: Vec<_> = program_headers
        .iter()
        .filter(|ph| ph.kind == PT_LOAD)
        .copied()
        .collect();
    if load_segments.is_empty() {
        return Err(ElfLoadError::NoLoadSegments);
    }

    let base = load_segments
        .iter()
        .filter(|ph| ph.paddr != 0)
        .map(|ph| ph.paddr)
        .min()
        .unwrap_or(load_segments[0].paddr);
    let end_of_data = load_segments
        .iter()
        .map(|ph| ph.paddr + ph.mem_size)
        .max()
        .expect("checked non-empty above");

    // Offsets are relative to `base`; `args_commit_offset` is where the
    // argv/envp string slab starts (right at the end of ELF data),
    // `brk_floor_offset` is where the brk heap starts (right after it) and
    // doubles as the initial break (§3).
    let mut image_size = end_of_data - base;
    let args_commit_offset = image_size;
    image_size += ARGS_COMMIT;
    let brk_floor_offset = image_size;
    image_size += config.brk_commit;
    let bottom_of_stack_offset = image_size;
    image_size += STACK_COMMIT;
    let top_of_stack_offset = image_size;
    image_size = image_size.div_ceil(PAGE_SIZE) * PAGE_SIZE;
    let mmap_offset = image_size;
    image_size += config.mmap_commit;

    let mut image = Image::new(base, image_size as usize);
    for segment in &load_segments {
        if segment.file_size == 0 {
            continue;
        }
        let start = segment.offset as usize;
        let end = start + segment.file_size as usize;
        let data = bytes.get(start..end).ok_or(ElfLoadError::Truncated)?;
        image
            .write_bytes(segment.paddr, data)
            .map_err(|_| ElfLoadError::Truncated)?;
    }

    let symbols = symbols::load(bytes, &header).unwrap_or_default();

    let mmap_base = base + mmap_offset;
    let mmap = Arena::new(mmap_base, config.mmap_commit);

    let envp = layout::synthesize_env(target, extra_env);
    let initial_sp = layout::write_stack_top(
        &mut image,
        base + args_commit_offset,
        base + top_of_stack_offset,
        args,
        &envp,
        target,
    );

    Ok(Loaded {
        image,
        mmap,
        entry: header.entry,
        initial_sp,
        end_of_data: base + brk_floor_offset,
        bottom_of_stack: base + bottom_of_stack_offset,
        target,
        symbols,
    })
}
