//! `-e`/`-v` dump mode: print the ELF header, program headers, section
//! headers, and (with `-v`) the symbol table, then stop before execution.
//! Grounded on `original_source/rvos.cxx`'s `-e`/`-v` trace output, rebuilt
//! as plain stdout printing since formatting is an external concern here.

use super::{parse_program_headers, parse_section_headers, parse_header, symbols, ElfLoadError};

/// Prints the structural contents of an ELF file to stdout. `verbose` also
/// dumps the symbol table.
pub fn dump(bytes: &[u8], verbose: bool) -> Result<(), ElfLoadError> {
    let header = parse_header(bytes)?;
    println!("ELF header:");
    println!("  entry point:            {:#018x}", header.entry);
    println!("  machine:                {:#x}", header.machine);
    println!(
        "  program headers:        {} x {} bytes at {:#x}",
        header.program_header_count, header.program_header_entry_size, header.program_header_offset
    );
    println!(
        "  section headers:        {} x {} bytes at {:#x}",
        header.section_header_count, header.section_header_entry_size, header.section_header_offset
    );

    println!("Program headers:");
    for (index, ph) in parse_program_headers(bytes, &header)?.iter().enumerate() {
        println!(
            "  [{index:2}] type {:#x} flags {:#x} offset {:#x} vaddr {:#x} paddr {:#x} filesz {:#x} memsz {:#x} align {:#x}",
            ph.kind, ph.flags, ph.offset, ph.vaddr, ph.paddr, ph.file_size, ph.mem_size, ph.align
        );
    }

    println!("Section headers:");
    for (index, sh) in parse_section_headers(bytes, &header)?.iter().enumerate() {
        println!(
            "  [{index:2}] type {:#x} flags {:#x} addr {:#x} offset {:#x} size {:#x}",
            sh.kind, sh.flags, sh.address, sh.offset, sh.size
        );
    }

    if verbose {
        println!("Symbols:");
        if let Some(table) = symbols::load(bytes, &header) {
            for (address, name) in table.entries() {
                println!("  {address:#018x} {name}");
            }
        }
    }

    Ok(())
}
