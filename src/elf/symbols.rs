//! Symbol table for fault diagnostics (§7.2: "PC with the nearest symbol
//! name and offset"). Loaded once at startup and binary-searched by
//! address, matching the lookup idiom in
//! `original_source/djl_mmap.hxx`'s `find_entry`.

use super::{parse_section_headers, read_u32, read_u64, ElfHeader};

const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;

#[derive(Debug, Clone)]
struct Symbol {
    address: u64,
    name: String,
}

/// Sorted-by-address symbol table. [`SymbolTable::lookup`] finds the symbol
/// at or below a given address in `O(log n)`, for the "nearest symbol and
/// offset" diagnostic on a fatal fault.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Returns `(name, offset)` for the symbol at or below `address`, if
    /// any symbol starts at or before it.
    #[must_use]
    pub fn lookup(&self, address: u64) -> Option<(&str, u64)> {
        let index = match self
            .symbols
            .binary_search_by_key(&address, |symbol| symbol.address)
        {
            Ok(exact) => exact,
            Err(0) => return None,
            Err(next) => next - 1,
        };
        let symbol = &self.symbols[index];
        Some((&symbol.name, address - symbol.address))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> impl Iterator<Item = (u64, &str)> {
        self.symbols.iter().map(|s| (s.address, s.name.as_str()))
    }
}

/// Parses `.symtab`/`.strtab` (falling back to `.dynsym`/`.dynstr`, though
/// statically linked executables in this corpus carry `.symtab`) into a
/// sorted [`SymbolTable`]. Returns `None` if the file carries no symbol
/// table at all, which is not an error: diagnostics just omit symbol names.
#[must_use]
pub fn load(bytes: &[u8], header: &ElfHeader) -> Option<SymbolTable> {
    let sections = parse_section_headers(bytes, header).ok()?;
    let symtab = sections.iter().find(|s| s.kind == SHT_SYMTAB)?;
    let strtab = sections.get(symtab.link as usize).filter(|s| s.kind == SHT_STRTAB)?;

    let entry_size = 24usize; // sizeof(ElfSymbol64)
    let string_bytes = bytes.get(strtab.offset as usize..(strtab.offset + strtab.size) as usize)?;

    let mut symbols = Vec::new();
    let count = (symtab.size as usize) / entry_size;
    for i in 0..count {
        let base = symtab.offset as usize + i * entry_size;
        let name_index = read_u32(bytes, base)? as usize;
        let value = read_u64(bytes, base + 8)?;
        if value == 0 || name_index == 0 {
            continue;
        }
        let name = c_string_at(string_bytes, name_index)?;
        if name.is_empty() {
            continue;
        }
        symbols.push(Symbol { address: value, name });
    }
    symbols.sort_by_key(|s| s.address);
    symbols.dedup_by_key(|s| s.address);
    Some(SymbolTable { symbols })
}

fn c_string_at(strings: &[u8], offset: usize) -> Option<String> {
    let slice = strings.get(offset..)?;
    let end = slice.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&slice[..end]).into_owned())
}
