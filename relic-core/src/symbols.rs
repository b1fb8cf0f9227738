use std::collections::HashMap;

use serde::Serialize;

use crate::error::{ElfError, Result};
use crate::flags::{Class, Data, VERSYM_HIDDEN, VER_NDX_GLOBAL};
use crate::stream::EndianReader;
use crate::strtab;

/// On-disk size of one symbol table entry, per class.
pub const SYM32_SIZE: u64 = 16;
pub const SYM64_SIZE: u64 = 24;

/// A decoded symbol with its name resolved through the linked string
/// table. Version and library only appear on dynamic symbols whose
/// object carries GNU version sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    /// Binding and type, packed nibbles.
    pub info: u8,
    pub other: u8,
    /// Defining section index; reserved values ≥ `SHN_LORESERVE` are
    /// kept verbatim, never resolved against the section list.
    pub shndx: u16,
    pub value: u64,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

impl Symbol {
    pub fn bind(&self) -> u8 {
        self.info >> 4
    }

    pub fn sym_type(&self) -> u8 {
        self.info & 0xf
    }
}

pub fn entry_size(class: Class) -> u64 {
    match class {
        Class::Elf64 => SYM64_SIZE,
        _ => SYM32_SIZE,
    }
}

/// Decodes a symbol table section's materialized bytes. The section
/// size must be an exact multiple of the per-class entry size; the
/// 32-bit record orders value/size before info/other/shndx.
pub fn parse_table(
    data: &[u8],
    strtab_data: &[u8],
    class: Class,
    order: Data,
) -> Result<Vec<Symbol>> {
    let entsize = entry_size(class);
    if data.len() as u64 % entsize != 0 {
        return Err(ElfError::MisalignedSymbolTable {
            size: data.len() as u64,
            entry_size: entsize,
        });
    }
    let count = data.len() as u64 / entsize;
    let mut symbols = Vec::with_capacity(count as usize);
    let mut r = EndianReader::new(data, 0, order);
    for _ in 0..count {
        let symbol = match class {
            Class::Elf64 => {
                let name = r.read_u32()?;
                let info = r.read_u8()?;
                let other = r.read_u8()?;
                let shndx = r.read_u16()?;
                Symbol {
                    name: strtab::get_string(strtab_data, name),
                    info,
                    other,
                    shndx,
                    value: r.read_u64()?,
                    size: r.read_u64()?,
                    version: None,
                    library: None,
                }
            }
            _ => {
                let name = r.read_u32()?;
                let value = r.read_u32()?;
                let size = r.read_u32()?;
                Symbol {
                    name: strtab::get_string(strtab_data, name),
                    info: r.read_u8()?,
                    other: r.read_u8()?,
                    shndx: r.read_u16()?,
                    value: u64::from(value),
                    size: u64::from(size),
                    version: None,
                    library: None,
                }
            }
        };
        symbols.push(symbol);
    }
    Ok(symbols)
}

/// GNU symbol version table: maps a `versym` index to the version
/// string it names and, for required versions, the library that
/// provides it.
#[derive(Debug, Default)]
pub struct GnuVersionTable {
    by_index: HashMap<u16, (String, Option<String>)>,
}

impl GnuVersionTable {
    /// Decodes an `SHT_GNU_VERNEED` section: a chain of Verneed
    /// records, each heading a chain of Vernaux records carrying the
    /// actual version indices. `count` comes from the section's
    /// `sh_info` field.
    pub fn parse_verneed(
        &mut self,
        data: &[u8],
        count: u32,
        strtab_data: &[u8],
        order: Data,
    ) -> Result<()> {
        let mut off = 0usize;
        for _ in 0..count {
            let mut r = EndianReader::new(&data[off.min(data.len())..], off as u64, order);
            let _vn_version = r.read_u16()?;
            let vn_cnt = r.read_u16()?;
            let vn_file = r.read_u32()?;
            let vn_aux = r.read_u32()?;
            let vn_next = r.read_u32()?;
            let file = strtab::get_string(strtab_data, vn_file);

            let mut aux_off = off + vn_aux as usize;
            for _ in 0..vn_cnt {
                let mut a = EndianReader::new(&data[aux_off.min(data.len())..], aux_off as u64, order);
                let _vna_hash = a.read_u32()?;
                let _vna_flags = a.read_u16()?;
                let vna_other = a.read_u16()?;
                let vna_name = a.read_u32()?;
                let vna_next = a.read_u32()?;
                let version = strtab::get_string(strtab_data, vna_name);
                self.by_index.insert(
                    vna_other & !VERSYM_HIDDEN,
                    (version, Some(file.clone())),
                );
                if vna_next == 0 {
                    break;
                }
                aux_off += vna_next as usize;
            }
            if vn_next == 0 {
                break;
            }
            off += vn_next as usize;
        }
        Ok(())
    }

    /// Decodes an `SHT_GNU_VERDEF` section: versions this object
    /// itself defines. The first Verdaux of each record names the
    /// version. `count` comes from `sh_info`.
    pub fn parse_verdef(
        &mut self,
        data: &[u8],
        count: u32,
        strtab_data: &[u8],
        order: Data,
    ) -> Result<()> {
        let mut off = 0usize;
        for _ in 0..count {
            let mut r = EndianReader::new(&data[off.min(data.len())..], off as u64, order);
            let _vd_version = r.read_u16()?;
            let _vd_flags = r.read_u16()?;
            let vd_ndx = r.read_u16()?;
            let vd_cnt = r.read_u16()?;
            let _vd_hash = r.read_u32()?;
            let vd_aux = r.read_u32()?;
            let vd_next = r.read_u32()?;

            if vd_cnt > 0 {
                let aux_off = off + vd_aux as usize;
                let mut a = EndianReader::new(&data[aux_off.min(data.len())..], aux_off as u64, order);
                let vda_name = a.read_u32()?;
                let version = strtab::get_string(strtab_data, vda_name);
                self.by_index.insert(vd_ndx & !VERSYM_HIDDEN, (version, None));
            }
            if vd_next == 0 {
                break;
            }
            off += vd_next as usize;
        }
        Ok(())
    }

    pub fn get(&self, index: u16) -> Option<&(String, Option<String>)> {
        self.by_index.get(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

/// Decodes an `SHT_GNU_VERSYM` section: one u16 per dynamic symbol.
pub fn parse_versym(data: &[u8], order: Data) -> Result<Vec<u16>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut r = EndianReader::new(data, 0, order);
    for _ in 0..data.len() / 2 {
        out.push(r.read_u16()?);
    }
    Ok(out)
}

/// Attaches version/library strings to dynamic symbols. Indices 0
/// (local) and 1 (global) carry no version; the hidden bit is masked
/// off before lookup.
pub fn apply_versions(symbols: &mut [Symbol], versym: &[u16], table: &GnuVersionTable) {
    for (symbol, &raw) in symbols.iter_mut().zip(versym) {
        let index = raw & !VERSYM_HIDDEN;
        if index <= VER_NDX_GLOBAL {
            continue;
        }
        if let Some((version, library)) = table.get(index) {
            symbol.version = Some(version.clone());
            symbol.library = library.clone();
        }
    }
}
