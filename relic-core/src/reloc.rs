use serde::Serialize;

use crate::error::Result;
use crate::flags::{Class, Data};
use crate::stream::EndianReader;

/// On-disk entry sizes for the four relocation shapes.
pub const REL32_SIZE: u64 = 8;
pub const RELA32_SIZE: u64 = 12;
pub const REL64_SIZE: u64 = 16;
pub const RELA64_SIZE: u64 = 24;

/// 32-bit relocation without an addend. The info field packs an 8-bit
/// relocation type under a 24-bit symbol index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rel32 {
    /// Location to be relocated.
    pub r_offset: u32,
    /// Relocation type and symbol index.
    pub r_info: u32,
}

/// 32-bit relocation with an explicit addend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rela32 {
    pub r_offset: u32,
    pub r_info: u32,
    pub r_addend: i32,
}

/// 64-bit relocation without an addend. The info field packs a 32-bit
/// relocation type under a 32-bit symbol index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rel64 {
    pub r_offset: u64,
    pub r_info: u64,
}

/// 64-bit relocation with an explicit addend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rela64 {
    pub r_offset: u64,
    pub r_info: u64,
    pub r_addend: i64,
}

pub fn r_sym32(info: u32) -> u32 {
    info >> 8
}

pub fn r_type32(info: u32) -> u32 {
    info & 0xff
}

pub fn r_info32(sym: u32, typ: u32) -> u32 {
    sym << 8 | typ
}

pub fn r_sym64(info: u64) -> u32 {
    (info >> 32) as u32
}

pub fn r_type64(info: u64) -> u32 {
    info as u32
}

pub fn r_info64(sym: u32, typ: u32) -> u64 {
    u64::from(sym) << 32 | u64::from(typ)
}

impl Rel32 {
    pub fn sym(&self) -> u32 {
        r_sym32(self.r_info)
    }

    pub fn rel_type(&self) -> u32 {
        r_type32(self.r_info)
    }
}

impl Rela32 {
    pub fn sym(&self) -> u32 {
        r_sym32(self.r_info)
    }

    pub fn rel_type(&self) -> u32 {
        r_type32(self.r_info)
    }
}

impl Rel64 {
    pub fn sym(&self) -> u32 {
        r_sym64(self.r_info)
    }

    pub fn rel_type(&self) -> u32 {
        r_type64(self.r_info)
    }
}

impl Rela64 {
    pub fn sym(&self) -> u32 {
        r_sym64(self.r_info)
    }

    pub fn rel_type(&self) -> u32 {
        r_type64(self.r_info)
    }
}

/// Entries of one relocation section, kept in the shape they were
/// stored in. Symbol indices are not validated against the symbol
/// table; the format allows forward references resolved at link time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RelocationEntries {
    Rel32(Vec<Rel32>),
    Rela32(Vec<Rela32>),
    Rel64(Vec<Rel64>),
    Rela64(Vec<Rela64>),
}

impl RelocationEntries {
    pub fn len(&self) -> usize {
        match self {
            RelocationEntries::Rel32(v) => v.len(),
            RelocationEntries::Rela32(v) => v.len(),
            RelocationEntries::Rel64(v) => v.len(),
            RelocationEntries::Rela64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One decoded relocation section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationTable {
    /// Index of the section the entries came from.
    pub section_index: usize,
    /// Resolved name of that section.
    pub section_name: String,
    pub entries: RelocationEntries,
}

/// Decodes a relocation section's materialized bytes into the shape
/// selected by class and the presence of addends.
pub fn parse_entries(
    data: &[u8],
    class: Class,
    with_addend: bool,
    order: Data,
) -> Result<RelocationEntries> {
    let mut r = EndianReader::new(data, 0, order);
    let entsize = match (class, with_addend) {
        (Class::Elf64, true) => RELA64_SIZE,
        (Class::Elf64, false) => REL64_SIZE,
        (_, true) => RELA32_SIZE,
        (_, false) => REL32_SIZE,
    };
    let count = data.len() as u64 / entsize;
    Ok(match (class, with_addend) {
        (Class::Elf64, true) => {
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                out.push(Rela64 {
                    r_offset: r.read_u64()?,
                    r_info: r.read_u64()?,
                    r_addend: r.read_i64()?,
                });
            }
            RelocationEntries::Rela64(out)
        }
        (Class::Elf64, false) => {
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                out.push(Rel64 {
                    r_offset: r.read_u64()?,
                    r_info: r.read_u64()?,
                });
            }
            RelocationEntries::Rel64(out)
        }
        (_, true) => {
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                out.push(Rela32 {
                    r_offset: r.read_u32()?,
                    r_info: r.read_u32()?,
                    r_addend: r.read_i32()?,
                });
            }
            RelocationEntries::Rela32(out)
        }
        (_, false) => {
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                out.push(Rel32 {
                    r_offset: r.read_u32()?,
                    r_info: r.read_u32()?,
                });
            }
            RelocationEntries::Rel32(out)
        }
    })
}
