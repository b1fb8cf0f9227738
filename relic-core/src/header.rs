use serde::Serialize;

use crate::error::{ElfError, Result};
use crate::flags::{Class, EI_NIDENT};
use crate::stream::EndianReader;

/// Expected value of the header's own size field, per class.
pub const ELF32_EHSIZE: u16 = 52;
pub const ELF64_EHSIZE: u16 = 64;

/// Executable header of a 64-bit ELF file (`Elf64_Ehdr`).
///
/// Sits at file offset 0 and describes where the program and section
/// header tables live and how large their entries are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elf64Header {
    /// Raw identification bytes, kept verbatim.
    pub e_ident: [u8; EI_NIDENT],
    /// Object file type (relocatable, executable, shared, core).
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// ELF format version.
    pub e_version: u32,
    /// Virtual address where execution starts.
    pub e_entry: u64,
    /// File offset of the program header table.
    pub e_phoff: u64,
    /// File offset of the section header table.
    pub e_shoff: u64,
    /// Architecture-specific flags.
    pub e_flags: u32,
    /// Size of this header; 64 for this class.
    pub e_ehsize: u16,
    /// Size of one program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of one section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header table index of the section name string table.
    pub e_shstrndx: u16,
}

/// Executable header of a 32-bit ELF file (`Elf32_Ehdr`). Field order is
/// identical to the 64-bit layout; entry point and table offsets narrow
/// to 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elf32Header {
    pub e_ident: [u8; EI_NIDENT],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Elf64Header {
    pub fn parse(r: &mut EndianReader) -> Result<Self> {
        let mut e_ident = [0u8; EI_NIDENT];
        e_ident.copy_from_slice(r.read_bytes(EI_NIDENT)?);
        let hdr = Self {
            e_ident,
            e_type: r.read_u16()?,
            e_machine: r.read_u16()?,
            e_version: r.read_u32()?,
            e_entry: r.read_u64()?,
            e_phoff: r.read_u64()?,
            e_shoff: r.read_u64()?,
            e_flags: r.read_u32()?,
            e_ehsize: r.read_u16()?,
            e_phentsize: r.read_u16()?,
            e_phnum: r.read_u16()?,
            e_shentsize: r.read_u16()?,
            e_shnum: r.read_u16()?,
            e_shstrndx: r.read_u16()?,
        };
        if hdr.e_ehsize != ELF64_EHSIZE {
            return Err(ElfError::MalformedHeader);
        }
        Ok(hdr)
    }
}

impl Elf32Header {
    pub fn parse(r: &mut EndianReader) -> Result<Self> {
        let mut e_ident = [0u8; EI_NIDENT];
        e_ident.copy_from_slice(r.read_bytes(EI_NIDENT)?);
        let hdr = Self {
            e_ident,
            e_type: r.read_u16()?,
            e_machine: r.read_u16()?,
            e_version: r.read_u32()?,
            e_entry: r.read_u32()?,
            e_phoff: r.read_u32()?,
            e_shoff: r.read_u32()?,
            e_flags: r.read_u32()?,
            e_ehsize: r.read_u16()?,
            e_phentsize: r.read_u16()?,
            e_phnum: r.read_u16()?,
            e_shentsize: r.read_u16()?,
            e_shnum: r.read_u16()?,
            e_shstrndx: r.read_u16()?,
        };
        if hdr.e_ehsize != ELF32_EHSIZE {
            return Err(ElfError::MalformedHeader);
        }
        Ok(hdr)
    }
}

/// Class-tagged file header. Callers go width-agnostic through the
/// accessors below; the raw per-class records stay available for
/// bit-exact inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileHeader {
    Elf32(Elf32Header),
    Elf64(Elf64Header),
}

impl FileHeader {
    pub fn class(&self) -> Class {
        match self {
            FileHeader::Elf32(_) => Class::Elf32,
            FileHeader::Elf64(_) => Class::Elf64,
        }
    }

    pub fn etype(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_type,
            FileHeader::Elf64(h) => h.e_type,
        }
    }

    pub fn machine(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_machine,
            FileHeader::Elf64(h) => h.e_machine,
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            FileHeader::Elf32(h) => h.e_version,
            FileHeader::Elf64(h) => h.e_version,
        }
    }

    pub fn entry(&self) -> u64 {
        match self {
            FileHeader::Elf32(h) => u64::from(h.e_entry),
            FileHeader::Elf64(h) => h.e_entry,
        }
    }

    pub fn phoff(&self) -> u64 {
        match self {
            FileHeader::Elf32(h) => u64::from(h.e_phoff),
            FileHeader::Elf64(h) => h.e_phoff,
        }
    }

    pub fn shoff(&self) -> u64 {
        match self {
            FileHeader::Elf32(h) => u64::from(h.e_shoff),
            FileHeader::Elf64(h) => h.e_shoff,
        }
    }

    pub fn flags(&self) -> u32 {
        match self {
            FileHeader::Elf32(h) => h.e_flags,
            FileHeader::Elf64(h) => h.e_flags,
        }
    }

    pub fn ehsize(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_ehsize,
            FileHeader::Elf64(h) => h.e_ehsize,
        }
    }

    pub fn phentsize(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_phentsize,
            FileHeader::Elf64(h) => h.e_phentsize,
        }
    }

    pub fn phnum(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_phnum,
            FileHeader::Elf64(h) => h.e_phnum,
        }
    }

    pub fn shentsize(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_shentsize,
            FileHeader::Elf64(h) => h.e_shentsize,
        }
    }

    pub fn shnum(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_shnum,
            FileHeader::Elf64(h) => h.e_shnum,
        }
    }

    pub fn shstrndx(&self) -> u16 {
        match self {
            FileHeader::Elf32(h) => h.e_shstrndx,
            FileHeader::Elf64(h) => h.e_shstrndx,
        }
    }

    pub fn is_64(&self) -> bool {
        matches!(self, FileHeader::Elf64(_))
    }

    pub fn is_executable(&self) -> bool {
        self.etype() == crate::flags::ET_EXEC
    }
}
