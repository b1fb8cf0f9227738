use serde::Serialize;

use crate::error::{ElfError, Result};
use crate::flags::{Class, SegmentFlags};
use crate::stream::EndianReader;

/// On-disk size of one program header entry, per class.
pub const PHDR32_SIZE: usize = 32;
pub const PHDR64_SIZE: usize = 56;

/// Program header of a 64-bit ELF file (`Elf64_Phdr`): one loader-facing
/// segment grouping sections for runtime mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elf64ProgramHeader {
    /// Segment type.
    pub p_type: u32,
    /// Segment attributes.
    pub p_flags: u32,
    /// Offset in file.
    pub p_offset: u64,
    /// Virtual address in memory.
    pub p_vaddr: u64,
    /// Physical address, reserved on most targets.
    pub p_paddr: u64,
    /// Size of the segment in the file.
    pub p_filesz: u64,
    /// Size of the segment in memory; never smaller than `p_filesz`.
    pub p_memsz: u64,
    /// Segment alignment.
    pub p_align: u64,
}

/// Program header of a 32-bit ELF file (`Elf32_Phdr`). The flags field
/// moves between `p_memsz` and `p_align` in this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elf32ProgramHeader {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

impl Elf64ProgramHeader {
    pub fn parse(r: &mut EndianReader) -> Result<Self> {
        let hdr = Self {
            p_type: r.read_u32()?,
            p_flags: r.read_u32()?,
            p_offset: r.read_u64()?,
            p_vaddr: r.read_u64()?,
            p_paddr: r.read_u64()?,
            p_filesz: r.read_u64()?,
            p_memsz: r.read_u64()?,
            p_align: r.read_u64()?,
        };
        if hdr.p_memsz < hdr.p_filesz {
            return Err(ElfError::MalformedSegment {
                filesz: hdr.p_filesz,
                memsz: hdr.p_memsz,
            });
        }
        Ok(hdr)
    }
}

impl Elf32ProgramHeader {
    pub fn parse(r: &mut EndianReader) -> Result<Self> {
        let hdr = Self {
            p_type: r.read_u32()?,
            p_offset: r.read_u32()?,
            p_vaddr: r.read_u32()?,
            p_paddr: r.read_u32()?,
            p_filesz: r.read_u32()?,
            p_memsz: r.read_u32()?,
            p_flags: r.read_u32()?,
            p_align: r.read_u32()?,
        };
        if hdr.p_memsz < hdr.p_filesz {
            return Err(ElfError::MalformedSegment {
                filesz: u64::from(hdr.p_filesz),
                memsz: u64::from(hdr.p_memsz),
            });
        }
        Ok(hdr)
    }
}

/// Class-tagged program header with width-agnostic accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProgramHeader {
    Elf32(Elf32ProgramHeader),
    Elf64(Elf64ProgramHeader),
}

impl ProgramHeader {
    pub fn class(&self) -> Class {
        match self {
            ProgramHeader::Elf32(_) => Class::Elf32,
            ProgramHeader::Elf64(_) => Class::Elf64,
        }
    }

    pub fn p_type(&self) -> u32 {
        match self {
            ProgramHeader::Elf32(h) => h.p_type,
            ProgramHeader::Elf64(h) => h.p_type,
        }
    }

    pub fn flags_raw(&self) -> u32 {
        match self {
            ProgramHeader::Elf32(h) => h.p_flags,
            ProgramHeader::Elf64(h) => h.p_flags,
        }
    }

    pub fn flags(&self) -> SegmentFlags {
        SegmentFlags::from_bits_retain(self.flags_raw())
    }

    pub fn offset(&self) -> u64 {
        match self {
            ProgramHeader::Elf32(h) => u64::from(h.p_offset),
            ProgramHeader::Elf64(h) => h.p_offset,
        }
    }

    pub fn vaddr(&self) -> u64 {
        match self {
            ProgramHeader::Elf32(h) => u64::from(h.p_vaddr),
            ProgramHeader::Elf64(h) => h.p_vaddr,
        }
    }

    pub fn paddr(&self) -> u64 {
        match self {
            ProgramHeader::Elf32(h) => u64::from(h.p_paddr),
            ProgramHeader::Elf64(h) => h.p_paddr,
        }
    }

    pub fn filesz(&self) -> u64 {
        match self {
            ProgramHeader::Elf32(h) => u64::from(h.p_filesz),
            ProgramHeader::Elf64(h) => h.p_filesz,
        }
    }

    pub fn memsz(&self) -> u64 {
        match self {
            ProgramHeader::Elf32(h) => u64::from(h.p_memsz),
            ProgramHeader::Elf64(h) => h.p_memsz,
        }
    }

    pub fn align(&self) -> u64 {
        match self {
            ProgramHeader::Elf32(h) => u64::from(h.p_align),
            ProgramHeader::Elf64(h) => h.p_align,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{Data, PT_LOAD};

    #[test]
    fn parses_a_64bit_program_header() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PT_LOAD.to_le_bytes());
        buf.extend_from_slice(&0x5u32.to_le_bytes()); // R | X
        buf.extend_from_slice(&0x4000u64.to_le_bytes()); // offset
        buf.extend_from_slice(&0x4000u64.to_le_bytes()); // vaddr
        buf.extend_from_slice(&0x4000u64.to_le_bytes()); // paddr
        buf.extend_from_slice(&0x1000u64.to_le_bytes()); // filesz
        buf.extend_from_slice(&0x1000u64.to_le_bytes()); // memsz
        buf.extend_from_slice(&0x1000u64.to_le_bytes()); // align
        assert_eq!(buf.len(), PHDR64_SIZE);
        let mut r = EndianReader::new(&buf, 0, Data::Lsb);
        let hdr = Elf64ProgramHeader::parse(&mut r).unwrap();
        assert_eq!(hdr.p_type, PT_LOAD);
        let tagged = ProgramHeader::Elf64(hdr);
        assert_eq!(tagged.flags(), SegmentFlags::R | SegmentFlags::X);
        assert_eq!(tagged.filesz(), 0x1000);
    }

    #[test]
    fn the_32bit_layout_keeps_flags_after_memsz() {
        let mut buf = Vec::new();
        for v in [PT_LOAD, 0x1000, 0x8000, 0x8000, 0x200, 0x300, 0x6, 0x1000] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(buf.len(), PHDR32_SIZE);
        let mut r = EndianReader::new(&buf, 0, Data::Lsb);
        let hdr = Elf32ProgramHeader::parse(&mut r).unwrap();
        assert_eq!(hdr.p_offset, 0x1000);
        assert_eq!(hdr.p_memsz, 0x300);
        assert_eq!(hdr.p_flags, 0x6);
        assert_eq!(hdr.p_align, 0x1000);
        let tagged = ProgramHeader::Elf32(hdr);
        assert_eq!(tagged.flags(), SegmentFlags::W | SegmentFlags::R);
    }

    #[test]
    fn memory_size_must_cover_the_file_size() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PT_LOAD.to_le_bytes());
        buf.extend_from_slice(&0x4u32.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&0x2000u64.to_le_bytes()); // filesz
        buf.extend_from_slice(&0x1000u64.to_le_bytes()); // memsz < filesz
        buf.extend_from_slice(&0x1000u64.to_le_bytes());
        let mut r = EndianReader::new(&buf, 0, Data::Lsb);
        assert!(matches!(
            Elf64ProgramHeader::parse(&mut r),
            Err(ElfError::MalformedSegment {
                filesz: 0x2000,
                memsz: 0x1000
            })
        ));
    }
}
