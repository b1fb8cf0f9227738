use std::borrow::Cow;
use std::io::Read;

use flate2::read::ZlibDecoder;
use serde::Serialize;

use crate::error::{ElfError, Result};
use crate::flags::{Class, Data, SectionFlags, ELFCOMPRESS_ZLIB, SHT_NOBITS};
use crate::stream::{EndianReader, FileStream};

/// On-disk size of one section header entry, per class.
pub const SHDR32_SIZE: usize = 40;
pub const SHDR64_SIZE: usize = 64;

/// Section header of a 64-bit ELF file (`Elf64_Shdr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elf64SectionHeader {
    /// Section name, an index into the section header string table.
    pub sh_name: u32,
    /// Section type.
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u64,
    /// Virtual address in memory.
    pub sh_addr: u64,
    /// Offset in file.
    pub sh_offset: u64,
    /// Section size in bytes.
    pub sh_size: u64,
    /// Index of a related section; semantics depend on `sh_type`.
    pub sh_link: u32,
    /// Extra information; semantics depend on `sh_type`.
    pub sh_info: u32,
    /// Address alignment boundary.
    pub sh_addralign: u64,
    /// Entry size for sections holding fixed-size records.
    pub sh_entsize: u64,
}

/// Section header of a 32-bit ELF file (`Elf32_Shdr`); flags, addresses,
/// offsets and sizes narrow to 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elf32SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u32,
    pub sh_addr: u32,
    pub sh_offset: u32,
    pub sh_size: u32,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u32,
    pub sh_entsize: u32,
}

impl Elf64SectionHeader {
    pub fn parse(r: &mut EndianReader) -> Result<Self> {
        Ok(Self {
            sh_name: r.read_u32()?,
            sh_type: r.read_u32()?,
            sh_flags: r.read_u64()?,
            sh_addr: r.read_u64()?,
            sh_offset: r.read_u64()?,
            sh_size: r.read_u64()?,
            sh_link: r.read_u32()?,
            sh_info: r.read_u32()?,
            sh_addralign: r.read_u64()?,
            sh_entsize: r.read_u64()?,
        })
    }
}

impl Elf32SectionHeader {
    pub fn parse(r: &mut EndianReader) -> Result<Self> {
        Ok(Self {
            sh_name: r.read_u32()?,
            sh_type: r.read_u32()?,
            sh_flags: r.read_u32()?,
            sh_addr: r.read_u32()?,
            sh_offset: r.read_u32()?,
            sh_size: r.read_u32()?,
            sh_link: r.read_u32()?,
            sh_info: r.read_u32()?,
            sh_addralign: r.read_u32()?,
            sh_entsize: r.read_u32()?,
        })
    }
}

/// Class-tagged section header with width-agnostic accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SectionHeader {
    Elf32(Elf32SectionHeader),
    Elf64(Elf64SectionHeader),
}

impl SectionHeader {
    pub fn class(&self) -> Class {
        match self {
            SectionHeader::Elf32(_) => Class::Elf32,
            SectionHeader::Elf64(_) => Class::Elf64,
        }
    }

    pub fn name_index(&self) -> u32 {
        match self {
            SectionHeader::Elf32(h) => h.sh_name,
            SectionHeader::Elf64(h) => h.sh_name,
        }
    }

    pub fn sh_type(&self) -> u32 {
        match self {
            SectionHeader::Elf32(h) => h.sh_type,
            SectionHeader::Elf64(h) => h.sh_type,
        }
    }

    pub fn flags_raw(&self) -> u64 {
        match self {
            SectionHeader::Elf32(h) => u64::from(h.sh_flags),
            SectionHeader::Elf64(h) => h.sh_flags,
        }
    }

    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_retain(self.flags_raw())
    }

    pub fn addr(&self) -> u64 {
        match self {
            SectionHeader::Elf32(h) => u64::from(h.sh_addr),
            SectionHeader::Elf64(h) => h.sh_addr,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            SectionHeader::Elf32(h) => u64::from(h.sh_offset),
            SectionHeader::Elf64(h) => h.sh_offset,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            SectionHeader::Elf32(h) => u64::from(h.sh_size),
            SectionHeader::Elf64(h) => h.sh_size,
        }
    }

    pub fn link(&self) -> u32 {
        match self {
            SectionHeader::Elf32(h) => h.sh_link,
            SectionHeader::Elf64(h) => h.sh_link,
        }
    }

    pub fn info(&self) -> u32 {
        match self {
            SectionHeader::Elf32(h) => h.sh_info,
            SectionHeader::Elf64(h) => h.sh_info,
        }
    }

    pub fn addralign(&self) -> u64 {
        match self {
            SectionHeader::Elf32(h) => u64::from(h.sh_addralign),
            SectionHeader::Elf64(h) => h.sh_addralign,
        }
    }

    pub fn entsize(&self) -> u64 {
        match self {
            SectionHeader::Elf32(h) => u64::from(h.sh_entsize),
            SectionHeader::Elf64(h) => h.sh_entsize,
        }
    }

    /// NOBITS sections occupy no file bytes; their extents are not
    /// checked against the stream.
    pub fn is_nobits(&self) -> bool {
        self.sh_type() == SHT_NOBITS
    }

    pub fn is_compressed(&self) -> bool {
        self.flags().contains(SectionFlags::COMPRESSED)
    }
}

/// Compression metadata recorded when a section carries
/// `SHF_COMPRESSED`: the algorithm, where the compressed payload starts
/// within the section, and the size the payload inflates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionMeta {
    pub ch_type: u32,
    /// Offset of the compressed payload within the section, i.e. the
    /// size of the compression header that precedes it.
    pub payload_offset: u64,
    pub uncompressed_size: u64,
    pub addralign: u64,
}

impl CompressionMeta {
    /// Decodes the `ElfXX_Chdr` found at the start of a compressed
    /// section. The 64-bit form carries 4 reserved padding bytes after
    /// the type; the 32-bit form does not.
    pub fn parse(r: &mut EndianReader, class: Class) -> Result<Self> {
        match class {
            Class::Elf64 => {
                let ch_type = r.read_u32()?;
                let _reserved = r.read_u32()?;
                Ok(Self {
                    ch_type,
                    payload_offset: 24,
                    uncompressed_size: r.read_u64()?,
                    addralign: r.read_u64()?,
                })
            }
            _ => Ok(Self {
                ch_type: r.read_u32()?,
                payload_offset: 12,
                uncompressed_size: u64::from(r.read_u32()?),
                addralign: u64::from(r.read_u32()?),
            }),
        }
    }
}

/// A decoded section: its header, the name resolved through the section
/// header string table, and compression metadata when flagged. Payload
/// bytes are not held here; they are materialized on demand from the
/// stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub header: SectionHeader,
    pub compression: Option<CompressionMeta>,
}

impl Section {
    /// Builds the section from its decoded header, reading the
    /// compression header (in the file's byte order) from the stream
    /// when the flag is set.
    pub fn new(
        name: String,
        header: SectionHeader,
        stream: &FileStream,
        data: Data,
    ) -> Result<Self> {
        let compression = if header.is_compressed() && !header.is_nobits() {
            let chdr_len = match header.class() {
                Class::Elf64 => 24,
                _ => 12,
            };
            let raw = stream.slice_at(header.offset(), chdr_len)?;
            let mut r = EndianReader::new(raw, header.offset(), data);
            Some(CompressionMeta::parse(&mut r, header.class())?)
        } else {
            None
        };
        Ok(Self {
            name,
            header,
            compression,
        })
    }

    /// Materializes the logical (uncompressed) contents of the section.
    ///
    /// Pure function of the header and the stream: NOBITS yields an
    /// empty slice, plain sections borrow straight out of the backing
    /// store, compressed sections inflate into an owned buffer whose
    /// length must match the size recorded in the compression header.
    pub fn data<'s>(&self, stream: &'s FileStream) -> Result<Cow<'s, [u8]>> {
        if self.header.is_nobits() {
            return Ok(Cow::Borrowed(&[]));
        }
        match &self.compression {
            None => {
                let raw = stream.slice_at(self.header.offset(), self.header.size())?;
                Ok(Cow::Borrowed(raw))
            }
            Some(meta) => {
                if meta.ch_type != ELFCOMPRESS_ZLIB {
                    return Err(ElfError::UnsupportedCompression(meta.ch_type));
                }
                let payload_len = self
                    .header
                    .size()
                    .checked_sub(meta.payload_offset)
                    .ok_or(ElfError::TruncatedRead {
                        offset: self.header.offset(),
                        expected: meta.payload_offset as usize,
                        got: self.header.size() as usize,
                    })?;
                let raw = stream.slice_at(self.header.offset() + meta.payload_offset, payload_len)?;
                let mut out = Vec::with_capacity(meta.uncompressed_size as usize);
                ZlibDecoder::new(raw).read_to_end(&mut out)?;
                if out.len() as u64 != meta.uncompressed_size {
                    return Err(ElfError::TruncatedDecompression {
                        expected: meta.uncompressed_size,
                        got: out.len() as u64,
                    });
                }
                Ok(Cow::Owned(out))
            }
        }
    }
}
