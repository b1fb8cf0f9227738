use std::io::SeekFrom;
use std::path::Path;

use crate::binary::Binary;
use crate::error::{ElfError, Result};
use crate::flags::{
    Class, EI_NIDENT, SHN_LORESERVE, SHT_DYNSYM, SHT_GNU_VERDEF, SHT_GNU_VERNEED, SHT_GNU_VERSYM,
    SHT_REL, SHT_RELA, SHT_SYMTAB,
};
use crate::header::{Elf32Header, Elf64Header, FileHeader, ELF32_EHSIZE, ELF64_EHSIZE};
use crate::ident::Ident;
use crate::program::{
    Elf32ProgramHeader, Elf64ProgramHeader, ProgramHeader, PHDR32_SIZE, PHDR64_SIZE,
};
use crate::reloc::{self, RelocationTable};
use crate::sections::{
    Elf32SectionHeader, Elf64SectionHeader, Section, SectionHeader, SHDR32_SIZE, SHDR64_SIZE,
};
use crate::stream::{EndianReader, FileStream};
use crate::strtab;
use crate::symbols::{self, GnuVersionTable, Symbol};

/// Decode progress. Stages may only run in the order the variants are
/// declared; skipping ahead is an `OrderingViolation` (or
/// `HeaderNotParsed` for the table decoders), never a read from a
/// garbage offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Unparsed,
    IdentParsed,
    HeaderParsed,
    TablesParsed,
    Ready,
}

/// Decoding engine for one ELF stream.
///
/// Owns the stream for the duration of the decode; each stage seeks
/// then reads, so stages must not run concurrently against the same
/// stream. `parse` drives the whole pipeline and hands the stream over
/// to the finished [`Binary`]. The stream is released on every exit
/// path, including early validation failures.
pub struct Parser {
    stream: FileStream,
    state: State,
    ident: Option<Ident>,
    header: Option<FileHeader>,
    section_headers: Vec<SectionHeader>,
    program_headers: Vec<ProgramHeader>,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
    dynamic_symbols: Vec<Symbol>,
    relocations: Vec<RelocationTable>,
}

impl Parser {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::with_stream(FileStream::open(path)?))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::with_stream(FileStream::from_bytes(bytes))
    }

    fn with_stream(stream: FileStream) -> Self {
        Self {
            stream,
            state: State::Unparsed,
            ident: None,
            header: None,
            section_headers: Vec::new(),
            program_headers: Vec::new(),
            sections: Vec::new(),
            symbols: Vec::new(),
            dynamic_symbols: Vec::new(),
            relocations: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Runs every stage in dependency order. A legitimately absent
    /// section or program header table is not fatal: the model keeps
    /// whatever did decode.
    pub fn parse(mut self) -> Result<Binary> {
        self.parse_ident()?;
        self.parse_header()?;
        let mut has_sections = true;
        match self.parse_section_headers() {
            Ok(()) => {}
            Err(ElfError::NoTable(table)) => {
                log::warn!("no {table} table, continuing without sections");
                has_sections = false;
            }
            Err(e) => return Err(e),
        }
        match self.parse_program_headers() {
            Ok(()) => {}
            Err(ElfError::NoTable(table)) => log::warn!("no {table} table"),
            Err(e) => return Err(e),
        }
        if has_sections {
            self.resolve_section_names()?;
            self.parse_symbols()?;
            self.parse_relocations()?;
        }
        self.state = State::Ready;

        let ident = self.require_ident()?;
        let header = self.require_header()?;
        let is_stripped = self.sections.is_empty() && !self.program_headers.is_empty();
        if is_stripped {
            log::info!("stripped binary: program headers only");
        }
        Ok(Binary {
            stream: self.stream,
            ident,
            header,
            sections: self.sections,
            segments: self.program_headers,
            symbols: self.symbols,
            dynamic_symbols: self.dynamic_symbols,
            relocations: self.relocations,
            is_stripped,
        })
    }

    /// Reads and validates the 16-byte identification block.
    pub fn parse_ident(&mut self) -> Result<()> {
        self.stream.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; EI_NIDENT];
        self.stream.read_exact(&mut raw)?;
        self.ident = Some(Ident::parse(&raw)?);
        if self.state < State::IdentParsed {
            self.state = State::IdentParsed;
        }
        Ok(())
    }

    /// Decodes the fixed-size file header in the layout selected by
    /// the identification block.
    pub fn parse_header(&mut self) -> Result<()> {
        let ident = self.require_ident()?;
        self.stream.seek(SeekFrom::Start(0))?;
        let header = match ident.class {
            Class::Elf32 => {
                let mut buf = [0u8; ELF32_EHSIZE as usize];
                self.stream.read_exact(&mut buf)?;
                let mut r = EndianReader::new(&buf, 0, ident.data);
                FileHeader::Elf32(Elf32Header::parse(&mut r)?)
            }
            Class::Elf64 => {
                let mut buf = [0u8; ELF64_EHSIZE as usize];
                self.stream.read_exact(&mut buf)?;
                let mut r = EndianReader::new(&buf, 0, ident.data);
                FileHeader::Elf64(Elf64Header::parse(&mut r)?)
            }
            // Unreachable once parse_ident validated the class.
            Class::None => return Err(ElfError::UnknownClass),
        };
        self.header = Some(header);
        if self.state < State::HeaderParsed {
            self.state = State::HeaderParsed;
        }
        Ok(())
    }

    /// Decodes the section header table, preserving on-disk order.
    /// Index 0 is the reserved null entry and is kept as-is.
    pub fn parse_section_headers(&mut self) -> Result<()> {
        let header = self.header.ok_or(ElfError::HeaderNotParsed)?;
        let ident = self.require_ident()?;
        if header.shnum() == 0 || header.shoff() == 0 {
            return Err(ElfError::NoTable("section header"));
        }
        let entsize = u64::from(header.shentsize());
        let record = match header.class() {
            Class::Elf64 => SHDR64_SIZE,
            _ => SHDR32_SIZE,
        };
        let mut headers = Vec::with_capacity(usize::from(header.shnum()));
        let mut buf = vec![0u8; record];
        for i in 0..u64::from(header.shnum()) {
            let offset = header.shoff().saturating_add(i * entsize);
            self.stream.seek(SeekFrom::Start(offset))?;
            self.stream.read_exact(&mut buf)?;
            let mut r = EndianReader::new(&buf, offset, ident.data);
            let decoded = match header.class() {
                Class::Elf64 => SectionHeader::Elf64(Elf64SectionHeader::parse(&mut r)?),
                _ => SectionHeader::Elf32(Elf32SectionHeader::parse(&mut r)?),
            };
            if !decoded.is_nobits() {
                let in_bounds = decoded
                    .offset()
                    .checked_add(decoded.size())
                    .is_some_and(|end| end <= self.stream.len());
                if !in_bounds {
                    return Err(ElfError::TruncatedRead {
                        offset: decoded.offset(),
                        expected: decoded.size() as usize,
                        got: self.stream.len().saturating_sub(decoded.offset()) as usize,
                    });
                }
            }
            headers.push(decoded);
        }
        self.section_headers = headers;
        if self.state < State::TablesParsed {
            self.state = State::TablesParsed;
        }
        Ok(())
    }

    /// Decodes the program header table, preserving on-disk order.
    pub fn parse_program_headers(&mut self) -> Result<()> {
        let header = self.header.ok_or(ElfError::HeaderNotParsed)?;
        let ident = self.require_ident()?;
        if header.phnum() == 0 || header.phoff() == 0 {
            return Err(ElfError::NoTable("program header"));
        }
        let entsize = u64::from(header.phentsize());
        let record = match header.class() {
            Class::Elf64 => PHDR64_SIZE,
            _ => PHDR32_SIZE,
        };
        let mut headers = Vec::with_capacity(usize::from(header.phnum()));
        let mut buf = vec![0u8; record];
        for i in 0..u64::from(header.phnum()) {
            let offset = header.phoff().saturating_add(i * entsize);
            self.stream.seek(SeekFrom::Start(offset))?;
            self.stream.read_exact(&mut buf)?;
            let mut r = EndianReader::new(&buf, offset, ident.data);
            let decoded = match header.class() {
                Class::Elf64 => ProgramHeader::Elf64(Elf64ProgramHeader::parse(&mut r)?),
                _ => ProgramHeader::Elf32(Elf32ProgramHeader::parse(&mut r)?),
            };
            headers.push(decoded);
        }
        self.program_headers = headers;
        if self.state < State::TablesParsed {
            self.state = State::TablesParsed;
        }
        Ok(())
    }

    /// Resolves every section's name through the section header string
    /// table designated by `e_shstrndx`, and captures compression
    /// metadata for flagged sections.
    pub fn resolve_section_names(&mut self) -> Result<()> {
        let header = self.header.ok_or(ElfError::HeaderNotParsed)?;
        let ident = self.require_ident()?;
        if self.section_headers.is_empty() {
            return Err(ElfError::NoTable("section header"));
        }
        let index = usize::from(header.shstrndx());
        if index >= usize::from(SHN_LORESERVE) || index >= self.section_headers.len() {
            return Err(ElfError::InvalidStringTableLink {
                index,
                count: self.section_headers.len(),
            });
        }
        let shstrtab = Section::new(
            String::new(),
            self.section_headers[index],
            &self.stream,
            ident.data,
        )?;
        let names: Vec<String> = {
            let data = shstrtab.data(&self.stream)?;
            self.section_headers
                .iter()
                .map(|sh| strtab::get_string(&data, sh.name_index()))
                .collect()
        };
        let mut sections = Vec::with_capacity(self.section_headers.len());
        for (sh, name) in self.section_headers.iter().zip(names) {
            sections.push(Section::new(name, *sh, &self.stream, ident.data)?);
        }
        self.sections = sections;
        Ok(())
    }

    /// Decodes every symbol table section, resolving names through the
    /// section each one links to. Dynamic symbol tables additionally
    /// pick up GNU version/library strings when the companion version
    /// sections are present.
    pub fn parse_symbols(&mut self) -> Result<()> {
        self.require_resolved_sections()?;
        let mut statics = Vec::new();
        let mut dynamics = Vec::new();
        for index in 0..self.sections.len() {
            match self.sections[index].header.sh_type() {
                SHT_SYMTAB => statics.extend(self.decode_symbol_section(index)?),
                SHT_DYNSYM => {
                    let mut decoded = self.decode_symbol_section(index)?;
                    self.attach_versions(index, &mut decoded)?;
                    dynamics.extend(decoded);
                }
                _ => {}
            }
        }
        self.symbols = statics;
        self.dynamic_symbols = dynamics;
        Ok(())
    }

    /// Decodes every relocation section into the shape matching the
    /// file's class and the section's addend-carrying type.
    pub fn parse_relocations(&mut self) -> Result<()> {
        self.require_resolved_sections()?;
        let ident = self.require_ident()?;
        let header = self.header.ok_or(ElfError::HeaderNotParsed)?;
        let mut tables = Vec::new();
        for (index, section) in self.sections.iter().enumerate() {
            let sh_type = section.header.sh_type();
            if sh_type != SHT_REL && sh_type != SHT_RELA {
                continue;
            }
            let data = section.data(&self.stream)?;
            let entries = reloc::parse_entries(
                &data,
                header.class(),
                sh_type == SHT_RELA,
                ident.data,
            )?;
            tables.push(RelocationTable {
                section_index: index,
                section_name: section.name.clone(),
                entries,
            });
        }
        self.relocations = tables;
        Ok(())
    }

    fn decode_symbol_section(&self, index: usize) -> Result<Vec<Symbol>> {
        let ident = self.require_ident()?;
        let header = self.header.ok_or(ElfError::HeaderNotParsed)?;
        let section = &self.sections[index];
        let link = section.header.link() as usize;
        if link >= self.sections.len() {
            return Err(ElfError::InvalidStringTableLink {
                index: link,
                count: self.sections.len(),
            });
        }
        let strtab_data = self.sections[link].data(&self.stream)?;
        let data = section.data(&self.stream)?;
        symbols::parse_table(&data, &strtab_data, header.class(), ident.data)
    }

    /// Builds the GNU version table from the companion sections of the
    /// dynamic symbol table at `dynsym_index`, when they exist, and
    /// attaches the resolved strings. Missing companions leave every
    /// symbol unversioned.
    fn attach_versions(&self, dynsym_index: usize, decoded: &mut [Symbol]) -> Result<()> {
        let ident = self.require_ident()?;
        let versym = self.sections.iter().find(|s| {
            s.header.sh_type() == SHT_GNU_VERSYM && s.header.link() as usize == dynsym_index
        });
        let versym = match versym {
            Some(section) => symbols::parse_versym(&section.data(&self.stream)?, ident.data)?,
            None => return Ok(()),
        };

        let mut table = GnuVersionTable::default();
        for section in &self.sections {
            let sh_type = section.header.sh_type();
            if sh_type != SHT_GNU_VERNEED && sh_type != SHT_GNU_VERDEF {
                continue;
            }
            let link = section.header.link() as usize;
            if link >= self.sections.len() {
                return Err(ElfError::InvalidStringTableLink {
                    index: link,
                    count: self.sections.len(),
                });
            }
            let strtab_data = self.sections[link].data(&self.stream)?;
            let data = section.data(&self.stream)?;
            if sh_type == SHT_GNU_VERNEED {
                table.parse_verneed(&data, section.header.info(), &strtab_data, ident.data)?;
            } else {
                table.parse_verdef(&data, section.header.info(), &strtab_data, ident.data)?;
            }
        }
        if !table.is_empty() {
            symbols::apply_versions(decoded, &versym, &table);
        }
        Ok(())
    }

    fn require_ident(&self) -> Result<Ident> {
        self.ident
            .ok_or(ElfError::OrderingViolation("identification block"))
    }

    fn require_header(&self) -> Result<FileHeader> {
        self.header.ok_or(ElfError::HeaderNotParsed)
    }

    fn require_resolved_sections(&self) -> Result<()> {
        if self.sections.is_empty() {
            return Err(ElfError::OrderingViolation("section name resolution"));
        }
        Ok(())
    }
}
