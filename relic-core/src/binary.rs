use std::borrow::Cow;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::flags::{Class, Data};
use crate::header::FileHeader;
use crate::ident::Ident;
use crate::parser::Parser;
use crate::program::ProgramHeader;
use crate::reloc::RelocationTable;
use crate::sections::{Section, SectionHeader};
use crate::stream::FileStream;
use crate::symbols::Symbol;

/// Fully decoded model of one ELF file.
///
/// Populated strictly in stage order by [`Parser::parse`] and read-only
/// afterwards; safe to share across concurrent readers. Owns the
/// underlying stream so that lazily materialized section payloads stay
/// available; dropping the model releases the stream. Serializing the
/// model (the stream is skipped) yields the structured interchange
/// form of every decoded table.
#[derive(Debug, Serialize)]
pub struct Binary {
    #[serde(skip)]
    pub(crate) stream: FileStream,
    pub ident: Ident,
    pub header: FileHeader,
    pub sections: Vec<Section>,
    pub segments: Vec<ProgramHeader>,
    pub symbols: Vec<Symbol>,
    pub dynamic_symbols: Vec<Symbol>,
    pub relocations: Vec<RelocationTable>,
    /// True when the file carries program headers but no section
    /// table.
    pub is_stripped: bool,
}

impl Binary {
    /// Memory-maps and fully decodes the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Parser::new(path)?.parse()
    }

    /// Fully decodes an in-memory image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Parser::from_bytes(bytes).parse()
    }

    pub fn class(&self) -> Class {
        self.ident.class
    }

    pub fn data(&self) -> Data {
        self.ident.data
    }

    pub fn is_64(&self) -> bool {
        self.header.is_64()
    }

    pub fn entry_point(&self) -> u64 {
        self.header.entry()
    }

    pub fn machine(&self) -> u16 {
        self.header.machine()
    }

    pub fn section_headers(&self) -> impl Iterator<Item = &SectionHeader> {
        self.sections.iter().map(|s| &s.header)
    }

    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Materializes a section's logical contents, decompressing when
    /// flagged. Re-entrant; does not mutate the model.
    pub fn section_data(&self, section: &Section) -> Result<Cow<'_, [u8]>> {
        section.data(&self.stream)
    }

    pub fn stream(&self) -> &FileStream {
        &self.stream
    }
}
